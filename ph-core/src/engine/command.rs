//! Normalized commands carried by the command queue

use std::fmt;

use crate::data::Mode;

/// A validated, self-contained unit of work for the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    TurnOn,
    TurnOff,
    SetChannel { channel: String, percent: f32 },
    /// Fade one channel, or every declared channel when `channel` is `None`
    Fade { channel: Option<String> },
    Sunrise,
    Orbit,
    /// Operator switch between MANUAL and AUTO
    SwitchMode(Mode),
    /// Teardown requested by the scheduler; never produced from a request
    Shutdown,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::TurnOn => "turn on",
            Command::TurnOff => "turn off",
            Command::SetChannel { .. } => "set channel",
            Command::Fade { .. } => "fade",
            Command::Sunrise => "start sunrise demo",
            Command::Orbit => "start orbit demo",
            Command::SwitchMode(_) => "switch mode",
            Command::Shutdown => "shut down",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetChannel { channel, percent } => write!(f, "set channel {} to {:.0}%", channel, percent),
            Command::Fade { channel: Some(channel) } => write!(f, "fade {}", channel),
            Command::SwitchMode(mode) => write!(f, "switch to {} mode", mode),
            other => f.write_str(other.name()),
        }
    }
}
