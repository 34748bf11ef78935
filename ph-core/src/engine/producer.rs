//! Command validation and production
//!
//! Every request is checked against the current mode and its own parameters.
//! An accepted request is normalized into a [`Command`] and enqueued; a
//! rejected one is answered immediately and never reaches the queue. The
//! producer does not touch the driver or the state store.

use std::sync::Arc;

use ph_protocol::{Request, Response};
use tracing::{debug, info};

use super::command::Command;
use super::queue::CommandQueue;
use super::status::PeripheralStatus;
use crate::constants::sequence::REQUIRED_CHANNELS;
use crate::data::{parse_channel_payload, validate_percentage, Mode};
use crate::error::{HubError, Result};

/// Cloneable submission handle for one peripheral
#[derive(Debug, Clone)]
pub struct CommandProducer {
    peripheral: Arc<str>,
    channels: Arc<[String]>,
    queue: CommandQueue,
    status: PeripheralStatus,
}

impl CommandProducer {
    pub fn new(
        peripheral: impl Into<Arc<str>>,
        channels: impl Into<Arc<[String]>>,
        queue: CommandQueue,
        status: PeripheralStatus,
    ) -> Self {
        Self {
            peripheral: peripheral.into(),
            channels: channels.into(),
            queue,
            status,
        }
    }

    /// Route a decoded request to its validator
    pub fn submit(&self, request: &Request) -> Response {
        match request {
            Request::TurnOn => self.turn_on(),
            Request::TurnOff => self.turn_off(),
            Request::SetChannel { value } => self.set_channel(value.as_deref()),
            Request::Fade { value } => self.fade(value.as_deref()),
            Request::Sunrise => self.sunrise(),
            Request::Orbit => self.orbit(),
            Request::EnableManualMode => self.enable_manual_mode(),
            Request::EnableAutoMode => self.enable_auto_mode(),
            Request::Status => self.status(),
        }
    }

    pub fn turn_on(&self) -> Response {
        self.produce(Command::TurnOn, "Turning on", || Ok(()))
    }

    pub fn turn_off(&self) -> Response {
        self.produce(Command::TurnOff, "Turning off", || Ok(()))
    }

    /// `raw` is the `"<channel>,<percent>"` payload
    pub fn set_channel(&self, raw: Option<&str>) -> Response {
        if let Err(e) = self.require_manual() {
            return self.reject("set channel", e);
        }
        match self.parse_set_channel(raw) {
            Ok((channel, percent)) => {
                let message = format!("Setting {} to {:.0}%", channel, percent);
                self.accept(Command::SetChannel { channel, percent }, message)
            }
            Err(e) => self.reject("set channel", e),
        }
    }

    /// Fades `channel` when given, otherwise every declared channel
    pub fn fade(&self, channel: Option<&str>) -> Response {
        let channel = channel.map(str::trim).filter(|c| !c.is_empty()).map(String::from);
        self.produce(Command::Fade { channel }, "Fading", || Ok(()))
    }

    pub fn sunrise(&self) -> Response {
        self.produce(Command::Sunrise, "Starting sunrise demo", || self.require_demo_channels())
    }

    pub fn orbit(&self) -> Response {
        self.produce(Command::Orbit, "Starting orbit demo", || self.require_demo_channels())
    }

    pub fn enable_manual_mode(&self) -> Response {
        self.switch_mode(Mode::Manual)
    }

    pub fn enable_auto_mode(&self) -> Response {
        self.switch_mode(Mode::Auto)
    }

    /// Current mode and health; never enqueues
    pub fn status(&self) -> Response {
        Response::accepted(format!(
            "Mode: {}, health: {:.1}",
            self.status.mode(),
            self.status.health()
        ))
    }

    pub fn peripheral(&self) -> &str {
        &self.peripheral
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    fn switch_mode(&self, target: Mode) -> Response {
        let mode = self.status.mode();
        if !mode.is_normal() {
            let e = HubError::ModeRequired {
                expected: "manual or auto".to_string(),
            };
            return self.reject("switch mode", e);
        }
        let message = format!("Switching to {} mode", target);
        self.accept(Command::SwitchMode(target), message)
    }

    /// Mode gate, extra validation, then enqueue
    fn produce(&self, command: Command, message: &str, validate: impl FnOnce() -> Result<()>) -> Response {
        let checked = self.require_manual().and_then(|_| validate());
        match checked {
            Ok(()) => self.accept(command, message.to_string()),
            Err(e) => self.reject(command.name(), e),
        }
    }

    fn accept(&self, command: Command, message: String) -> Response {
        info!(peripheral = %self.peripheral, command = %command, "Request accepted");
        self.queue.push(command);
        Response::accepted(message)
    }

    fn reject(&self, action: &str, error: HubError) -> Response {
        debug!(peripheral = %self.peripheral, action, error = %error, "Request rejected");
        Response::rejected(error.to_string(), error.status_code())
    }

    fn require_manual(&self) -> Result<()> {
        if self.status.mode() != Mode::Manual {
            return Err(HubError::WrongMode);
        }
        Ok(())
    }

    fn parse_set_channel(&self, raw: Option<&str>) -> Result<(String, f32)> {
        let (channel, percent) = parse_channel_payload(raw)?;
        if !self.channels.iter().any(|c| *c == channel) {
            return Err(HubError::InvalidChannel(channel));
        }
        let percent = validate_percentage(percent)?;
        Ok((channel, percent))
    }

    fn require_demo_channels(&self) -> Result<()> {
        match REQUIRED_CHANNELS
            .iter()
            .find(|required| !self.channels.iter().any(|c| c.as_str() == **required))
        {
            Some(missing) => Err(HubError::MissingChannel(missing.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn producer_in(mode: Mode, channels: &[&str]) -> CommandProducer {
        let status = PeripheralStatus::new();
        status.set_mode(mode);
        let channels: Vec<String> = channels.iter().map(|c| c.to_string()).collect();
        CommandProducer::new("led", channels, CommandQueue::new(), status)
    }

    const ALL: [&str; 6] = ["R", "FR", "WW", "CW", "G", "B"];

    #[test]
    fn test_set_channel_accepted() {
        let producer = producer_in(Mode::Manual, &ALL);
        let response = producer.set_channel(Some("R,50"));
        assert_eq!(response, Response::accepted("Setting R to 50%"));
        assert_eq!(producer.queue.pop(), Some(Command::SetChannel { channel: "R".into(), percent: 50.0 }));
    }

    #[test]
    fn test_set_channel_boundaries() {
        let producer = producer_in(Mode::Manual, &ALL);
        assert!(producer.set_channel(Some("B,0")).is_accepted());
        assert!(producer.set_channel(Some("B,100")).is_accepted());
        assert_eq!(producer.queue_len(), 2);
    }

    #[test]
    fn test_set_channel_out_of_range() {
        let producer = producer_in(Mode::Manual, &ALL);
        let response = producer.set_channel(Some("R,150"));
        assert_eq!(response.status, 400);
        assert_eq!(response.message, "Unable to set channel, invalid intensity: 150%");
        assert_eq!(producer.queue_len(), 0);

        assert_eq!(producer.set_channel(Some("R,-0.5")).status, 400);
        assert_eq!(producer.queue_len(), 0);
    }

    #[test]
    fn test_set_channel_unknown_channel() {
        let producer = producer_in(Mode::Manual, &["R", "B"]);
        let response = producer.set_channel(Some("UV,10"));
        assert_eq!(response, Response::rejected("Invalid channel name: UV", 400));
        assert_eq!(producer.queue_len(), 0);
    }

    #[test]
    fn test_set_channel_malformed() {
        let producer = producer_in(Mode::Manual, &ALL);
        for raw in [None, Some("R"), Some("R,bright")] {
            let response = producer.set_channel(raw);
            assert_eq!(response.status, 400, "{:?}", raw);
            assert!(response.message.starts_with("Unable to set channel, "));
        }
        assert_eq!(producer.queue_len(), 0);
    }

    #[test]
    fn test_wrong_mode_rejected_without_enqueue() {
        for mode in [Mode::Init, Mode::Setup, Mode::Auto, Mode::Error, Mode::Shutdown] {
            let producer = producer_in(mode, &ALL);
            for response in [
                producer.turn_on(),
                producer.turn_off(),
                producer.set_channel(Some("R,50")),
                producer.fade(None),
                producer.sunrise(),
                producer.orbit(),
            ] {
                assert_eq!(response, Response::rejected("Must be in manual mode", 400));
            }
            assert_eq!(producer.queue_len(), 0);
        }
    }

    #[test]
    fn test_demo_requires_channels() {
        let producer = producer_in(Mode::Manual, &["R", "FR", "WW", "CW", "G"]);
        assert_eq!(producer.sunrise(), Response::rejected("Config must have channel named: B", 500));
        assert_eq!(producer.orbit(), Response::rejected("Config must have channel named: B", 500));
        assert_eq!(producer.queue_len(), 0);

        let producer = producer_with_all();
        assert_eq!(producer.sunrise(), Response::accepted("Starting sunrise demo"));
        assert_eq!(producer.orbit(), Response::accepted("Starting orbit demo"));
        assert_eq!(producer.queue_len(), 2);
    }

    fn producer_with_all() -> CommandProducer {
        producer_in(Mode::Manual, &ALL)
    }

    #[test]
    fn test_fade_and_switch() {
        let producer = producer_with_all();
        assert_eq!(producer.fade(Some("WW")), Response::accepted("Fading"));
        assert_eq!(producer.queue.pop(), Some(Command::Fade { channel: Some("WW".into()) }));

        assert_eq!(producer.enable_auto_mode(), Response::accepted("Switching to AUTO mode"));
        assert_eq!(producer.queue.pop(), Some(Command::SwitchMode(Mode::Auto)));

        let producer = producer_in(Mode::Error, &ALL);
        assert_eq!(producer.enable_manual_mode().status, 400);
        assert_eq!(producer.queue_len(), 0);
    }

    #[test]
    fn test_submit_routes_requests() {
        let producer = producer_with_all();
        let response = producer.submit(&Request::SetChannel { value: Some("G,12.4".into()) });
        assert_eq!(response.message, "Setting G to 12%");

        let status = producer.submit(&Request::Status);
        assert_eq!(status, Response::accepted("Mode: MANUAL, health: 100.0"));
        assert_eq!(producer.queue_len(), 1);
    }
}
