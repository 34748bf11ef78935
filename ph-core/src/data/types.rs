//! Core data types for the peripheral control core

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A temperature sensor input on the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSpec {
    pub sensor_id: u8,
    /// State store variable the reading is published under
    pub variable_name: String,
}

/// Fan drive frequency selected during SETUP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveFrequencyMode {
    Low,
    #[default]
    High,
}

/// A fan (or output channel) driven by the hub
///
/// With `control_sensor_id` set the hardware runs the fan in automatic
/// thermal mode against that sensor; otherwise the fan is manual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorSpec {
    pub fan_id: u8,
    pub duty_cycle_name: String,
    pub fan_speed_name: String,
    #[serde(default)]
    pub tachometer_enabled: bool,
    #[serde(default)]
    pub control_sensor_id: Option<u8>,
    #[serde(default)]
    pub minimum_temperature: f32,
    #[serde(default)]
    pub minimum_duty_cycle: u8,
    #[serde(default = "default_maximum_duty_cycle")]
    pub maximum_duty_cycle: u8,
    #[serde(default)]
    pub drive_frequency_mode: DriveFrequencyMode,
}

fn default_maximum_duty_cycle() -> u8 {
    100
}

/// Peripheral lifecycle mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    Init,
    Setup,
    Manual,
    Auto,
    Error,
    Shutdown,
}

impl Mode {
    /// NORMAL covers both operator-driven and automatic operation
    pub fn is_normal(self) -> bool {
        matches!(self, Mode::Manual | Mode::Auto)
    }

    /// No hardware mutation is attempted in these modes
    pub fn is_halted(self) -> bool {
        matches!(self, Mode::Error | Mode::Shutdown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Init => "INIT",
            Mode::Setup => "SETUP",
            Mode::Manual => "MANUAL",
            Mode::Auto => "AUTO",
            Mode::Error => "ERROR",
            Mode::Shutdown => "SHUTDOWN",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel name -> output percentage, as returned by the driver
pub type ChannelOutputs = BTreeMap<String, f32>;

/// Currently commanded percentage per channel
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChannelSetpoints(ChannelOutputs);

impl ChannelSetpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel: &str) -> Option<f32> {
        self.0.get(channel).copied()
    }

    pub fn set(&mut self, channel: impl Into<String>, percent: f32) {
        self.0.insert(channel.into(), percent);
    }

    /// Replace every setpoint with the outputs the driver reported
    pub fn replace(&mut self, outputs: ChannelOutputs) {
        self.0 = outputs;
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or(serde_json::Value::Null)
    }
}
