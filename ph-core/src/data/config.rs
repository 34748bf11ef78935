//! Peripheral descriptors loaded once at manager construction

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{ActuatorSpec, SensorSpec};
use crate::constants::timing;
use crate::error::{HubError, Result};

/// Delays used by the monitor, SETUP and the actuation engine (milliseconds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub sampling_interval_ms: u64,
    pub fan_spinup_grace_ms: u64,
    pub ramp_step_delay_ms: u64,
    pub hold_ms: u64,
    pub panel_pacing_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sampling_interval_ms: timing::DEFAULT_SAMPLING_INTERVAL_MS,
            fan_spinup_grace_ms: timing::DEFAULT_FAN_SPINUP_GRACE_MS,
            ramp_step_delay_ms: timing::DEFAULT_RAMP_STEP_DELAY_MS,
            hold_ms: timing::DEFAULT_HOLD_MS,
            panel_pacing_ms: timing::DEFAULT_PANEL_PACING_MS,
        }
    }
}

impl TimingConfig {
    /// All delays zero except a 1ms sampling interval; for tests and dry runs
    pub fn immediate() -> Self {
        Self {
            sampling_interval_ms: 1,
            fan_spinup_grace_ms: 0,
            ramp_step_delay_ms: 0,
            hold_ms: 0,
            panel_pacing_ms: 0,
        }
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    pub fn fan_spinup_grace(&self) -> Duration {
        Duration::from_millis(self.fan_spinup_grace_ms)
    }

    pub fn ramp_step_delay(&self) -> Duration {
        Duration::from_millis(self.ramp_step_delay_ms)
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    pub fn panel_pacing(&self) -> Duration {
        Duration::from_millis(self.panel_pacing_ms)
    }
}

/// Full descriptor set of one peripheral
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeripheralConfig {
    pub name: String,
    #[serde(default)]
    pub sensors: Vec<SensorSpec>,
    #[serde(default)]
    pub actuators: Vec<ActuatorSpec>,
    /// Declared output channel names
    #[serde(default)]
    pub channels: Vec<String>,
    /// Physical sub-units addressed by the orbit sequence
    #[serde(default)]
    pub panels: Vec<String>,
    #[serde(default)]
    pub timing: TimingConfig,
}

impl PeripheralConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sensors: Vec::new(),
            actuators: Vec::new(),
            channels: Vec::new(),
            panels: Vec::new(),
            timing: TimingConfig::default(),
        }
    }

    pub fn sensor(&self, sensor_id: u8) -> Option<&SensorSpec> {
        self.sensors.iter().find(|s| s.sensor_id == sensor_id)
    }

    /// Reject descriptor sets the control core cannot operate on
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(HubError::invalid_config("name", "cannot be empty"));
        }

        let mut sensor_ids = HashSet::new();
        for sensor in &self.sensors {
            if !sensor_ids.insert(sensor.sensor_id) {
                return Err(HubError::invalid_config(
                    "sensors",
                    format!("duplicate sensor_id {}", sensor.sensor_id),
                ));
            }
            if sensor.variable_name.trim().is_empty() {
                return Err(HubError::invalid_config(
                    "sensors",
                    format!("sensor {} has an empty variable_name", sensor.sensor_id),
                ));
            }
        }

        let mut fan_ids = HashSet::new();
        for actuator in &self.actuators {
            if !fan_ids.insert(actuator.fan_id) {
                return Err(HubError::invalid_config(
                    "actuators",
                    format!("duplicate fan_id {}", actuator.fan_id),
                ));
            }
            if actuator.maximum_duty_cycle > 100 || actuator.minimum_duty_cycle > actuator.maximum_duty_cycle {
                return Err(HubError::invalid_config(
                    "actuators",
                    format!(
                        "fan {} duty cycle limits {}..{} are not within 0..=100",
                        actuator.fan_id, actuator.minimum_duty_cycle, actuator.maximum_duty_cycle
                    ),
                ));
            }
            if let Some(sensor_id) = actuator.control_sensor_id {
                if !sensor_ids.contains(&sensor_id) {
                    return Err(HubError::invalid_config(
                        "actuators",
                        format!("fan {} controlled by undeclared sensor {}", actuator.fan_id, sensor_id),
                    ));
                }
            }
        }

        let mut channels = HashSet::new();
        for channel in &self.channels {
            if channel.trim().is_empty() || !channels.insert(channel.as_str()) {
                return Err(HubError::invalid_config(
                    "channels",
                    format!("invalid or duplicate channel name '{}'", channel),
                ));
            }
        }

        if self.timing.sampling_interval_ms == 0 {
            return Err(HubError::invalid_config("timing.sampling_interval_ms", "must be > 0"));
        }
        let delays = [
            self.timing.sampling_interval_ms,
            self.timing.fan_spinup_grace_ms,
            self.timing.ramp_step_delay_ms,
            self.timing.hold_ms,
            self.timing.panel_pacing_ms,
        ];
        if delays.iter().any(|d| *d > timing::MAX_DELAY_MS) {
            return Err(HubError::invalid_config(
                "timing",
                format!("delays must not exceed {}ms", timing::MAX_DELAY_MS),
            ));
        }

        Ok(())
    }
}
