//! Simulated peripheral driver
//!
//! A deterministic in-process stand-in for the thermal hub and the light
//! driver, used by the daemon's simulation mode and by tests. Cloning yields
//! another handle to the same simulated hardware, so a test can keep a handle
//! while the manager owns the driver.
//!
//! Failures can be injected per operation name (the `Driver` method name,
//! e.g. `"read_fan_speed"`), and a write hook observes every `set_output`
//! call. Bulk `turn_on`/`turn_off` are not recorded as writes.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use super::driver::Driver;
use crate::data::{ChannelOutputs, DriveFrequencyMode, PeripheralConfig};
use crate::error::{HubError, Result};

/// RPM produced per percent of duty cycle by a healthy simulated fan
const RPM_PER_PERCENT: u32 = 20;

/// Simulated thermal zone span from minimum temperature to maximum duty
const THERMAL_ZONE_SPAN_CELSIUS: f32 = 20.0;

/// Full-scale hardware setpoint
const SETPOINT_MAX: f32 = 255.0;

type WriteHook = Box<dyn FnMut(&str, f32) + Send>;

#[derive(Debug, Clone, Default)]
struct SimFan {
    duty_cycle: u8,
    automatic: bool,
    stalled: bool,
    zone_sensor: Option<u8>,
    zone_minimum_temperature: f32,
    minimum_duty_cycle: u8,
    maximum_duty_cycle: u8,
}

#[derive(Default)]
struct SimState {
    temperatures: BTreeMap<u8, f32>,
    fans: BTreeMap<u8, SimFan>,
    channels: Vec<String>,
    outputs: ChannelOutputs,
    panels: BTreeMap<String, BTreeMap<u8, u8>>,
    monitoring: bool,
    drive_frequency: Option<DriveFrequencyMode>,
    shut_down: bool,
    failing: HashSet<String>,
    writes: Vec<(String, f32)>,
    write_hook: Option<WriteHook>,
}

impl SimState {
    fn check(&self, operation: &str) -> Result<()> {
        if self.failing.contains(operation) {
            return Err(HubError::driver(operation, "simulated bus failure"));
        }
        Ok(())
    }

    fn fan(&mut self, operation: &str, fan_id: u8) -> Result<&mut SimFan> {
        self.check(operation)?;
        self.fans
            .get_mut(&fan_id)
            .ok_or_else(|| HubError::driver(operation, format!("no fan {}", fan_id)))
    }

    fn effective_duty(&self, fan: &SimFan) -> u8 {
        if !fan.automatic {
            return fan.duty_cycle;
        }
        let temp = fan
            .zone_sensor
            .and_then(|id| self.temperatures.get(&id).copied())
            .unwrap_or_default();
        if temp < fan.zone_minimum_temperature {
            return fan.minimum_duty_cycle;
        }
        let span = fan.maximum_duty_cycle.saturating_sub(fan.minimum_duty_cycle) as f32;
        let ratio = ((temp - fan.zone_minimum_temperature) / THERMAL_ZONE_SPAN_CELSIUS).clamp(0.0, 1.0);
        (fan.minimum_duty_cycle as f32 + span * ratio).round() as u8
    }

    fn record_write(&mut self, channel: &str, percent: f32) {
        self.outputs.insert(channel.to_string(), percent);
        self.writes.push((channel.to_string(), percent));
        if let Some(hook) = self.write_hook.as_mut() {
            hook(channel, percent);
        }
    }
}

/// Cloneable handle to simulated hardware
#[derive(Clone, Default)]
pub struct SimulatedDriver {
    inner: Arc<Mutex<SimState>>,
}

impl SimulatedDriver {
    /// Build simulated hardware matching a peripheral's descriptors
    pub fn from_config(config: &PeripheralConfig, ambient_celsius: f32) -> Self {
        let driver = Self::default();
        {
            let mut state = driver.inner.lock();
            for sensor in &config.sensors {
                state.temperatures.insert(sensor.sensor_id, ambient_celsius);
            }
            for actuator in &config.actuators {
                state.fans.insert(
                    actuator.fan_id,
                    SimFan {
                        maximum_duty_cycle: 100,
                        ..SimFan::default()
                    },
                );
            }
            state.channels = config.channels.clone();
            state.outputs = config.channels.iter().map(|c| (c.clone(), 0.0)).collect();
            state.panels = config.panels.iter().map(|p| (p.clone(), BTreeMap::new())).collect();
        }
        driver
    }

    /// Make every call of `operation` fail with a driver error
    pub fn fail_on(&self, operation: &str) {
        self.inner.lock().failing.insert(operation.to_string());
    }

    pub fn clear_failures(&self) {
        self.inner.lock().failing.clear();
    }

    /// A stalled fan reports 0 RPM whatever its duty cycle
    pub fn set_fan_stalled(&self, fan_id: u8, stalled: bool) {
        if let Some(fan) = self.inner.lock().fans.get_mut(&fan_id) {
            fan.stalled = stalled;
        }
    }

    pub fn set_temperature(&self, sensor_id: u8, celsius: f32) {
        self.inner.lock().temperatures.insert(sensor_id, celsius);
    }

    /// Force a fan's duty cycle without going through the driver interface
    pub fn set_fan_duty_cycle(&self, fan_id: u8, percent: u8) {
        if let Some(fan) = self.inner.lock().fans.get_mut(&fan_id) {
            fan.duty_cycle = percent;
        }
    }

    /// Called after every successful channel write
    pub fn set_write_hook(&self, hook: impl FnMut(&str, f32) + Send + 'static) {
        self.inner.lock().write_hook = Some(Box::new(hook));
    }

    /// Every channel write so far, in order
    pub fn writes(&self) -> Vec<(String, f32)> {
        self.inner.lock().writes.clone()
    }

    pub fn outputs(&self) -> ChannelOutputs {
        self.inner.lock().outputs.clone()
    }

    pub fn panel_outputs(&self, panel: &str) -> BTreeMap<u8, u8> {
        self.inner.lock().panels.get(panel).cloned().unwrap_or_default()
    }

    pub fn fan_duty_cycle(&self, fan_id: u8) -> Option<u8> {
        let state = self.inner.lock();
        state.fans.get(&fan_id).map(|f| state.effective_duty(f))
    }

    pub fn is_fan_automatic(&self, fan_id: u8) -> bool {
        self.inner.lock().fans.get(&fan_id).map(|f| f.automatic).unwrap_or(false)
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner.lock().monitoring
    }

    pub fn drive_frequency(&self) -> Option<DriveFrequencyMode> {
        self.inner.lock().drive_frequency
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.lock().shut_down
    }
}

impl Driver for SimulatedDriver {
    fn read_temperature(&mut self, sensor_id: u8) -> Result<f32> {
        let state = self.inner.lock();
        state.check("read_temperature")?;
        state
            .temperatures
            .get(&sensor_id)
            .copied()
            .ok_or_else(|| HubError::driver("read_temperature", format!("no sensor {}", sensor_id)))
    }

    fn read_fan_speed(&mut self, fan_id: u8) -> Result<u32> {
        let mut state = self.inner.lock();
        let fan = state.fan("read_fan_speed", fan_id)?.clone();
        if fan.stalled {
            return Ok(0);
        }
        Ok(state.effective_duty(&fan) as u32 * RPM_PER_PERCENT)
    }

    fn read_current_duty_cycle(&mut self, fan_id: u8) -> Result<u8> {
        let mut state = self.inner.lock();
        let fan = state.fan("read_current_duty_cycle", fan_id)?.clone();
        Ok(state.effective_duty(&fan))
    }

    fn write_current_duty_cycle(&mut self, fan_id: u8, percent: u8) -> Result<()> {
        let mut state = self.inner.lock();
        state.fan("write_current_duty_cycle", fan_id)?.duty_cycle = percent.min(100);
        Ok(())
    }

    fn enable_manual_fan_control(&mut self, fan_id: u8) -> Result<()> {
        let mut state = self.inner.lock();
        state.fan("enable_manual_fan_control", fan_id)?.automatic = false;
        Ok(())
    }

    fn enable_automatic_fan_control(&mut self, fan_id: u8) -> Result<()> {
        let mut state = self.inner.lock();
        state.fan("enable_automatic_fan_control", fan_id)?.automatic = true;
        Ok(())
    }

    fn enable_low_frequency_fan_drive(&mut self) -> Result<()> {
        let mut state = self.inner.lock();
        state.check("enable_low_frequency_fan_drive")?;
        state.drive_frequency = Some(DriveFrequencyMode::Low);
        Ok(())
    }

    fn enable_high_frequency_fan_drive(&mut self) -> Result<()> {
        let mut state = self.inner.lock();
        state.check("enable_high_frequency_fan_drive")?;
        state.drive_frequency = Some(DriveFrequencyMode::High);
        Ok(())
    }

    fn enable_monitoring(&mut self) -> Result<()> {
        let mut state = self.inner.lock();
        state.check("enable_monitoring")?;
        state.monitoring = true;
        state.shut_down = false;
        Ok(())
    }

    fn write_thermal_zone_config(&mut self, fan_id: u8, sensor_id: u8) -> Result<()> {
        let mut state = self.inner.lock();
        state.fan("write_thermal_zone_config", fan_id)?.zone_sensor = Some(sensor_id);
        Ok(())
    }

    fn write_thermal_zone_minimum_temperature(&mut self, fan_id: u8, celsius: f32) -> Result<()> {
        let mut state = self.inner.lock();
        state.fan("write_thermal_zone_minimum_temperature", fan_id)?.zone_minimum_temperature = celsius;
        Ok(())
    }

    fn write_minimum_duty_cycle(&mut self, fan_id: u8, percent: u8) -> Result<()> {
        let mut state = self.inner.lock();
        state.fan("write_minimum_duty_cycle", fan_id)?.minimum_duty_cycle = percent.min(100);
        Ok(())
    }

    fn write_maximum_duty_cycle(&mut self, fan_id: u8, percent: u8) -> Result<()> {
        let mut state = self.inner.lock();
        state.fan("write_maximum_duty_cycle", fan_id)?.maximum_duty_cycle = percent.min(100);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        let mut state = self.inner.lock();
        state.check("shutdown")?;
        state.monitoring = false;
        state.shut_down = true;
        for fan in state.fans.values_mut() {
            fan.duty_cycle = 0;
            fan.automatic = false;
        }
        for value in state.outputs.values_mut() {
            *value = 0.0;
        }
        Ok(())
    }

    fn set_output(&mut self, channel: &str, percent: f32) -> Result<()> {
        let mut state = self.inner.lock();
        state.check("set_output")?;
        if !state.channels.iter().any(|c| c == channel) {
            return Err(HubError::driver("set_output", format!("no channel {}", channel)));
        }
        state.record_write(channel, percent);
        Ok(())
    }

    fn turn_on(&mut self) -> Result<ChannelOutputs> {
        let mut state = self.inner.lock();
        state.check("turn_on")?;
        state.outputs = state.channels.iter().map(|c| (c.clone(), 100.0)).collect();
        Ok(state.outputs.clone())
    }

    fn turn_off(&mut self) -> Result<ChannelOutputs> {
        let mut state = self.inner.lock();
        state.check("turn_off")?;
        state.outputs = state.channels.iter().map(|c| (c.clone(), 0.0)).collect();
        Ok(state.outputs.clone())
    }

    fn build_channel_outputs(&self, percent: f32) -> ChannelOutputs {
        self.inner
            .lock()
            .channels
            .iter()
            .map(|c| (c.clone(), percent))
            .collect()
    }

    fn get_channel_number(&self, name: &str) -> Result<u8> {
        let state = self.inner.lock();
        state.check("get_channel_number")?;
        state
            .channels
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| HubError::driver("get_channel_number", format!("no channel {}", name)))
            .and_then(|i| {
                u8::try_from(i).map_err(|_| {
                    HubError::driver("get_channel_number", format!("channel {} is out of range at index {}", name, i))
                })
            })
    }

    fn translate_setpoint(&self, percent: f32) -> Result<u8> {
        let state = self.inner.lock();
        state.check("translate_setpoint")?;
        if !(0.0..=100.0).contains(&percent) {
            return Err(HubError::driver("translate_setpoint", format!("setpoint {} out of range", percent)));
        }
        Ok((percent / 100.0 * SETPOINT_MAX).round() as u8)
    }

    fn panels(&self) -> Vec<String> {
        self.inner.lock().panels.keys().cloned().collect()
    }

    fn write_panel_output(&mut self, panel: &str, channel_number: u8, setpoint: u8) -> Result<()> {
        let mut state = self.inner.lock();
        state.check("write_panel_output")?;
        state
            .panels
            .get_mut(panel)
            .ok_or_else(|| HubError::driver("write_panel_output", format!("no panel {}", panel)))?
            .insert(channel_number, setpoint);
        Ok(())
    }
}
