//! Hardware driver interface
//!
//! The control core never talks to the bus itself. Everything goes through
//! this trait, which covers both peripheral families the core manages:
//! the temperature sensor hub / fan controller and the multi-channel light
//! driver. Every call may fail with `HubError::Driver`; any other error kind
//! coming out of a driver is treated as an unexpected failure.

use crate::data::ChannelOutputs;
use crate::error::Result;

#[cfg_attr(test, mockall::automock)]
pub trait Driver {
    // ------------------------------------------------------------------
    // Temperature hub / fan controller
    // ------------------------------------------------------------------

    /// Temperature in degrees Celsius
    fn read_temperature(&mut self, sensor_id: u8) -> Result<f32>;

    /// Fan speed in RPM
    fn read_fan_speed(&mut self, fan_id: u8) -> Result<u32>;

    /// Current duty cycle (0-100)
    fn read_current_duty_cycle(&mut self, fan_id: u8) -> Result<u8>;

    fn write_current_duty_cycle(&mut self, fan_id: u8, percent: u8) -> Result<()>;

    fn enable_manual_fan_control(&mut self, fan_id: u8) -> Result<()>;

    fn enable_automatic_fan_control(&mut self, fan_id: u8) -> Result<()>;

    fn enable_low_frequency_fan_drive(&mut self) -> Result<()>;

    fn enable_high_frequency_fan_drive(&mut self) -> Result<()>;

    fn enable_monitoring(&mut self) -> Result<()>;

    /// Bind a fan's thermal zone to a temperature sensor
    fn write_thermal_zone_config(&mut self, fan_id: u8, sensor_id: u8) -> Result<()>;

    fn write_thermal_zone_minimum_temperature(&mut self, fan_id: u8, celsius: f32) -> Result<()>;

    fn write_minimum_duty_cycle(&mut self, fan_id: u8, percent: u8) -> Result<()>;

    fn write_maximum_duty_cycle(&mut self, fan_id: u8, percent: u8) -> Result<()>;

    /// Put the hardware in its low-power state
    fn shutdown(&mut self) -> Result<()>;

    // ------------------------------------------------------------------
    // Multi-channel output driver
    // ------------------------------------------------------------------

    fn set_output(&mut self, channel: &str, percent: f32) -> Result<()>;

    /// Drive every channel to full output; returns the resulting outputs
    fn turn_on(&mut self) -> Result<ChannelOutputs>;

    /// Drive every channel to zero; returns the resulting outputs
    fn turn_off(&mut self) -> Result<ChannelOutputs>;

    /// Map of every declared channel to `percent`
    fn build_channel_outputs(&self, percent: f32) -> ChannelOutputs;

    fn get_channel_number(&self, name: &str) -> Result<u8>;

    /// Convert a percentage into the hardware setpoint representation
    fn translate_setpoint(&self, percent: f32) -> Result<u8>;

    /// Physical sub-units ("panels") behind this driver
    fn panels(&self) -> Vec<String>;

    fn write_panel_output(&mut self, panel: &str, channel_number: u8, setpoint: u8) -> Result<()>;
}
