//! Sensor/actuator synchronization and health scoring
//!
//! One pass reads every declared sensor and actuator, mirrors the readings
//! into the state store and scores the peripheral. The score is computed
//! fresh each pass: 60 if any tachometer-enabled fan is driven but not
//! turning, otherwise 100.

use serde_json::{json, Value};
use tracing::{error, trace};

use crate::constants::health;
use crate::data::PeripheralConfig;
use crate::error::Result;
use crate::hw::{Driver, StateStore};

/// Publish a sensor reading to the peripheral and environment scopes
pub fn publish_sensor<S: StateStore + ?Sized>(store: &S, peripheral: &str, variable: &str, value: Value) {
    store.set_peripheral_reported_sensor_value(peripheral, variable, value.clone());
    store.set_environment_reported_sensor_value(variable, value);
}

/// Publish an actuator value to the peripheral and environment scopes
pub fn publish_actuator<S: StateStore + ?Sized>(store: &S, peripheral: &str, variable: &str, value: Value) {
    store.set_peripheral_reported_actuator_value(peripheral, variable, value.clone());
    store.set_environment_reported_actuator_value(variable, value);
}

/// Run one synchronization pass and return the pass health score
///
/// Any driver failure aborts the pass; readings published before the failure
/// stay published.
pub fn sync_pass<D, S>(driver: &mut D, config: &PeripheralConfig, store: &S) -> Result<f32>
where
    D: Driver + ?Sized,
    S: StateStore + ?Sized,
{
    let peripheral = config.name.as_str();

    for sensor in &config.sensors {
        let temperature = driver.read_temperature(sensor.sensor_id)?;
        trace!(peripheral, sensor_id = sensor.sensor_id, temperature, "Sensor reading");
        publish_sensor(store, peripheral, &sensor.variable_name, json!(temperature));
    }

    let mut score = health::HEALTHY;
    for actuator in &config.actuators {
        let duty_cycle = driver.read_current_duty_cycle(actuator.fan_id)?;
        let fan_speed = driver.read_fan_speed(actuator.fan_id)?;
        trace!(peripheral, fan_id = actuator.fan_id, duty_cycle, fan_speed, "Actuator reading");
        publish_actuator(store, peripheral, &actuator.duty_cycle_name, json!(duty_cycle));
        publish_actuator(store, peripheral, &actuator.fan_speed_name, json!(fan_speed));

        if actuator.tachometer_enabled && duty_cycle > 0 && fan_speed == 0 {
            error!(
                peripheral,
                fan_id = actuator.fan_id,
                duty_cycle,
                fan_speed,
                "Unable to verify fan is functional"
            );
            score = health::FAN_UNVERIFIED;
        }
    }

    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ActuatorSpec, DriveFrequencyMode, SensorSpec};
    use crate::error::HubError;
    use crate::hw::{MemoryStateStore, MockDriver};
    use mockall::predicate::eq;

    fn fan(fan_id: u8, tachometer_enabled: bool) -> ActuatorSpec {
        ActuatorSpec {
            fan_id,
            duty_cycle_name: format!("fan_{}_duty", fan_id),
            fan_speed_name: format!("fan_{}_rpm", fan_id),
            tachometer_enabled,
            control_sensor_id: None,
            minimum_temperature: 0.0,
            minimum_duty_cycle: 0,
            maximum_duty_cycle: 100,
            drive_frequency_mode: DriveFrequencyMode::High,
        }
    }

    fn hub(actuators: Vec<ActuatorSpec>) -> PeripheralConfig {
        let mut config = PeripheralConfig::new("hub");
        config.sensors.push(SensorSpec { sensor_id: 1, variable_name: "temp_0".into() });
        config.actuators = actuators;
        config
    }

    fn driver_reading(duty_cycle: u8, fan_speed: u32) -> MockDriver {
        let mut driver = MockDriver::new();
        driver.expect_read_temperature().with(eq(1)).returning(|_| Ok(24.5));
        driver.expect_read_current_duty_cycle().returning(move |_| Ok(duty_cycle));
        driver.expect_read_fan_speed().returning(move |_| Ok(fan_speed));
        driver
    }

    #[test]
    fn test_driven_fan_without_speed_scores_60() {
        let config = hub(vec![fan(1, true)]);
        let store = MemoryStateStore::new();
        let mut driver = driver_reading(40, 0);

        assert_eq!(sync_pass(&mut driver, &config, &store).unwrap(), 60.0);
        assert_eq!(store.peripheral_reported_actuator("hub", "fan_1_duty"), Some(json!(40)));
        assert_eq!(store.environment_reported_actuator("fan_1_rpm"), Some(json!(0)));
    }

    #[test]
    fn test_spinning_fan_scores_100() {
        let config = hub(vec![fan(1, true)]);
        let store = MemoryStateStore::new();
        let mut driver = driver_reading(40, 1200);

        assert_eq!(sync_pass(&mut driver, &config, &store).unwrap(), 100.0);
        assert_eq!(store.peripheral_reported_sensor("hub", "temp_0"), Some(json!(24.5)));
        assert_eq!(store.environment_reported_sensor("temp_0"), Some(json!(24.5)));
    }

    #[test]
    fn test_untached_or_idle_fans_are_not_scored() {
        let config = hub(vec![fan(1, false)]);
        let mut driver = driver_reading(40, 0);
        assert_eq!(sync_pass(&mut driver, &config, &MemoryStateStore::new()).unwrap(), 100.0);

        let config = hub(vec![fan(1, true)]);
        let mut driver = driver_reading(0, 0);
        assert_eq!(sync_pass(&mut driver, &config, &MemoryStateStore::new()).unwrap(), 100.0);
    }

    #[test]
    fn test_sensor_failure_aborts_pass() {
        let config = hub(vec![fan(1, true)]);
        let store = MemoryStateStore::new();
        let mut driver = MockDriver::new();
        driver
            .expect_read_temperature()
            .returning(|_| Err(HubError::driver("read_temperature", "nack")));
        driver.expect_read_current_duty_cycle().never();

        let err = sync_pass(&mut driver, &config, &store).unwrap_err();
        assert!(err.is_driver_failure());
        assert_eq!(store.peripheral_reported_actuator("hub", "fan_1_duty"), None);
    }
}
