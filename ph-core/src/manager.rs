//! Peripheral manager
//!
//! The aggregate that owns one peripheral's driver handle, channel setpoints,
//! mode, health score and command queue. Producers obtained from
//! [`Manager::producer`] may live on other threads; everything else runs on
//! the single worker that owns the manager.

use std::thread;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::constants::{health, output, variables};
use crate::data::{ChannelSetpoints, DriveFrequencyMode, Mode, PeripheralConfig};
use crate::engine::{publish_actuator, publish_sensor, sync_pass, CommandProducer, CommandQueue, PeripheralStatus};
use crate::error::{HubError, Result};
use crate::hw::{Driver, StateStore};
use crate::lifecycle::PeripheralLifecycle;

/// Opens the driver for a peripheral; called on every INIT
pub type Connector<D> = Box<dyn FnMut(&PeripheralConfig) -> Result<D> + Send>;

pub struct Manager<D, S> {
    pub(crate) config: PeripheralConfig,
    pub(crate) driver: Option<D>,
    connector: Connector<D>,
    pub(crate) store: S,
    pub(crate) queue: CommandQueue,
    pub(crate) status: PeripheralStatus,
    pub(crate) setpoints: ChannelSetpoints,
}

impl<D: Driver, S: StateStore> Manager<D, S> {
    /// Validate the descriptors and publish desired sensor values
    ///
    /// The driver is not opened until [`PeripheralLifecycle::initialize`].
    pub fn new<F>(config: PeripheralConfig, store: S, connector: F) -> Result<Self>
    where
        F: FnMut(&PeripheralConfig) -> Result<D> + Send + 'static,
    {
        config.validate()?;

        let manager = Self {
            config,
            driver: None,
            connector: Box::new(connector),
            store,
            queue: CommandQueue::new(),
            status: PeripheralStatus::new(),
            setpoints: ChannelSetpoints::new(),
        };
        manager.publish_desired_values();
        Ok(manager)
    }

    /// Manager whose INIT hands out clones of an already-open driver
    pub fn with_driver(config: PeripheralConfig, store: S, driver: D) -> Result<Self>
    where
        D: Clone + Send + 'static,
    {
        Self::new(config, store, move |_| Ok(driver.clone()))
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &PeripheralConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.status.mode()
    }

    pub fn health(&self) -> f32 {
        self.status.health()
    }

    /// Shared read handle on mode and health
    pub fn status(&self) -> PeripheralStatus {
        self.status.clone()
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn setpoints(&self) -> &ChannelSetpoints {
        &self.setpoints
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn driver(&self) -> Option<&D> {
        self.driver.as_ref()
    }

    /// Request submission handle bound to this manager's queue and status
    pub fn producer(&self) -> CommandProducer {
        CommandProducer::new(
            self.config.name.as_str(),
            self.config.channels.clone(),
            self.queue.clone(),
            self.status.clone(),
        )
    }

    pub(crate) fn driver_mut(&mut self) -> Result<&mut D> {
        self.driver.as_mut().ok_or(HubError::DriverNotInitialized)
    }

    /// Log a failure and force ERROR with a zero health score
    pub(crate) fn escalate(&self, action: &str, e: &HubError) {
        if e.is_driver_failure() {
            warn!(peripheral = %self.config.name, action, error = %e, "Driver failure");
        } else {
            error!(peripheral = %self.config.name, action, error = %e, "Unexpected failure");
        }
        self.status.fail();
    }

    pub(crate) fn publish_setpoints(&self) {
        publish_actuator(
            &self.store,
            &self.config.name,
            variables::CHANNEL_SETPOINTS,
            self.setpoints.to_json(),
        );
    }

    /// Automatic fans keep their control sensor below the zone minimum
    fn publish_desired_values(&self) {
        for actuator in &self.config.actuators {
            let Some(sensor_id) = actuator.control_sensor_id else {
                continue;
            };
            let Some(sensor) = self.config.sensor(sensor_id) else {
                continue;
            };
            let value = Value::from(format!("Less Than {}", actuator.minimum_temperature));
            self.store
                .set_peripheral_desired_sensor_value(&self.config.name, &sensor.variable_name, value.clone());
            self.store.set_environment_desired_sensor_value(&sensor.variable_name, value);
        }
    }

    fn clear_reported_values(&self) {
        let name = self.config.name.as_str();
        for sensor in &self.config.sensors {
            publish_sensor(&self.store, name, &sensor.variable_name, Value::Null);
        }
        for actuator in &self.config.actuators {
            publish_actuator(&self.store, name, &actuator.duty_cycle_name, Value::Null);
            publish_actuator(&self.store, name, &actuator.fan_speed_name, Value::Null);
        }
        if !self.config.channels.is_empty() {
            publish_actuator(&self.store, name, variables::CHANNEL_SETPOINTS, Value::Null);
        }
    }

    /// Drive mode, fan spin-up check, then per-fan control configuration
    fn configure_hardware(&mut self) -> Result<()> {
        let grace = self.config.timing.fan_spinup_grace();
        let peripheral = self.config.name.as_str();
        let actuators = &self.config.actuators;
        let driver = self.driver.as_mut().ok_or(HubError::DriverNotInitialized)?;

        if let Some(first) = actuators.first() {
            match first.drive_frequency_mode {
                DriveFrequencyMode::Low => driver.enable_low_frequency_fan_drive()?,
                DriveFrequencyMode::High => driver.enable_high_frequency_fan_drive()?,
            }
        }

        let tached = || actuators.iter().filter(|a| a.tachometer_enabled);
        for actuator in tached() {
            driver.enable_manual_fan_control(actuator.fan_id)?;
            driver.write_current_duty_cycle(actuator.fan_id, output::SPINUP_DUTY_CYCLE)?;
        }

        driver.enable_monitoring()?;

        if !grace.is_zero() {
            debug!(peripheral, grace_ms = grace.as_millis() as u64, "Waiting for fans to spin up");
            thread::sleep(grace);
        }

        for actuator in tached() {
            let fan_speed = driver.read_fan_speed(actuator.fan_id)?;
            debug!(peripheral, fan_id = actuator.fan_id, fan_speed, "Spin-up check");
            if fan_speed == 0 {
                error!(peripheral, fan_id = actuator.fan_id, "Unable to verify fan is functional");
                self.status.set_health(health::FAN_UNVERIFIED);
            }
        }

        for actuator in actuators {
            match actuator.control_sensor_id {
                None => driver.enable_manual_fan_control(actuator.fan_id)?,
                Some(sensor_id) => {
                    driver.write_thermal_zone_config(actuator.fan_id, sensor_id)?;
                    driver.write_thermal_zone_minimum_temperature(actuator.fan_id, actuator.minimum_temperature)?;
                    driver.write_minimum_duty_cycle(actuator.fan_id, actuator.minimum_duty_cycle)?;
                    driver.write_maximum_duty_cycle(actuator.fan_id, actuator.maximum_duty_cycle)?;
                    driver.enable_automatic_fan_control(actuator.fan_id)?;
                }
            }
        }

        Ok(())
    }
}

impl<D: Driver, S: StateStore> PeripheralLifecycle for Manager<D, S> {
    fn initialize(&mut self) -> Result<()> {
        info!(peripheral = %self.config.name, "Initializing");
        self.status.set_mode(Mode::Init);
        self.clear_reported_values();
        self.status.set_health(health::HEALTHY);

        match (self.connector)(&self.config) {
            Ok(driver) => {
                self.driver = Some(driver);
                Ok(())
            }
            Err(e) => {
                self.escalate("initialize", &e);
                Err(e)
            }
        }
    }

    fn setup(&mut self) -> Result<()> {
        info!(peripheral = %self.config.name, "Setting up");
        self.status.set_mode(Mode::Setup);

        match self.configure_hardware() {
            Ok(()) => {
                self.status.set_mode(Mode::Manual);
                info!(
                    peripheral = %self.config.name,
                    health = self.status.health(),
                    "Setup complete, entering MANUAL mode"
                );
                Ok(())
            }
            Err(e) => {
                self.escalate("setup", &e);
                Err(e)
            }
        }
    }

    fn update(&mut self) -> Result<()> {
        if !self.status.mode().is_normal() {
            return Ok(());
        }

        let result = match self.driver.as_mut() {
            Some(driver) => sync_pass(driver, &self.config, &self.store),
            None => Err(HubError::DriverNotInitialized),
        };
        match result {
            Ok(score) => {
                self.status.set_health(score);
                Ok(())
            }
            Err(e) => {
                self.escalate("update", &e);
                Err(e)
            }
        }
    }

    fn reset(&mut self) {
        info!(peripheral = %self.config.name, "Resetting");
        self.clear_reported_values();
        self.setpoints.clear();
        self.queue.clear();
        self.driver = None;
        self.status.set_mode(Mode::Init);
    }

    fn shutdown(&mut self) {
        info!(peripheral = %self.config.name, "Shutting down");
        if let Some(driver) = self.driver.as_mut() {
            if let Err(e) = driver.shutdown() {
                warn!(
                    peripheral = %self.config.name,
                    error = %e,
                    "Unable to turn off driver before shutting down"
                );
            }
        }
        self.clear_reported_values();
        let dropped = self.queue.clear();
        if dropped > 0 {
            debug!(peripheral = %self.config.name, dropped, "Discarded pending commands");
        }
        self.status.set_mode(Mode::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ActuatorSpec, SensorSpec};
    use crate::hw::{MemoryStateStore, MockDriver};
    use mockall::predicate::eq;
    use mockall::Sequence;
    use serde_json::json;

    fn fan(fan_id: u8, tachometer_enabled: bool, control_sensor_id: Option<u8>) -> ActuatorSpec {
        ActuatorSpec {
            fan_id,
            duty_cycle_name: format!("fan_{}_duty", fan_id),
            fan_speed_name: format!("fan_{}_rpm", fan_id),
            tachometer_enabled,
            control_sensor_id,
            minimum_temperature: 30.0,
            minimum_duty_cycle: 20,
            maximum_duty_cycle: 90,
            drive_frequency_mode: DriveFrequencyMode::Low,
        }
    }

    fn hub(actuators: Vec<ActuatorSpec>) -> PeripheralConfig {
        let mut config = PeripheralConfig::new("hub");
        config.sensors.push(SensorSpec { sensor_id: 1, variable_name: "temp_0".into() });
        config.actuators = actuators;
        config.timing = crate::data::TimingConfig::immediate();
        config
    }

    fn manager(config: PeripheralConfig, driver: MockDriver) -> (Manager<MockDriver, MemoryStateStore>, MemoryStateStore) {
        let store = MemoryStateStore::new();
        let mut slot = Some(driver);
        let manager = Manager::new(config, store.clone(), move |_| {
            slot.take().ok_or(HubError::DriverNotInitialized)
        })
        .unwrap();
        (manager, store)
    }

    #[test]
    fn test_desired_values_published_at_construction() {
        let config = hub(vec![fan(1, false, Some(1)), fan(2, false, None)]);
        let (_, store) = manager(config, MockDriver::new());
        assert_eq!(store.peripheral_desired_sensor("hub", "temp_0"), Some(json!("Less Than 30")));
        assert_eq!(store.environment_desired_sensor("temp_0"), Some(json!("Less Than 30")));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = hub(vec![fan(1, false, Some(7))]);
        let store = MemoryStateStore::new();
        let result = Manager::<MockDriver, _>::new(config, store, |_| Err(HubError::DriverNotInitialized));
        assert!(matches!(result, Err(HubError::InvalidConfig { .. })));
    }

    #[test]
    fn test_initialize_failure_sets_error() {
        let store = MemoryStateStore::new();
        let mut manager = Manager::<MockDriver, _>::new(hub(vec![]), store, |_| {
            Err(HubError::driver("open", "no device at address"))
        })
        .unwrap();

        assert!(manager.initialize().is_err());
        assert_eq!(manager.mode(), Mode::Error);
        assert_eq!(manager.health(), 0.0);
    }

    #[test]
    fn test_setup_call_order() {
        let mut driver = MockDriver::new();
        let mut seq = Sequence::new();
        driver.expect_enable_low_frequency_fan_drive().times(1).in_sequence(&mut seq).returning(|| Ok(()));
        driver
            .expect_enable_manual_fan_control()
            .with(eq(1))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        driver
            .expect_write_current_duty_cycle()
            .with(eq(1), eq(100))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        driver.expect_enable_monitoring().times(1).in_sequence(&mut seq).returning(|| Ok(()));
        driver.expect_read_fan_speed().with(eq(1)).times(1).in_sequence(&mut seq).returning(|_| Ok(1500));
        driver.expect_write_thermal_zone_config().with(eq(1), eq(1)).times(1).in_sequence(&mut seq).returning(|_, _| Ok(()));
        driver
            .expect_write_thermal_zone_minimum_temperature()
            .with(eq(1), eq(30.0))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        driver.expect_write_minimum_duty_cycle().with(eq(1), eq(20)).times(1).in_sequence(&mut seq).returning(|_, _| Ok(()));
        driver.expect_write_maximum_duty_cycle().with(eq(1), eq(90)).times(1).in_sequence(&mut seq).returning(|_, _| Ok(()));
        driver.expect_enable_automatic_fan_control().with(eq(1)).times(1).in_sequence(&mut seq).returning(|_| Ok(()));

        let (mut manager, _) = manager(hub(vec![fan(1, true, Some(1))]), driver);
        manager.initialize().unwrap();
        manager.setup().unwrap();

        assert_eq!(manager.mode(), Mode::Manual);
        assert_eq!(manager.health(), 100.0);
    }

    #[test]
    fn test_setup_unverified_fan_is_not_fatal() {
        let mut driver = MockDriver::new();
        driver.expect_enable_low_frequency_fan_drive().returning(|| Ok(()));
        driver.expect_enable_manual_fan_control().returning(|_| Ok(()));
        driver.expect_write_current_duty_cycle().returning(|_, _| Ok(()));
        driver.expect_enable_monitoring().returning(|| Ok(()));
        driver.expect_read_fan_speed().returning(|_| Ok(0));

        let (mut manager, _) = manager(hub(vec![fan(1, true, None)]), driver);
        manager.initialize().unwrap();
        manager.setup().unwrap();

        assert_eq!(manager.health(), 60.0);
        assert_eq!(manager.mode(), Mode::Manual);
    }

    #[test]
    fn test_setup_driver_failure_sets_error() {
        let mut driver = MockDriver::new();
        driver.expect_enable_low_frequency_fan_drive().returning(|| Ok(()));
        driver.expect_enable_manual_fan_control().returning(|_| Ok(()));
        driver.expect_write_current_duty_cycle().returning(|_, _| Ok(()));
        driver
            .expect_enable_monitoring()
            .returning(|| Err(HubError::driver("enable_monitoring", "nack")));
        driver.expect_read_fan_speed().never();

        let (mut manager, _) = manager(hub(vec![fan(1, true, None), fan(2, true, None)]), driver);
        manager.initialize().unwrap();
        assert!(manager.setup().is_err());
        assert_eq!(manager.mode(), Mode::Error);
        assert_eq!(manager.health(), 0.0);
    }

    #[test]
    fn test_update_failure_sets_error() {
        let mut driver = MockDriver::new();
        driver
            .expect_read_temperature()
            .returning(|_| Err(HubError::driver("read_temperature", "timeout")));

        let (mut manager, _) = manager(hub(vec![]), driver);
        manager.initialize().unwrap();
        manager.status.set_mode(Mode::Manual);

        assert!(manager.update().is_err());
        assert_eq!(manager.mode(), Mode::Error);
        assert_eq!(manager.health(), 0.0);

        // no further hardware access once halted
        assert!(manager.update().is_ok());
    }

    #[test]
    fn test_shutdown_is_best_effort() {
        let mut driver = MockDriver::new();
        driver.expect_read_temperature().returning(|_| Ok(25.0));
        driver.expect_read_current_duty_cycle().returning(|_| Ok(50));
        driver.expect_read_fan_speed().returning(|_| Ok(900));
        driver.expect_shutdown().times(1).returning(|| Err(HubError::driver("shutdown", "nack")));

        let (mut manager, store) = manager(hub(vec![fan(1, true, None)]), driver);
        manager.initialize().unwrap();
        manager.status.set_mode(Mode::Manual);
        manager.update().unwrap();
        assert_eq!(store.peripheral_reported_sensor("hub", "temp_0"), Some(json!(25.0)));

        manager.queue.push(crate::engine::Command::TurnOn);
        manager.shutdown();

        assert_eq!(manager.mode(), Mode::Shutdown);
        assert!(manager.queue.is_empty());
        assert_eq!(store.peripheral_reported_sensor("hub", "temp_0"), Some(Value::Null));
        assert_eq!(store.environment_reported_actuator("fan_1_rpm"), Some(Value::Null));
    }

    #[test]
    fn test_reset_returns_to_init() {
        let (mut manager, _) = manager(hub(vec![]), MockDriver::new());
        manager.initialize().unwrap();
        manager.setpoints.set("R", 10.0);
        manager.status.set_mode(Mode::Manual);

        manager.reset();

        assert_eq!(manager.mode(), Mode::Init);
        assert!(manager.setpoints().is_empty());
        assert!(manager.driver().is_none());
    }
}
