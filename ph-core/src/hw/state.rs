//! State store interface and an in-memory implementation
//!
//! Writes are fire-and-forget: the control core never inspects a result.
//! Peripheral-scoped values are keyed by peripheral name and variable;
//! environment-scoped values are shared by every peripheral.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

pub trait StateStore {
    fn set_peripheral_reported_sensor_value(&self, peripheral: &str, variable: &str, value: Value);

    fn set_environment_reported_sensor_value(&self, variable: &str, value: Value);

    fn set_peripheral_reported_actuator_value(&self, peripheral: &str, variable: &str, value: Value);

    fn set_environment_reported_actuator_value(&self, variable: &str, value: Value);

    fn set_peripheral_desired_sensor_value(&self, peripheral: &str, variable: &str, value: Value);

    fn set_environment_desired_sensor_value(&self, variable: &str, value: Value);
}

/// Values of one scope (a peripheral or the shared environment)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScopeValues {
    pub reported_sensors: BTreeMap<String, Value>,
    pub reported_actuators: BTreeMap<String, Value>,
    pub desired_sensors: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub peripherals: BTreeMap<String, ScopeValues>,
    pub environment: ScopeValues,
}

/// Thread-safe in-memory state store
///
/// Cloning yields another handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<StateSnapshot>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.inner.read().clone()
    }

    pub fn peripheral_reported_sensor(&self, peripheral: &str, variable: &str) -> Option<Value> {
        self.inner
            .read()
            .peripherals
            .get(peripheral)
            .and_then(|p| p.reported_sensors.get(variable).cloned())
    }

    pub fn peripheral_reported_actuator(&self, peripheral: &str, variable: &str) -> Option<Value> {
        self.inner
            .read()
            .peripherals
            .get(peripheral)
            .and_then(|p| p.reported_actuators.get(variable).cloned())
    }

    pub fn peripheral_desired_sensor(&self, peripheral: &str, variable: &str) -> Option<Value> {
        self.inner
            .read()
            .peripherals
            .get(peripheral)
            .and_then(|p| p.desired_sensors.get(variable).cloned())
    }

    pub fn environment_reported_sensor(&self, variable: &str) -> Option<Value> {
        self.inner.read().environment.reported_sensors.get(variable).cloned()
    }

    pub fn environment_reported_actuator(&self, variable: &str) -> Option<Value> {
        self.inner.read().environment.reported_actuators.get(variable).cloned()
    }

    pub fn environment_desired_sensor(&self, variable: &str) -> Option<Value> {
        self.inner.read().environment.desired_sensors.get(variable).cloned()
    }
}

impl StateStore for MemoryStateStore {
    fn set_peripheral_reported_sensor_value(&self, peripheral: &str, variable: &str, value: Value) {
        let mut guard = self.inner.write();
        guard
            .peripherals
            .entry(peripheral.to_string())
            .or_default()
            .reported_sensors
            .insert(variable.to_string(), value);
    }

    fn set_environment_reported_sensor_value(&self, variable: &str, value: Value) {
        self.inner
            .write()
            .environment
            .reported_sensors
            .insert(variable.to_string(), value);
    }

    fn set_peripheral_reported_actuator_value(&self, peripheral: &str, variable: &str, value: Value) {
        let mut guard = self.inner.write();
        guard
            .peripherals
            .entry(peripheral.to_string())
            .or_default()
            .reported_actuators
            .insert(variable.to_string(), value);
    }

    fn set_environment_reported_actuator_value(&self, variable: &str, value: Value) {
        self.inner
            .write()
            .environment
            .reported_actuators
            .insert(variable.to_string(), value);
    }

    fn set_peripheral_desired_sensor_value(&self, peripheral: &str, variable: &str, value: Value) {
        let mut guard = self.inner.write();
        guard
            .peripherals
            .entry(peripheral.to_string())
            .or_default()
            .desired_sensors
            .insert(variable.to_string(), value);
    }

    fn set_environment_desired_sensor_value(&self, variable: &str, value: Value) {
        self.inner
            .write()
            .environment
            .desired_sensors
            .insert(variable.to_string(), value);
    }
}
