//! Mode and health score of one peripheral
//!
//! Written only by the manager; producers read the mode to gate requests.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::constants::health;
use crate::data::Mode;

#[derive(Debug, Clone, Copy, PartialEq)]
struct StatusInner {
    mode: Mode,
    health: f32,
}

/// Cloneable read handle on a peripheral's mode and health score
#[derive(Debug, Clone)]
pub struct PeripheralStatus {
    inner: Arc<RwLock<StatusInner>>,
}

impl Default for PeripheralStatus {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StatusInner {
                mode: Mode::Init,
                health: health::HEALTHY,
            })),
        }
    }
}

impl PeripheralStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.inner.read().mode
    }

    /// Health score in 0.0-100.0
    pub fn health(&self) -> f32 {
        self.inner.read().health
    }

    pub(crate) fn set_mode(&self, mode: Mode) {
        self.inner.write().mode = mode;
    }

    pub(crate) fn set_health(&self, score: f32) {
        self.inner.write().health = score.clamp(health::FAILED, health::HEALTHY);
    }

    /// ERROR with a zero health score, in one step
    pub(crate) fn fail(&self) {
        let mut inner = self.inner.write();
        inner.mode = Mode::Error;
        inner.health = health::FAILED;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_sets_error_and_zero_health() {
        let status = PeripheralStatus::new();
        let reader = status.clone();
        assert_eq!(reader.mode(), Mode::Init);
        assert_eq!(reader.health(), 100.0);

        status.fail();
        assert_eq!(reader.mode(), Mode::Error);
        assert_eq!(reader.health(), 0.0);
    }

    #[test]
    fn test_health_is_clamped() {
        let status = PeripheralStatus::new();
        status.set_health(250.0);
        assert_eq!(status.health(), 100.0);
        status.set_health(-3.0);
        assert_eq!(status.health(), 0.0);
    }
}
