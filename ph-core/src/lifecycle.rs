//! Lifecycle hooks driven by an external scheduler

use crate::error::Result;

/// INIT -> SETUP -> NORMAL, with ERROR and SHUTDOWN reachable from anywhere
///
/// Failures are reflected in the peripheral's mode and health score before
/// the hook returns; the returned error is informational for the scheduler.
pub trait PeripheralLifecycle {
    /// Connect to the hardware and clear stale reported values
    fn initialize(&mut self) -> Result<()>;

    /// Configure the hardware and verify it responds
    fn setup(&mut self) -> Result<()>;

    /// One synchronization pass
    fn update(&mut self) -> Result<()>;

    /// Drop runtime state so the next cycle starts from INIT
    fn reset(&mut self);

    /// Best-effort hardware shutdown; always ends in SHUTDOWN
    fn shutdown(&mut self);
}
