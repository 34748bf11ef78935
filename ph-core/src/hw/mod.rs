//! Hardware-facing interfaces
//!
//! - `driver` - the abstract bus driver the core calls into
//! - `state` - the shared state store the core publishes to
//! - `sim` - simulated hardware for dry runs and tests

pub mod driver;
pub mod sim;
pub mod state;

pub use driver::Driver;
#[cfg(test)]
pub use driver::MockDriver;
pub use sim::SimulatedDriver;
pub use state::{MemoryStateStore, ScopeValues, StateSnapshot, StateStore};
