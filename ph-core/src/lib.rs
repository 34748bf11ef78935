//! Peripheral Hub Core Library
//!
//! The control core for one hardware peripheral: a temperature sensor hub
//! and fan controller, or a multi-channel light driver.
//!
//! # Features
//!
//! - **Mode-gated requests**: every operator request is validated against the
//!   peripheral mode and its parameters before anything is queued
//! - **Single consumer**: one dispatcher executes queued commands in order
//! - **Interruptible sequences**: fade, sunrise and orbit loops stop at the
//!   next checkpoint once a newer command is queued
//! - **Health monitor**: periodic sensor/actuator sync with functional checks
//!
//! # Module Structure
//!
//! - `data/` - Descriptors, data types, validation
//! - `hw/` - Driver and state store interfaces, simulated hardware
//! - `engine/` - Queue, producer, dispatcher, sequences, monitor
//! - `manager` / `lifecycle` - The peripheral aggregate and its lifecycle hooks
//!
//! # Example
//!
//! ```no_run
//! use ph_core::{Manager, MemoryStateStore, PeripheralConfig, PeripheralLifecycle, SimulatedDriver};
//!
//! let mut config = PeripheralConfig::new("led");
//! config.channels = vec!["R".into(), "B".into()];
//!
//! let driver = SimulatedDriver::from_config(&config, 22.0);
//! let mut manager = Manager::with_driver(config, MemoryStateStore::new(), driver).unwrap();
//! manager.initialize().unwrap();
//! manager.setup().unwrap();
//!
//! let producer = manager.producer();
//! assert!(producer.set_channel(Some("R,40")).is_accepted());
//! manager.dispatch_next();
//! ```

// Grouped modules
pub mod data;
pub mod engine;
pub mod hw;

// Standalone modules
pub mod constants;
pub mod error;
pub mod lifecycle;
pub mod manager;

// Re-export primary types from data/
pub use data::{
    ActuatorSpec, ChannelOutputs, ChannelSetpoints, DriveFrequencyMode, Mode, PeripheralConfig,
    SensorSpec, TimingConfig,
};

// Re-export validation functions from data/
pub use data::{parse_channel_payload, validate_percentage};

// Re-export error types
pub use error::{HubError, Result};

// Re-export engine types
pub use engine::{
    Command, CommandProducer, CommandQueue, PeripheralStatus, Sequence, SequenceOutcome,
    SequenceRunner,
};

// Re-export hardware interfaces from hw/
pub use hw::{Driver, MemoryStateStore, ScopeValues, SimulatedDriver, StateSnapshot, StateStore};

pub use lifecycle::PeripheralLifecycle;
pub use manager::{Connector, Manager};
