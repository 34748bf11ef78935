//! Command pipeline and actuation engine
//!
//! - `command` / `queue` - normalized commands and the FIFO that carries them
//! - `producer` - mode-gated request validation
//! - `dispatcher` - single-consumer command execution
//! - `sequences` - interruptible fade/sunrise/orbit loops
//! - `monitor` - sensor/actuator sync and health scoring

mod command;
mod dispatcher;
mod monitor;
mod producer;
mod queue;
mod sequences;
mod status;

pub use command::Command;
pub use monitor::{publish_actuator, publish_sensor, sync_pass};
pub use producer::CommandProducer;
pub use queue::CommandQueue;
pub use sequences::{Sequence, SequenceOutcome, SequenceRunner};
pub use status::PeripheralStatus;
