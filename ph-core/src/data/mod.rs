//! Data types, descriptors, and validation modules

mod config;
mod types;
mod validation;

pub use config::{PeripheralConfig, TimingConfig};
pub use types::{
    ActuatorSpec, ChannelOutputs, ChannelSetpoints, DriveFrequencyMode, Mode, SensorSpec,
};
pub use validation::{parse_channel_payload, validate_percentage};
