//! Unified error handling for Peripheral Hub
//!
//! This crate provides a single error type used across all Peripheral Hub components.
//! It uses thiserror for ergonomic error definitions with proper Display and Error trait impls.
//!
//! The variants fall into three families that the control core treats differently:
//! - driver failures (hardware layer, escalate to the ERROR mode)
//! - validation failures (operator-correctable, surfaced as 400/500 responses)
//! - everything else, which the dispatcher treats as an unexpected failure

use std::io;
use std::path::PathBuf;

/// Result type alias using HubError
pub type Result<T> = std::result::Result<T, HubError>;

use ph_protocol::{STATUS_BAD_REQUEST, STATUS_INTERNAL};

/// Unified error type for all Peripheral Hub operations
#[derive(thiserror::Error, Debug)]
pub enum HubError {
    // ============================================================================
    // Driver Errors
    // ============================================================================
    #[error("Driver failure during {operation}: {reason}")]
    Driver {
        operation: String,
        reason: String,
    },

    #[error("Driver not initialized")]
    DriverNotInitialized,

    // ============================================================================
    // Validation Errors
    // ============================================================================
    #[error("Must be in manual mode")]
    WrongMode,

    #[error("Must be in {expected} mode")]
    ModeRequired {
        expected: String,
    },

    #[error("Invalid channel name: {0}")]
    InvalidChannel(String),

    #[error("Unable to set channel, invalid intensity: {value:.0}%")]
    InvalidIntensity {
        value: f32,
    },

    #[error("Unable to set channel, {0}")]
    MalformedPayload(String),

    #[error("Config must have channel named: {0}")]
    MissingChannel(String),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("File too large: {path} ({size} bytes, max {max_size} bytes)")]
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

impl HubError {
    /// Create a driver failure for the named operation
    pub fn driver(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Driver {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an unexpected failure from a string
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::Unexpected(msg.into())
    }

    /// True for failures raised by the hardware layer
    pub fn is_driver_failure(&self) -> bool {
        matches!(self, Self::Driver { .. } | Self::DriverNotInitialized)
    }

    /// True for operator-correctable request failures
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            Self::WrongMode
                | Self::ModeRequired { .. }
                | Self::InvalidChannel(_)
                | Self::InvalidIntensity { .. }
                | Self::MalformedPayload(_)
                | Self::MissingChannel(_)
        )
    }

    /// Status code reported to the requester when this error rejects a request
    ///
    /// Missing channel configuration is a precondition failure (500); every
    /// other validation failure is the requester's fault (400).
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingChannel(_) => STATUS_INTERNAL,
            e if e.is_validation_failure() => STATUS_BAD_REQUEST,
            _ => STATUS_INTERNAL,
        }
    }
}
