//! Error types, re-exported from the shared `ph-error` crate

pub use ph_error::{HubError, Result};
pub use ph_protocol::{STATUS_BAD_REQUEST, STATUS_INTERNAL, STATUS_OK};
