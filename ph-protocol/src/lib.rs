//! Command submission protocol for Peripheral Hub
//!
//! Requests are JSON objects tagged by `type`, using the operator-facing event
//! names (`"Set Channel"`, `"Turn On"`, ...). Every request is answered with a
//! message and an HTTP-like status code: 200 accepted, 400 invalid input or
//! wrong mode, 500 configuration/precondition failure.

use serde::{Deserialize, Serialize};

/// Maximum encoded request size (4KB)
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024;

/// Maximum length of a request `value` payload
const MAX_VALUE_LENGTH: usize = 64;

/// Request accepted
pub const STATUS_OK: u16 = 200;
/// Invalid input or a request made in the wrong mode
pub const STATUS_BAD_REQUEST: u16 = 400;
/// Configuration or precondition failure
pub const STATUS_INTERNAL: u16 = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestEnvelope {
    /// Unique request ID for correlation and debugging
    #[serde(default)]
    pub id: u64,
    /// The actual request
    #[serde(flatten)]
    pub request: Request,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "Turn On")]
    TurnOn,
    #[serde(rename = "Turn Off")]
    TurnOff,
    /// `value` is the raw `"<channel>,<percent>"` payload
    #[serde(rename = "Set Channel")]
    SetChannel {
        #[serde(default)]
        value: Option<String>,
    },
    /// Optional `value` restricts the fade to a single channel
    Fade {
        #[serde(default)]
        value: Option<String>,
    },
    Sunrise,
    Orbit,
    #[serde(rename = "Enable Manual Mode")]
    EnableManualMode,
    #[serde(rename = "Enable Auto Mode")]
    EnableAutoMode,
    Status,
}

impl Request {
    /// Cheap structural checks before the request reaches the peripheral
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Request::SetChannel { value } | Request::Fade { value } => match value {
                Some(v) if v.len() > MAX_VALUE_LENGTH => Err(format!(
                    "Request value too long: {} > {} chars",
                    v.len(),
                    MAX_VALUE_LENGTH
                )),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Request::TurnOn => "Turn On",
            Request::TurnOff => "Turn Off",
            Request::SetChannel { .. } => "Set Channel",
            Request::Fade { .. } => "Fade",
            Request::Sunrise => "Sunrise",
            Request::Orbit => "Orbit",
            Request::EnableManualMode => "Enable Manual Mode",
            Request::EnableAutoMode => "Enable Auto Mode",
            Request::Status => "Status",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub message: String,
    pub status: u16,
}

impl Response {
    pub fn new(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    pub fn accepted(message: impl Into<String>) -> Self {
        Self::new(message, STATUS_OK)
    }

    pub fn rejected(message: impl Into<String>, status: u16) -> Self {
        Self::new(message, status)
    }

    pub fn is_accepted(&self) -> bool {
        self.status == STATUS_OK
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseEnvelope {
    /// Request ID this response corresponds to
    pub id: u64,
    #[serde(flatten)]
    pub response: Response,
}

impl ResponseEnvelope {
    pub fn new(id: u64, response: Response) -> Self {
        Self { id, response }
    }
}

/// Decode one request line, answering undecodable input with a ready 400 response
///
/// The request id is recovered from malformed input when possible so the
/// requester can still correlate the rejection.
pub fn decode_request(line: &str) -> Result<RequestEnvelope, ResponseEnvelope> {
    if line.len() > MAX_MESSAGE_SIZE {
        return Err(ResponseEnvelope::new(
            0,
            Response::rejected(
                format!("Message too large: {} bytes (max {})", line.len(), MAX_MESSAGE_SIZE),
                STATUS_BAD_REQUEST,
            ),
        ));
    }

    match serde_json::from_str::<RequestEnvelope>(line) {
        Ok(envelope) => match envelope.request.validate() {
            Ok(()) => Ok(envelope),
            Err(reason) => Err(ResponseEnvelope::new(
                envelope.id,
                Response::rejected(reason, STATUS_BAD_REQUEST),
            )),
        },
        Err(_) => {
            let id = serde_json::from_str::<serde_json::Value>(line)
                .ok()
                .and_then(|v| v.get("id").and_then(|id| id.as_u64()))
                .unwrap_or(0);
            Err(ResponseEnvelope::new(
                id,
                Response::rejected("Unknown event request type", STATUS_BAD_REQUEST),
            ))
        }
    }
}
