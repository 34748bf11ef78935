//! Request payload validation
//!
//! Pure functions only: nothing here touches the driver, the state store or
//! the command queue.

use crate::constants::output;
use crate::error::{HubError, Result};

/// Validates that an output percentage is within 0.0-100.0
pub fn validate_percentage(value: f32) -> Result<f32> {
    if !(output::MIN_PERCENT..=output::MAX_PERCENT).contains(&value) {
        return Err(HubError::InvalidIntensity { value });
    }
    Ok(value)
}

/// Split a raw `"<channel>,<percent>"` payload
///
/// Only syntax is checked here; channel membership and range are checked by
/// the producer against the peripheral's declared channels.
pub fn parse_channel_payload(raw: Option<&str>) -> Result<(String, f32)> {
    let raw = raw.ok_or_else(|| HubError::MalformedPayload("invalid request parameter: 'value'".into()))?;

    let (channel, percent) = raw
        .split_once(',')
        .ok_or_else(|| HubError::MalformedPayload(format!("expected '<channel>,<percent>', got '{}'", raw)))?;

    // Only the first two fields are meaningful; trailing fields are ignored
    let percent = percent.split(',').next().unwrap_or_default().trim();
    let percent = percent
        .parse::<f32>()
        .map_err(|_| HubError::MalformedPayload(format!("could not convert string to float: '{}'", percent)))?;

    Ok((channel.to_string(), percent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_percentage() {
        assert!(validate_percentage(0.0).is_ok());
        assert!(validate_percentage(50.0).is_ok());
        assert!(validate_percentage(100.0).is_ok());
        assert!(validate_percentage(-1.0).is_err());
        assert!(validate_percentage(100.5).is_err());
        assert!(validate_percentage(f32::NAN).is_err());
    }

    #[test]
    fn test_parse_channel_payload() {
        assert_eq!(parse_channel_payload(Some("R,50")).unwrap(), ("R".to_string(), 50.0));
        assert_eq!(parse_channel_payload(Some("WW, 12.5")).unwrap(), ("WW".to_string(), 12.5));
        assert_eq!(parse_channel_payload(Some("B,10,extra")).unwrap(), ("B".to_string(), 10.0));
    }

    #[test]
    fn test_parse_channel_payload_errors() {
        for raw in [None, Some("R"), Some("R,abc"), Some(",")] {
            let err = parse_channel_payload(raw).unwrap_err();
            assert!(matches!(err, HubError::MalformedPayload(_)), "{:?} -> {:?}", raw, err);
            assert_eq!(err.status_code(), 400);
        }
    }
}
