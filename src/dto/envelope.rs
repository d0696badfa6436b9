use serde::Serialize;
use utoipa::ToSchema;

/// Sentinel error code returned when a write is rejected as stale.
pub const CODE_STALE_DATA: &str = "STALE_DATA";
/// Sentinel error code returned when a PIN token is missing or invalid.
pub const CODE_AUTH_REQUIRED: &str = "AUTH_REQUIRED";

/// Wire envelope wrapping every successful action response.
///
/// Serializes as `{"success": true, ...data}`. Failures never go through this
/// type; they are produced by [`crate::error::AppError`] so the error code,
/// message, and any attached server snapshot stay in one place.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    /// Always `true`; failure envelopes are built by the error layer.
    pub success: bool,
    /// Action-specific payload, flattened into the envelope object.
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    /// Wrap an action payload in a success envelope.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Payload for actions that acknowledge without returning data.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct Ack {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_flattens_payload() {
        #[derive(Serialize)]
        struct Payload {
            teams: Vec<String>,
        }

        let wire = serde_json::to_value(Envelope::ok(Payload {
            teams: vec!["a".into()],
        }))
        .unwrap();
        assert_eq!(wire, json!({ "success": true, "teams": ["a"] }));
    }

    #[test]
    fn ack_envelope_is_bare_success() {
        let wire = serde_json::to_value(Envelope::ok(Ack::default())).unwrap();
        assert_eq!(wire, json!({ "success": true }));
    }
}
