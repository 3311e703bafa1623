//! Response envelope
//!
//! The backend wraps every payload as `{status, message, data}`. Success is
//! decided by the transport status alone; the envelope only carries payload.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub status: Option<i64>,
    pub message: Option<String>,
    pub data: Option<T>,
}

/// A successful (2xx) response with its body buffered.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the whole body as `T`, ignoring any envelope.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn envelope<T: DeserializeOwned>(&self) -> Result<ApiEnvelope<T>> {
        if self.body.is_empty() {
            return Ok(ApiEnvelope {
                status: None,
                message: None,
                data: None,
            });
        }
        self.json()
    }

    /// The envelope's `data`, which must be present.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T> {
        self.envelope::<T>()?
            .data
            .ok_or_else(|| ApiError::Decode("response envelope has no data".to_string()))
    }

    /// The envelope's `message`, when the body is an envelope.
    pub fn message(&self) -> Option<String> {
        envelope_message(&self.body)
    }
}

/// Best-effort extraction of `message` from an error body.
pub(crate) fn envelope_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ApiEnvelope<serde_json::Value>>(body)
        .ok()
        .and_then(|envelope| envelope.message)
        .filter(|message| !message.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Plan {
        plan_name: String,
        remaining_days: i64,
    }

    fn response(body: serde_json::Value) -> ApiResponse {
        ApiResponse::new(StatusCode::OK, serde_json::to_vec(&body).unwrap())
    }

    #[test]
    fn test_into_data() {
        let resp = response(json!({
            "status": 200,
            "message": "ok",
            "data": {"planName": "Quarterly", "remainingDays": 41}
        }));

        let plan: Plan = resp.into_data().unwrap();
        assert_eq!(
            plan,
            Plan {
                plan_name: "Quarterly".into(),
                remaining_days: 41
            }
        );
    }

    #[test]
    fn test_application_status_is_not_trusted() {
        // Transport said 200; a stray envelope status does not turn it into an error
        let resp = response(json!({"status": 500, "message": "weird", "data": [1, 2]}));
        let data: Vec<i32> = resp.into_data().unwrap();
        assert_eq!(data, vec![1, 2]);
    }

    #[test]
    fn test_missing_data_is_decode_error() {
        let resp = response(json!({"status": 200, "message": "done"}));
        assert_eq!(resp.message().as_deref(), Some("done"));
        assert!(matches!(
            resp.into_data::<Plan>(),
            Err(ApiError::Decode(_))
        ));
    }

    #[test]
    fn test_empty_body_envelope() {
        let resp = ApiResponse::new(StatusCode::NO_CONTENT, Vec::new());
        let envelope = resp.envelope::<serde_json::Value>().unwrap();
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_envelope_message_ignores_non_json() {
        assert_eq!(envelope_message(b"<html>502</html>"), None);
        assert_eq!(
            envelope_message(br#"{"message":"Plan expired"}"#).as_deref(),
            Some("Plan expired")
        );
        assert_eq!(envelope_message(br#"{"message":"  "}"#), None);
    }
}
