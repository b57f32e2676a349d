// Wire types shared by the gateway and the HTTP handlers
use serde::{Deserialize, Serialize};

use crate::provider::{InteractiveProvider, Provider};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Error body returned by the backend API
///
/// Only `readable` is ever shown to end users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendErrorBody {
    pub error_code: i64,
    pub message: String,
    pub readable: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Body of `POST /oauth/generate-code-url`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodeUrlBody {
    pub provider_type: InteractiveProvider,
}

/// Successful response of `POST /oauth/generate-code-url`
#[derive(Debug, Deserialize)]
pub struct CodeUrlResponse {
    #[serde(rename = "codeURL")]
    pub code_url: String,
}

/// Body of `POST /oauth/callback`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeCallbackBody<'a> {
    pub provider_type: InteractiveProvider,
    pub code: &'a str,
    pub state: &'a str,
    pub fingerprint: &'a str,
    pub ip: &'a str,
}

/// Response of the callback endpoint for non-browser clients
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptCreatedResponse {
    pub attempt_id: String,
    pub status_url: String,
}

/// Client-facing view of one callback attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptView {
    pub attempt_id: String,
    pub provider: Provider,
    /// `idle`, `pending`, `succeeded`, `failed` or `timed_out`
    pub status: String,
    pub elapsed_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Where the page should go now, once navigation has fired
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPresenceResponse {
    pub has_session: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backend_error_body_parsing() {
        let body: BackendErrorBody = serde_json::from_value(json!({
            "errorCode": 401,
            "message": "invalid_grant",
            "readable": "Session expired"
        }))
        .unwrap();

        assert_eq!(body.error_code, 401);
        assert_eq!(body.readable, "Session expired");
        assert_eq!(body.details, None);

        assert!(serde_json::from_value::<BackendErrorBody>(json!({"error": "nope"})).is_err());
    }

    #[test]
    fn test_exchange_body_field_names() {
        let body = ExchangeCallbackBody {
            provider_type: Provider::Github.interactive().unwrap(),
            code: "c",
            state: "s",
            fingerprint: "agent",
            ip: "10.0.0.1",
        };

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "providerType": "github",
                "code": "c",
                "state": "s",
                "fingerprint": "agent",
                "ip": "10.0.0.1"
            })
        );
    }

    #[test]
    fn test_code_url_response_field_name() {
        let parsed: CodeUrlResponse =
            serde_json::from_value(json!({"codeURL": "https://accounts.example/auth"})).unwrap();
        assert_eq!(parsed.code_url, "https://accounts.example/auth");
        assert!(serde_json::from_value::<CodeUrlResponse>(json!({"codeUrl": "x"})).is_err());
    }
}
