//! JSON error bodies returned by the middleware and the issuer endpoints
//!
//! Shape: `{"status": "Unauthorized", "statusCode": 401, "errorMessage": "..."}`,
//! with `errorMessage` omitted when there is nothing safe to say.

use http::header::{CONTENT_TYPE, WWW_AUTHENTICATE};
use http::{HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};

/// Error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Canonical reason phrase
    pub status: String,
    /// HTTP status code
    pub status_code: u16,
    /// Caller-facing detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ErrorResponse {
    /// Body for `status` with an optional message
    pub fn new(status: StatusCode, message: Option<&str>) -> Self {
        Self {
            status: status.canonical_reason().unwrap_or_default().to_string(),
            status_code: status.as_u16(),
            error_message: message.map(str::to_string),
        }
    }
}

/// `WWW-Authenticate` challenge per RFC 6750 §3
///
/// A request that carried no token gets a bare `Bearer` challenge; a rejected
/// token adds `error="invalid_token"`.
pub fn bearer_challenge(invalid_token: bool) -> HeaderValue {
    if invalid_token {
        HeaderValue::from_static(r#"Bearer error="invalid_token""#)
    } else {
        HeaderValue::from_static("Bearer")
    }
}

/// Build a JSON error response for any body type constructible from a `String`
pub fn error_response<B>(status: StatusCode, message: Option<&str>) -> http::Response<B>
where
    B: From<String>,
{
    let body = serde_json::to_string(&ErrorResponse::new(status, message)).unwrap_or_default();

    let mut response = http::Response::new(B::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if status == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, bearer_challenge(message.is_some()));
    }
    response
}

/// [`error_response`] with a specific `WWW-Authenticate` challenge
pub fn unauthorized<B>(message: Option<&str>, invalid_token: bool) -> http::Response<B>
where
    B: From<String>,
{
    let mut response = error_response(StatusCode::UNAUTHORIZED, message);
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, bearer_challenge(invalid_token));
    response
}
