//! Token endpoint request/response shapes.

use serde::Deserialize;

use crate::error::{AuthError, Result};

/// Path of the OAuth2 client-credentials grant endpoint.
pub const TOKEN_URL: &str = "/auth/v1/token";
/// Path of the legacy username/password login endpoint.
pub const LOGIN_URL: &str = "/auth/v1/login";

/// A token-acquisition request, described abstractly so the crate stays
/// independent of the HTTP engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    /// Path relative to the authentication endpoint.
    pub path: &'static str,
    /// Request body.
    pub body: TokenRequestBody,
}

/// Body of a token-acquisition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRequestBody {
    /// `application/x-www-form-urlencoded` fields.
    Form(Vec<(&'static str, String)>),
    /// JSON object.
    Json(serde_json::Value),
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    message: Option<String>,
}

/// A freshly acquired token and its lifetime in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredToken {
    /// The bearer token.
    pub token: String,
    /// Seconds until expiry.
    pub expires_in: u64,
}

/// Parse a token endpoint response body.
///
/// A body carrying an `error` field is an authentication failure even on a
/// 2xx status; the embedded `message` is surfaced to the caller.
pub fn parse_token_response(status: u16, body: &[u8]) -> Result<AcquiredToken> {
    let parsed: TokenResponse = serde_json::from_slice(body).map_err(|_| {
        if (200..300).contains(&status) {
            AuthError::InvalidTokenResponse(String::from_utf8_lossy(body).into_owned())
        } else {
            AuthError::Authentication(format!("server returned status {status}"))
        }
    })?;

    if let Some(error) = parsed.error {
        let message = parsed
            .message
            .unwrap_or_else(|| format!("unknown server error: {error}"));
        return Err(AuthError::Authentication(message));
    }
    if !(200..300).contains(&status) {
        return Err(AuthError::Authentication(format!(
            "server returned status {status}"
        )));
    }

    match (parsed.access_token, parsed.expires_in) {
        (Some(token), Some(expires_in)) => Ok(AcquiredToken { token, expires_in }),
        _ => Err(AuthError::InvalidTokenResponse(
            "missing access_token or expires_in".to_owned(),
        )),
    }
}

/// Extract an HTTP status code hidden inside a 500 response body.
///
/// Gateways occasionally wrap upstream errors, e.g.
/// `Received error from remote server ... HTTP status code: 401 Unauthorized,
/// body: failed to verify JWT token`. The real status is needed to decide
/// whether a token refresh is warranted.
#[must_use]
pub fn internal_error_code(status: u16, body: &[u8]) -> Option<u16> {
    if status != 500 {
        return None;
    }
    let text = std::str::from_utf8(body).ok()?;
    let tail = text.split("HTTP status code: ").nth(1)?;
    let code: u16 = tail.split_whitespace().next()?.parse().ok()?;
    tracing::debug!(code, "detected an internal server error with embedded status");
    Some(code)
}

/// Whether a response should be treated as 401 Unauthorized.
#[must_use]
pub fn is_unauthorized(status: u16, body: &[u8]) -> bool {
    status == 401 || internal_error_code(status, body) == Some(401)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token_response_ok() {
        let body = br#"{"access_token": "abc", "expires_in": 3600, "token_type": "Bearer"}"#;
        let acquired = parse_token_response(200, body).unwrap();
        assert_eq!(acquired.token, "abc");
        assert_eq!(acquired.expires_in, 3600);
    }

    #[test]
    fn test_parse_token_response_error_field() {
        let body = br#"{"error": "invalid_client", "message": "bad credentials"}"#;
        let err = parse_token_response(200, body).unwrap_err();
        assert!(matches!(err, AuthError::Authentication(m) if m == "bad credentials"));
    }

    #[test]
    fn test_parse_token_response_error_without_message() {
        let body = br#"{"error": "invalid_client"}"#;
        let err = parse_token_response(200, body).unwrap_err();
        assert!(matches!(err, AuthError::Authentication(m) if m.contains("invalid_client")));
    }

    #[test]
    fn test_parse_token_response_http_error() {
        let err = parse_token_response(503, b"unavailable").unwrap_err();
        assert!(matches!(err, AuthError::Authentication(m) if m.contains("503")));
    }

    #[test]
    fn test_parse_token_response_missing_fields() {
        let err = parse_token_response(200, br#"{"access_token": "abc"}"#).unwrap_err();
        assert!(matches!(err, AuthError::InvalidTokenResponse(_)));
    }

    #[test]
    fn test_internal_error_code() {
        let body = b"Received error from remote server /engines:getIdByName. \
            HTTP status code: 401 Unauthorized, body: failed to verify JWT token";
        assert_eq!(internal_error_code(500, body), Some(401));
        assert_eq!(internal_error_code(500, b"no code here"), None);
        assert_eq!(internal_error_code(401, body), None);
    }

    #[test]
    fn test_is_unauthorized() {
        assert!(is_unauthorized(401, b""));
        assert!(is_unauthorized(500, b"HTTP status code: 401 Unauthorized"));
        assert!(!is_unauthorized(500, b"HTTP status code: 403 Forbidden"));
        assert!(!is_unauthorized(200, b""));
    }
}
