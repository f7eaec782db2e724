use jsonrpsee::{core::ClientError, types::ErrorObjectOwned};
use startos_client_core::id::InvalidId;

pub type ApiResult<T> = Result<T, ApiError>;

/// Error codes the server attaches to JSON-RPC errors.
pub mod code {
    pub const CONFIG_SPEC_VIOLATION: i32 = 4;
    pub const CONFIG_RULES_VIOLATION: i32 = 5;
    pub const NOT_FOUND: i32 = 6;
    pub const NETWORK: i32 = 9;
    pub const INVALID_PACKAGE_ID: i32 = 30;
    pub const AUTHORIZATION: i32 = 34;
    pub const INVALID_REQUEST: i32 = 38;
    pub const PARSE_NET_ADDRESS: i32 = 41;
    pub const PARSE_SSH_KEY: i32 = 42;
    pub const DUPLICATE: i32 = 53;
    pub const INCOHERENT: i32 = 55;
    pub const TIMEOUT: i32 = 71;
}

/// Failure of a remote call.
///
/// A failed command never implies anything about the state of the server;
/// that is only ever learned from the patch stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The session is missing or expired. Log in again; other calls are not
    /// affected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid request: {0}")]
    Validation(String),
    /// The server state changed since the request was formed.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("server error {code}: {message}")]
    Remote { code: i32, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    /// Classify an error reported by the server.
    pub fn from_code(code: i32, message: String) -> Self {
        match code {
            code::AUTHORIZATION => ApiError::Unauthorized(message),
            code::NOT_FOUND => ApiError::NotFound(message),
            code::TIMEOUT => ApiError::Timeout,
            code::NETWORK => ApiError::Network(message),
            code::DUPLICATE | code::INCOHERENT => ApiError::Conflict(message),
            code::CONFIG_SPEC_VIOLATION
            | code::CONFIG_RULES_VIOLATION
            | code::INVALID_PACKAGE_ID
            | code::INVALID_REQUEST
            | code::PARSE_NET_ADDRESS
            | code::PARSE_SSH_KEY => ApiError::Validation(message),
            jsonrpsee::types::error::INVALID_PARAMS_CODE
            | jsonrpsee::types::error::INVALID_REQUEST_CODE => ApiError::Validation(message),
            code => ApiError::Remote { code, message },
        }
    }
}

impl From<ErrorObjectOwned> for ApiError {
    fn from(e: ErrorObjectOwned) -> Self {
        ApiError::from_code(e.code(), e.message().to_owned())
    }
}

impl From<ClientError> for ApiError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Call(e) => e.into(),
            ClientError::RequestTimeout => ApiError::Timeout,
            ClientError::ParseError(e) => ApiError::Decode(e.to_string()),
            e => ApiError::Network(e.to_string()),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ApiError::Timeout;
        }
        if e.is_decode() {
            return ApiError::Decode(e.to_string());
        }
        match e.status().map(|s| s.as_u16()) {
            Some(401) | Some(403) => ApiError::Unauthorized(e.to_string()),
            Some(404) => ApiError::NotFound(e.to_string()),
            Some(409) => ApiError::Conflict(e.to_string()),
            Some(400) | Some(413) | Some(422) => ApiError::Validation(e.to_string()),
            _ => ApiError::Network(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

impl From<InvalidId> for ApiError {
    fn from(e: InvalidId) -> Self {
        ApiError::Validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonrpsee::types::ErrorObject;

    fn remote(code: i32) -> ApiError {
        ErrorObject::owned(code, "message", None::<()>).into()
    }

    #[test]
    fn test_error_codes() {
        assert!(remote(code::AUTHORIZATION).is_unauthorized());
        assert_eq!(remote(code::NOT_FOUND), ApiError::NotFound("message".into()));
        assert_eq!(remote(code::DUPLICATE), ApiError::Conflict("message".into()));
        assert_eq!(remote(code::TIMEOUT), ApiError::Timeout);
        assert_eq!(
            remote(code::INVALID_PACKAGE_ID),
            ApiError::Validation("message".into())
        );
        assert_eq!(
            remote(-32602),
            ApiError::Validation("message".into())
        );
        assert_eq!(
            remote(1),
            ApiError::Remote {
                code: 1,
                message: "message".into()
            }
        );
    }

    #[test]
    fn test_only_authorization_is_unauthorized() {
        for c in [1, 4, 6, 9, 53, 71, -32603] {
            assert!(!remote(c).is_unauthorized(), "{}", c);
        }
    }

    #[test]
    fn test_client_errors() {
        assert_eq!(ApiError::from(ClientError::RequestTimeout), ApiError::Timeout);
        assert!(matches!(
            ApiError::from(ClientError::Custom("boom".into())),
            ApiError::Network(_)
        ));
    }
}
