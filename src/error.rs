//! Error taxonomy shared by every gateway operation.
//!
//! Each failure carries an HTTP-style code. The dispatcher is the only place
//! that turns a [`GatewayError`] into the client-facing `{code, message}` frame.

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing/invalid session or insufficient role
    Unauthorized,
    /// Malformed input, wrong-role operation, duplicate thing id, invalid schema
    BadRequest,
    /// Data or schema type mismatch, missing schema
    Forbidden,
    /// Owner device has no whitelist to grant from
    WhitelistUnauthorized,
    /// Transport failure reaching the bus or the alias directory
    BadGateway,
    /// No bus response within the deadline
    GatewayTimeout,
    /// Anything without an explicit code
    Internal,
    /// A status returned by the bus or the alias directory with no named kind
    Rejected,
}

impl ErrorKind {
    /// Classify a status code coming back from an upstream service.
    pub fn from_code(code: u16) -> Self {
        match code {
            400 => ErrorKind::BadRequest,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            500 => ErrorKind::Internal,
            502 => ErrorKind::BadGateway,
            504 => ErrorKind::GatewayTimeout,
            _ => ErrorKind::Rejected,
        }
    }
}

/// Structured gateway error: `{kind, code, message}`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct GatewayError {
    kind: ErrorKind,
    code: u16,
    message: String,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, code: u16, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, 401, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, 400, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, 403, message)
    }

    pub fn whitelist_unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::WhitelistUnauthorized, 404, message)
    }

    pub fn bad_gateway() -> Self {
        Self::new(ErrorKind::BadGateway, 502, "Bad Gateway")
    }

    pub fn gateway_timeout() -> Self {
        Self::new(ErrorKind::GatewayTimeout, 504, "Gateway Timeout")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, 500, message)
    }

    /// Error carrying an upstream response's own status code and text.
    pub fn from_status(code: u16, status: impl Into<String>) -> Self {
        Self::new(ErrorKind::from_code(code), code, status)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::internal(format!("Malformed payload: {}", e))
    }
}
