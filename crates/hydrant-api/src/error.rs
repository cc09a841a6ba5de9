use thiserror::Error;

/// Top-level error type for the `hydrant-api` crate.
///
/// Only construction and configuration can fail with a `Result`:
/// request-time transport failures never surface as errors — the driver
/// converts them into an unsuccessful [`ApiResponse`](crate::ApiResponse)
/// carrying the fixed `E-SERVER-ERROR` code.
#[derive(Debug, Error)]
pub enum Error {
    /// Base endpoint is not a valid URL.
    #[error("Invalid base endpoint: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Token cannot be sent as an HTTP header value.
    #[error("Token is not a valid header value: {0}")]
    InvalidToken(String),

    /// TLS setup or HTTP client construction failed.
    #[error("TLS error: {0}")]
    Tls(String),
}
