use thiserror::Error;

/// Failures from the reward service API.
///
/// Transience drives the retry policy: transport errors, timeouts and 5xx
/// responses are retried; everything else surfaces immediately.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection, DNS, timeout or body-decoding failure.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status outside the cases handled below.
    #[error("service responded with HTTP {0}")]
    Status(reqwest::StatusCode),

    /// HTTP 405 on the claim endpoint: today's points were already
    /// collected. Terminal and benign, never retried.
    #[error("daily points already claimed")]
    AlreadyClaimed,

    /// The server answered 200 but without the expected acknowledgement.
    #[error("unexpected service response: {0:?}")]
    UnexpectedResponse(String),
}

impl ApiError {
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status(code) => code.is_server_error(),
            ApiError::AlreadyClaimed | ApiError::UnexpectedResponse(_) => false,
        }
    }
}
