use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors produced by the gate and its collaborators.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Missing or invalid startup configuration. Fatal at startup,
    /// never produced at request time.
    #[error("configuration error: {0}")]
    Config(String),

    /// The introspection endpoint could not be reached or read.
    #[error("token introspection request failed: {0}")]
    Introspection(#[from] reqwest::Error),

    /// The introspection endpoint answered with a body that is not a claim.
    #[error("token introspection returned a malformed body: {0}")]
    MalformedClaim(#[from] serde_json::Error),

    /// One or more claim policy checks failed. The message lists every
    /// check name with its outcome.
    #[error("invalid claim:\n{0}")]
    ClaimPolicy(String),

    /// The sealed session cookie could not be opened or written.
    #[error("session error: {0}")]
    Session(String),
}

/// Clients only ever see a generic message; causes stay in the logs.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = match self {
            Self::Introspection(_) | Self::MalformedClaim(_) | Self::ClaimPolicy(_) => {
                "The presented claim is invalid."
            }
            Self::Session(_) => "Unable to validate session.",
            Self::Config(_) => "Internal error",
        };
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}
