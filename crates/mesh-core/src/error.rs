use crate::identity::Instance;

/// Errors the core can surface to its host application.
///
/// Decoder "reject" is deliberately not a variant here — it's a signal to
/// try the next decoder, not a failure. It lives in
/// [`crate::packet::codec::DecodeOutcome`] instead.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("buffer exhausted before a complete packet could be decoded")]
    Truncated,

    #[error("stream closed")]
    StreamClosed,

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("malformed prefix on an established stream")]
    ProtocolViolation,

    #[error("no route to destination {0}")]
    UnreachableDestination(Instance),

    #[error("internet request to {url} timed out")]
    HttpTimeout { url: String },

    #[error("internet request failed: {0}")]
    HttpIo(#[from] reqwest::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("buffer capacity exceeded")]
    OutOfMemory,
}

// `reqwest::Error` isn't `Clone`, so this can't be derived. Callers that
// need to hand the same failure to two sinks (e.g. closing a stream and
// reporting the closure upward) go through here; the HTTP case is
// flattened to its message since the original error type doesn't survive
// the trip.
impl Clone for CoreError {
    fn clone(&self) -> Self {
        match self {
            Self::Truncated => Self::Truncated,
            Self::StreamClosed => Self::StreamClosed,
            Self::WriteFailed(msg) => Self::WriteFailed(msg.clone()),
            Self::ProtocolViolation => Self::ProtocolViolation,
            Self::UnreachableDestination(instance) => Self::UnreachableDestination(*instance),
            Self::HttpTimeout { url } => Self::HttpTimeout { url: url.clone() },
            Self::HttpIo(err) => Self::WriteFailed(err.to_string()),
            Self::InvalidConfig(msg) => Self::InvalidConfig(msg.clone()),
            Self::OutOfMemory => Self::OutOfMemory,
        }
    }
}
