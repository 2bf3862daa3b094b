use serde::{Deserialize, Serialize};

/// The classified kind of a backend error.
///
/// The agent loop only ever branches on this tag. Transient kinds may be
/// retried per policy; all other kinds terminate the run immediately.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The backend is rate limited.
    RateLimited,
    /// The backend is temporarily unavailable.
    Unavailable,
    /// The request timed out.
    Timeout,
    /// The credentials were rejected.
    Auth,
    /// The request itself was malformed.
    InvalidArgument,
    /// The content was blocked by a safety system.
    SafetyBlocked,
    /// Any other errors.
    Other,
}

impl ErrorKind {
    /// Whether this kind is expected to be transient and safe to retry
    /// without duplicating side effects.
    #[inline]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::RateLimited | Self::Unavailable | Self::Timeout)
    }
}
