use std::error::Error;

use crate::error::ErrorKind;
use crate::request::GenerateRequest;
use crate::response::BackendResponse;

/// The error type for a model backend.
pub trait BackendError: Error + Send + Sync + 'static {
    /// Returns the classified kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A type that represents a reasoning backend, which turns a conversation
/// plus a set of tool declarations into the next agent turn.
///
/// Once the backend is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it,
/// and the backend should be prepared for being dropped anytime.
pub trait ModelBackend: Send + Sync {
    /// The error type that may be returned by the backend.
    type Error: BackendError;

    /// The response type for this backend.
    type Response: BackendResponse<Error = Self::Error>;

    /// Starts generating the next turn for the given request.
    ///
    /// The response may stream internally; callers drain it to completion
    /// before acting on it.
    fn generate(
        &self,
        req: &GenerateRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
}
