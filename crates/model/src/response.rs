use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::BackendError;

/// A response from the model backend.
pub trait BackendResponse: Sized + Send + 'static {
    /// The error type that may be returned by the backend.
    type Error: BackendError;

    /// Attempts to pull out the next event from the response.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct response state:
    ///
    /// - `Poll::Pending` means that this response is still waiting for
    ///   the next event. Implementations will ensure that the current
    ///   task will be notified when the next event may be ready.
    /// - `Poll::Ready(Ok(Some(event)))` means the response has an event
    ///   to deliver, and may produce further events on subsequent
    ///   `poll_next_event` calls.
    /// - `Poll::Ready(Ok(None))` means the response has completed.
    /// - `Poll::Ready(Err(error))` means an error occurred while
    ///   processing the response.
    ///
    /// Calling this method after completion should always return `None`.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ResponseEvent>, Self::Error>>;
}

/// The reason why a turn has finished.
///
/// `Stop` is the structured terminal signal: a backend that considers the
/// task resolved must declare it here, the loop never pattern-matches
/// natural-language output for a finish marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinishReason {
    /// The backend needs one or more tools to be called.
    ToolCalls,
    /// The backend has resolved the task.
    Stop,
}

/// Describes a tool call request from the backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// The unique identifier for the tool call request.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The arguments to pass to the tool.
    pub arguments: Value,
}

/// The event from a backend response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseEvent {
    /// The turn has been completed.
    Completed(FinishReason),
    /// Received a text delta.
    TextDelta(String),
    /// Received a tool call request.
    ToolCall(ToolCallRequest),
}
