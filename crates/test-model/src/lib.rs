//! A local scripted backend for testing purpose.
//!
//! Before sending requests, set up the script, which is the ordered list
//! of turns the backend should produce. Turns are consumed in call order;
//! a turn may be configured to fail a number of times before it is
//! delivered, which is how retry behavior is exercised in tests. If the
//! script runs out (and `repeat_last` is not set), an error is returned.

mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use ratchet_model::{
    BackendError, BackendResponse, ErrorKind, GenerateRequest, ModelBackend,
    ResponseEvent,
};
use tokio::time::sleep;

pub use preset::*;

/// The error produced by a scripted backend.
#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl BackendError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// A fully buffered response that replays the events of one scripted turn.
#[derive(Debug)]
pub struct ScriptedResponse {
    events: Vec<ResponseEvent>,
    event_idx: usize,
}

impl BackendResponse for ScriptedResponse {
    type Error = Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ResponseEvent>, Self::Error>> {
        let _ = cx;
        let this = self.get_mut();
        if this.event_idx < this.events.len() {
            let event = this.events[this.event_idx].clone();
            this.event_idx += 1;
            return Poll::Ready(Ok(Some(event)));
        }
        // In case this method is called after completion.
        Poll::Ready(Ok(None))
    }
}

#[derive(Default)]
struct ScriptState {
    cursor: usize,
    /// Failures left for the turn at `cursor`; lazily initialized from
    /// the turn's `failures` field.
    failures_left: Option<u32>,
    calls: u32,
}

/// A local scripted backend for testing purpose.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Vec<ScriptedTurn>,
    latency: Option<Duration>,
    repeat_last: bool,
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedBackend {
    /// Creates a backend that will play the given turns in order.
    pub fn with_script(script: impl Into<Vec<ScriptedTurn>>) -> Self {
        Self {
            script: script.into(),
            ..Default::default()
        }
    }

    /// Appends a turn to the script.
    #[inline]
    pub fn push_turn(&mut self, turn: ScriptedTurn) {
        self.script.push(turn);
    }

    /// Adds artificial latency before every generate call resolves.
    #[inline]
    pub fn set_latency(&mut self, latency: Duration) {
        self.latency = Some(latency);
    }

    /// Keeps replaying the final scripted turn once the script runs out,
    /// modeling a backend that never terminates.
    #[inline]
    pub fn set_repeat_last(&mut self, repeat_last: bool) {
        self.repeat_last = repeat_last;
    }

    /// Returns the total number of generate calls observed so far,
    /// including calls answered with injected failures.
    #[inline]
    pub fn calls(&self) -> u32 {
        self.state.lock().unwrap().calls
    }

    fn next_result(&self) -> Result<ScriptedResponse, Error> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;

        let last_idx = self.script.len().checked_sub(1);
        let idx = if self.repeat_last {
            match last_idx {
                Some(last) => state.cursor.min(last),
                None => {
                    return Err(Error {
                        message: "script is empty",
                        kind: ErrorKind::Other,
                    });
                }
            }
        } else {
            if state.cursor >= self.script.len() {
                return Err(Error {
                    message: "script exhausted",
                    kind: ErrorKind::Other,
                });
            }
            state.cursor
        };

        let turn = &self.script[idx];
        let failures_left = state.failures_left.get_or_insert(turn.failures);
        if *failures_left > 0 {
            if *failures_left != u32::MAX {
                *failures_left -= 1;
            }
            return Err(Error {
                message: "injected failure",
                kind: turn.failure_kind,
            });
        }

        state.cursor = idx + 1;
        state.failures_left = None;

        let mut events: Vec<ResponseEvent> = turn
            .events
            .iter()
            .map(|event| match event {
                ScriptEvent::Text(text) => {
                    ResponseEvent::TextDelta(text.clone())
                }
                ScriptEvent::ToolCall(req) => {
                    ResponseEvent::ToolCall(req.clone())
                }
            })
            .collect();
        if let Some(finish) = turn.finish {
            events.push(ResponseEvent::Completed(finish));
        }

        Ok(ScriptedResponse {
            events,
            event_idx: 0,
        })
    }
}

impl ModelBackend for ScriptedBackend {
    type Error = Error;
    type Response = ScriptedResponse;

    fn generate(
        &self,
        req: &GenerateRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let _ = req;
        let latency = self.latency;
        let result = self.next_result();
        async move {
            if let Some(latency) = latency {
                sleep(latency).await;
            }
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use ratchet_model::{FinishReason, ToolCallRequest};
    use serde_json::json;

    use super::*;

    async fn collect(
        resp: ScriptedResponse,
    ) -> (String, Vec<ToolCallRequest>, Option<FinishReason>) {
        let mut resp = pin!(resp);
        let mut text = String::new();
        let mut tool_calls = vec![];
        let mut finish = None;
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx))
                .await
                .unwrap()
        {
            match event {
                ResponseEvent::TextDelta(delta) => text.push_str(&delta),
                ResponseEvent::ToolCall(req) => tool_calls.push(req),
                ResponseEvent::Completed(reason) => finish = Some(reason),
            }
        }
        (text, tool_calls, finish)
    }

    #[tokio::test]
    async fn test_turns_consumed_in_order() {
        let backend = ScriptedBackend::with_script([
            ScriptedTurn::tool_call(ToolCallRequest {
                id: "tool:1".to_owned(),
                name: "read_file".to_owned(),
                arguments: json!({ "path": "todo.txt" }),
            }),
            ScriptedTurn::text("All done."),
        ]);

        let req = GenerateRequest::default();
        let resp = backend.generate(&req).await.unwrap();
        let (text, tool_calls, finish) = collect(resp).await;
        assert!(text.is_empty());
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].name, "read_file");
        assert_eq!(finish, Some(FinishReason::ToolCalls));

        let resp = backend.generate(&req).await.unwrap();
        let (text, tool_calls, finish) = collect(resp).await;
        assert_eq!(text, "All done.");
        assert!(tool_calls.is_empty());
        assert_eq!(finish, Some(FinishReason::Stop));

        let err = backend.generate(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let backend = ScriptedBackend::with_script([ScriptedTurn::text(
            "eventually",
        )
        .with_failures(2, ErrorKind::RateLimited)]);

        let req = GenerateRequest::default();
        for _ in 0..2 {
            let err = backend.generate(&req).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::RateLimited);
        }
        let resp = backend.generate(&req).await.unwrap();
        let (text, _, _) = collect(resp).await;
        assert_eq!(text, "eventually");
    }

    #[tokio::test]
    async fn test_repeat_last() {
        let mut backend =
            ScriptedBackend::with_script([ScriptedTurn::text("again")]);
        backend.set_repeat_last(true);

        let req = GenerateRequest::default();
        for _ in 0..3 {
            let resp = backend.generate(&req).await.unwrap();
            let (text, _, _) = collect(resp).await;
            assert_eq!(text, "again");
        }
    }

    #[tokio::test]
    async fn test_malformed_turn_never_completes() {
        let backend =
            ScriptedBackend::with_script([ScriptedTurn::malformed()]);
        let resp = backend.generate(&GenerateRequest::default()).await.unwrap();
        let (text, tool_calls, finish) = collect(resp).await;
        assert!(text.is_empty());
        assert!(tool_calls.is_empty());
        assert_eq!(finish, None);
    }
}
