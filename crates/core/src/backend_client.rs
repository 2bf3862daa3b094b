use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use ratchet_model::{
    BackendError, BackendResponse, FinishReason, GenerateRequest,
    ModelBackend, ResponseEvent, ToolCallRequest,
};
use tracing::Instrument;

type GenerateResult = Result<CompletedTurn, Box<dyn BackendError>>;
type BoxedGenerateFuture =
    Pin<Box<dyn Future<Output = GenerateResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(GenerateRequest) -> BoxedGenerateFuture + Send + Sync>;

/// A wrapper around a model backend that maintains an execution
/// environment for it, drains the streamed response into one complete
/// turn, and provides a type-erased interface for the other modules.
#[derive(Clone)]
pub(crate) struct BackendClient {
    handler_fn: HandlerFn,
}

impl BackendClient {
    #[inline]
    pub(crate) fn new<B: ModelBackend + 'static>(backend: B) -> Self {
        // We have to erase the type `B`, since `BackendClient` doesn't have
        // a generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = backend.generate(&req);
            Box::pin(
                async move {
                    trace!("got a request: {req:?}");
                    let resp_or_err = fut.await;
                    drain_response::<B>(resp_or_err).await
                }
                .instrument(trace_span!("backend client req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and collects the complete turn.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub(crate) async fn generate(&self, req: GenerateRequest) -> GenerateResult {
        (self.handler_fn)(req).await
    }
}

/// A completely received turn from the backend.
///
/// The loop only ever acts on complete turns; whether the backend streamed
/// internally is invisible at this level.
#[derive(Clone, Debug, Default)]
pub(crate) struct CompletedTurn {
    pub text: String,
    /// Tool calls requested by the backend, in request order.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The declared finish reason, if the turn completed properly.
    pub finish_reason: Option<FinishReason>,
}

async fn drain_response<B: ModelBackend + 'static>(
    resp_or_err: Result<B::Response, B::Error>,
) -> GenerateResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut turn = CompletedTurn::default();

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(event) => event,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };

        let Some(event) = event else {
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ResponseEvent::TextDelta(delta) => {
                turn.text.push_str(&delta);
            }
            ResponseEvent::ToolCall(req) => {
                turn.tool_calls.push(req);
            }
            ResponseEvent::Completed(reason) => {
                turn.finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(turn)
}

#[cfg(test)]
mod tests {
    use ratchet_model::TurnMessage;
    use ratchet_test_model::{ScriptEvent, ScriptedBackend, ScriptedTurn};
    use serde_json::json;

    use super::*;

    fn request() -> GenerateRequest {
        GenerateRequest {
            messages: vec![TurnMessage::User("Hi".to_owned())],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_collects_complete_turn() {
        let backend = ScriptedBackend::with_script([ScriptedTurn::with_events(
            [
                ScriptEvent::Text("Sure, ".to_owned()),
                ScriptEvent::Text("let me check.".to_owned()),
                ScriptEvent::ToolCall(ToolCallRequest {
                    id: "tool:1".to_owned(),
                    name: "read_file".to_owned(),
                    arguments: json!({ "path": "todo.txt" }),
                }),
            ],
        )]);
        let client = BackendClient::new(backend);

        let turn = client.generate(request()).await.unwrap();
        assert_eq!(turn.text, "Sure, let me check.");
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_calls[0].name, "read_file");
        assert_eq!(turn.finish_reason, Some(FinishReason::ToolCalls));
    }

    #[tokio::test]
    async fn test_error_handling() {
        let backend = ScriptedBackend::default();
        let client = BackendClient::new(backend);
        let result = client.generate(request()).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ratchet_model::ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_malformed_turn_has_no_finish_reason() {
        let backend =
            ScriptedBackend::with_script([ScriptedTurn::malformed()]);
        let client = BackendClient::new(backend);
        let turn = client.generate(request()).await.unwrap();
        assert!(turn.text.is_empty());
        assert!(turn.tool_calls.is_empty());
        assert_eq!(turn.finish_reason, None);
    }
}
