use ratchet_model::{ErrorKind, FinishReason, ToolCallRequest};
use serde::{Deserialize, Serialize};

/// The events in a scripted turn.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ScriptEvent {
    /// A text delta.
    #[serde(rename = "text")]
    Text(String),
    /// A tool call request.
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallRequest),
}

/// One scripted backend turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptedTurn {
    /// Events emitted by this turn, in order.
    pub events: Vec<ScriptEvent>,
    /// The declared finish reason. `None` produces a turn that never
    /// completes, which the loop treats as malformed output.
    pub finish: Option<FinishReason>,
    /// The first `failures` generate calls for this turn fail with
    /// [`ScriptedTurn::failure_kind`] before the turn is delivered.
    /// `u32::MAX` means the turn always fails.
    #[serde(default)]
    pub failures: u32,
    /// The error kind used for injected failures.
    #[serde(default = "default_failure_kind")]
    pub failure_kind: ErrorKind,
}

fn default_failure_kind() -> ErrorKind {
    ErrorKind::Unavailable
}

impl ScriptedTurn {
    /// Creates a turn from raw events, deriving the finish reason from
    /// whether any tool call is present.
    pub fn with_events(events: impl Into<Vec<ScriptEvent>>) -> Self {
        let events = events.into();
        let has_tool_call =
            events.iter().any(|e| matches!(e, ScriptEvent::ToolCall(_)));
        let finish = Some(if has_tool_call {
            FinishReason::ToolCalls
        } else {
            FinishReason::Stop
        });
        Self {
            events,
            finish,
            failures: 0,
            failure_kind: default_failure_kind(),
        }
    }

    /// Creates a plain text turn that declares the task resolved.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::with_events([ScriptEvent::Text(text.into())])
    }

    /// Creates a turn that requests a single tool call.
    #[inline]
    pub fn tool_call(req: ToolCallRequest) -> Self {
        Self::with_events([ScriptEvent::ToolCall(req)])
    }

    /// Creates a turn with no events and no finish declaration.
    #[inline]
    pub fn malformed() -> Self {
        Self {
            events: vec![],
            finish: None,
            failures: 0,
            failure_kind: default_failure_kind(),
        }
    }

    /// Overrides the declared finish reason.
    #[inline]
    pub fn with_finish(mut self, finish: Option<FinishReason>) -> Self {
        self.finish = finish;
        self
    }

    /// Sets failure times before the turn is delivered. `u32::MAX` means
    /// the turn always fails.
    #[inline]
    pub fn with_failures(mut self, failures: u32, kind: ErrorKind) -> Self {
        self.failures = failures;
        self.failure_kind = kind;
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let turn = ScriptedTurn::with_events([
            ScriptEvent::Text("Let me check that file.".to_string()),
            ScriptEvent::ToolCall(ToolCallRequest {
                id: "1".to_string(),
                name: "read_file".to_string(),
                arguments: json!({ "path": "message.txt" }),
            }),
        ])
        .with_failures(2, ErrorKind::RateLimited);

        let serialized = serde_json::to_string(&turn).unwrap();
        let deserialized: ScriptedTurn =
            serde_json::from_str(&serialized).unwrap();

        assert_eq!(turn, deserialized);
    }

    #[test]
    fn test_derived_finish() {
        assert_eq!(
            ScriptedTurn::text("done").finish,
            Some(FinishReason::Stop)
        );
        let turn = ScriptedTurn::tool_call(ToolCallRequest {
            id: "1".to_string(),
            name: "noop".to_string(),
            arguments: json!({}),
        });
        assert_eq!(turn.finish, Some(FinishReason::ToolCalls));
        assert_eq!(ScriptedTurn::malformed().finish, None);
    }
}
