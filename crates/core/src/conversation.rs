//! Conversation state and the serialized trace format.

use std::time::{SystemTime, UNIX_EPOCH};

use ratchet_model::{ToolCallOutcome, TurnMessage};
use serde::{Deserialize, Serialize};

/// The role of a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// System instructions.
    System,
    /// User input (including synthetic observations the loop injects).
    User,
    /// Backend-produced text.
    Agent,
    /// The recorded outcome of a tool call.
    ToolResult,
}

/// One entry of the persisted trace.
///
/// This is the one artifact kept bit-exact: serialized traces are used as
/// test fixtures and for debugging, so the format must round-trip through
/// JSON without loss.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// The role of this turn.
    pub role: Role,
    /// The textual content of this turn.
    pub content: String,
    /// Milliseconds since the Unix epoch at which the turn was recorded.
    pub timestamp_ms: u64,
    /// The loop step that produced this turn (0 for the initial turns).
    pub step_index: u32,
}

/// The conversation owned by one running loop.
///
/// Mutated only by that loop, and dropped when the loop session ends.
/// Note that this is the live window sent to the backend; the full audit
/// trace is accumulated separately so context compaction never loses
/// audit information.
#[derive(Clone, Default, Debug)]
pub struct Conversation {
    pub(crate) items: Vec<Item>,
}

/// An item in the conversation.
#[derive(Clone, Debug)]
pub(crate) struct Item {
    pub(crate) msg: TurnMessage,
    pub(crate) turn: Turn,
}

impl Conversation {
    /// Appends a message, recording it as a turn with the given step
    /// index. Returns a copy of the recorded turn.
    pub(crate) fn push(&mut self, msg: TurnMessage, step_index: u32) -> Turn {
        let item = make_item(msg, step_index);
        let turn = item.turn.clone();
        self.items.push(item);
        turn
    }

    /// Inserts a message at the given position. Used by context
    /// compaction to place a summary where the condensed span was.
    pub(crate) fn insert(
        &mut self,
        index: usize,
        msg: TurnMessage,
        step_index: u32,
    ) -> Turn {
        let item = make_item(msg, step_index);
        let turn = item.turn.clone();
        self.items.insert(index, item);
        turn
    }

    /// Returns the messages to include in the next backend request.
    pub(crate) fn messages(&self) -> Vec<TurnMessage> {
        self.items.iter().map(|item| item.msg.clone()).collect()
    }

    /// Returns the number of items currently in the window.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the conversation is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn make_item(msg: TurnMessage, step_index: u32) -> Item {
    let (role, content) = match &msg {
        TurnMessage::System(text) => (Role::System, text.clone()),
        TurnMessage::User(text) => (Role::User, text.clone()),
        TurnMessage::Agent(text) => (Role::Agent, text.clone()),
        TurnMessage::Tool(outcome) => {
            (Role::ToolResult, render_tool_outcome(outcome))
        }
    };
    let turn = Turn {
        role,
        content,
        timestamp_ms: now_ms(),
        step_index,
    };
    Item { msg, turn }
}

fn render_tool_outcome(outcome: &ToolCallOutcome) -> String {
    if outcome.success {
        format!("{}: {}", outcome.name, outcome.content)
    } else {
        format!("{} failed: {}", outcome.name, outcome.content)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_round_trip_is_bit_exact() {
        let trace = vec![
            Turn {
                role: Role::User,
                content: "compute 2+2 then stop".to_string(),
                timestamp_ms: 1_700_000_000_000,
                step_index: 0,
            },
            Turn {
                role: Role::Agent,
                content: String::new(),
                timestamp_ms: 1_700_000_000_100,
                step_index: 1,
            },
            Turn {
                role: Role::ToolResult,
                content: "calculate: 4".to_string(),
                timestamp_ms: 1_700_000_000_200,
                step_index: 1,
            },
        ];

        let serialized = serde_json::to_string(&trace).unwrap();
        let deserialized: Vec<Turn> =
            serde_json::from_str(&serialized).unwrap();
        assert_eq!(trace, deserialized);
        // Round-tripping again must produce the same bytes.
        assert_eq!(serde_json::to_string(&deserialized).unwrap(), serialized);
    }

    #[test]
    fn test_role_wire_names() {
        let record = Turn {
            role: Role::ToolResult,
            content: "ok".to_string(),
            timestamp_ms: 42,
            step_index: 3,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"role":"tool-result","content":"ok","timestamp_ms":42,"step_index":3}"#
        );
        assert_eq!(
            serde_json::to_string(&Role::System).unwrap(),
            r#""system""#
        );
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
        assert_eq!(serde_json::to_string(&Role::Agent).unwrap(), r#""agent""#);
    }

    #[test]
    fn test_push_renders_tool_outcomes() {
        let mut conversation = Conversation::default();
        conversation.push(TurnMessage::User("hi".to_string()), 0);
        let turn = conversation.push(
            TurnMessage::Tool(ToolCallOutcome {
                id: "tool:1".to_string(),
                name: "ghost".to_string(),
                content: "tool `ghost` is not available".to_string(),
                success: false,
            }),
            1,
        );
        assert_eq!(turn.role, Role::ToolResult);
        assert_eq!(turn.content, "ghost failed: tool `ghost` is not available");
        assert_eq!(conversation.len(), 2);
    }
}
