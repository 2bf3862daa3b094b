//! Context-size management for the conversation window.
//!
//! Before each backend call the loop asks the manager to bring the window
//! back under the configured size budget. Compaction only affects what is
//! sent to the backend; the audit trace kept by the loop is never touched.

use std::fmt::{self, Display};

use ratchet_model::{GenerateRequest, TurnMessage};

use crate::backend_client::BackendClient;
use crate::conversation::{Conversation, Role, Turn};

/// Rough chars-per-token ratio used for size estimation.
const CHARS_PER_TOKEN: usize = 4;

/// Per-item overhead accounting for role tags and message framing.
const ITEM_OVERHEAD_TOKENS: usize = 4;

const SUMMARY_INSTRUCTIONS: &str = "You condense agent conversation \
history. Summarize the following turns into a short paragraph that \
preserves every fact, decision, and tool result that later turns may \
depend on. Output only the summary.";

/// How the conversation window is brought back under the size budget.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompactionStrategy {
    /// Drop the oldest droppable turns, in pairs, until under budget.
    #[default]
    SlidingWindow,
    /// Replace the droppable span with a single condensed summary turn,
    /// produced by one extra backend call. Falls back to sliding-window
    /// truncation when the summary call fails.
    Summarize,
}

/// Configuration of the context-size manager.
#[derive(Clone, Debug)]
pub struct ContextConfig {
    /// Estimated-token budget for one backend request.
    pub max_tokens: usize,
    /// Number of most recent turns that are never dropped. The default
    /// covers one full think/act/observe cycle.
    pub keep_recent: usize,
    /// The compaction strategy to apply when over budget.
    pub strategy: CompactionStrategy,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: 32_768,
            keep_recent: 4,
            strategy: CompactionStrategy::default(),
        }
    }
}

/// The minimal retained context (protected prefix plus the recent tail)
/// already exceeds the configured budget; no compaction can help.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextOverflow {
    /// Estimated size of the minimal retained context, in tokens.
    pub estimated_tokens: usize,
    /// The configured budget, in tokens.
    pub max_tokens: usize,
}

impl Display for ContextOverflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "minimal context (~{} tokens) exceeds the budget of {} tokens",
            self.estimated_tokens, self.max_tokens
        )
    }
}

impl std::error::Error for ContextOverflow {}

/// What a `fit` call did to the window.
#[derive(Debug)]
pub(crate) enum Compaction {
    /// The window was already under budget.
    None,
    /// The given number of turns was dropped.
    Dropped(usize),
    /// A span was replaced by this summary turn.
    Summarized(Turn),
}

pub(crate) struct ContextManager {
    config: ContextConfig,
}

impl ContextManager {
    #[inline]
    pub(crate) fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Estimated size of the window, in tokens.
    pub(crate) fn estimate(conversation: &Conversation) -> usize {
        conversation
            .items
            .iter()
            .map(|item| {
                item.turn.content.len() / CHARS_PER_TOKEN
                    + ITEM_OVERHEAD_TOKENS
            })
            .sum()
    }

    /// Brings the window back under the budget, if needed.
    ///
    /// Never drops the leading system turn(s), the original task turn, or
    /// the most recent `keep_recent` turns.
    pub(crate) async fn fit(
        &self,
        conversation: &mut Conversation,
        client: &BackendClient,
        step_index: u32,
    ) -> Result<Compaction, ContextOverflow> {
        let estimated = Self::estimate(conversation);
        if estimated <= self.config.max_tokens {
            return Ok(Compaction::None);
        }

        let (prefix_end, tail_start) = self.droppable_span(conversation);

        let minimal: usize = conversation
            .items
            .iter()
            .enumerate()
            .filter(|(i, _)| *i < prefix_end || *i >= tail_start)
            .map(|(_, item)| {
                item.turn.content.len() / CHARS_PER_TOKEN
                    + ITEM_OVERHEAD_TOKENS
            })
            .sum();
        if minimal > self.config.max_tokens {
            warn!(
                estimated_tokens = minimal,
                max_tokens = self.config.max_tokens,
                "context floor exceeded"
            );
            return Err(ContextOverflow {
                estimated_tokens: minimal,
                max_tokens: self.config.max_tokens,
            });
        }
        if prefix_end >= tail_start {
            return Ok(Compaction::None);
        }

        match self.config.strategy {
            CompactionStrategy::SlidingWindow => Ok(Compaction::Dropped(
                self.truncate(conversation, prefix_end, tail_start),
            )),
            CompactionStrategy::Summarize => {
                match self
                    .summarize(
                        conversation,
                        client,
                        prefix_end,
                        tail_start,
                        step_index,
                    )
                    .await
                {
                    Ok(turn) => Ok(Compaction::Summarized(turn)),
                    Err(reason) => {
                        warn!(
                            %reason,
                            "summary request failed, falling back to \
                             truncation"
                        );
                        Ok(Compaction::Dropped(self.truncate(
                            conversation,
                            prefix_end,
                            tail_start,
                        )))
                    }
                }
            }
        }
    }

    /// Returns the half-open span of droppable items: everything after the
    /// protected prefix and before the most recent `keep_recent` items.
    fn droppable_span(&self, conversation: &Conversation) -> (usize, usize) {
        let items = &conversation.items;
        let mut prefix_end = 0;
        while prefix_end < items.len()
            && items[prefix_end].turn.role == Role::System
        {
            prefix_end += 1;
        }
        // The original task turn is protected too.
        if prefix_end < items.len()
            && items[prefix_end].turn.role == Role::User
        {
            prefix_end += 1;
        }
        let tail_start = items
            .len()
            .saturating_sub(self.config.keep_recent)
            .max(prefix_end);
        (prefix_end, tail_start)
    }

    fn truncate(
        &self,
        conversation: &mut Conversation,
        prefix_end: usize,
        mut tail_start: usize,
    ) -> usize {
        let mut dropped = 0;
        while Self::estimate(conversation) > self.config.max_tokens
            && tail_start - prefix_end >= 2
        {
            conversation.items.drain(prefix_end..prefix_end + 2);
            tail_start -= 2;
            dropped += 2;
        }
        if Self::estimate(conversation) > self.config.max_tokens
            && tail_start > prefix_end
        {
            // A single stray turn is left in the span; dropping the span
            // whole keeps the survivors contiguous.
            conversation.items.drain(prefix_end..tail_start);
            dropped += 1;
        }
        debug!(dropped, "truncated conversation window");
        dropped
    }

    async fn summarize(
        &self,
        conversation: &mut Conversation,
        client: &BackendClient,
        prefix_end: usize,
        tail_start: usize,
        step_index: u32,
    ) -> Result<Turn, String> {
        let span_text = conversation.items[prefix_end..tail_start]
            .iter()
            .map(|item| {
                format!("[{}] {}", role_label(item.turn.role), item.turn.content)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let req = GenerateRequest {
            messages: vec![
                TurnMessage::System(SUMMARY_INSTRUCTIONS.to_owned()),
                TurnMessage::User(span_text),
            ],
            ..Default::default()
        };
        let turn = client
            .generate(req)
            .await
            .map_err(|err| err.to_string())?;
        if turn.text.is_empty() {
            return Err("summary came back empty".to_owned());
        }

        let replaced = tail_start - prefix_end;
        conversation.items.drain(prefix_end..tail_start);
        let summary = conversation.insert(
            prefix_end,
            TurnMessage::User(format!(
                "Summary of earlier turns:\n{}",
                turn.text
            )),
            step_index,
        );
        debug!(replaced, "summarized conversation span");
        Ok(summary)
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Agent => "agent",
        Role::ToolResult => "tool-result",
    }
}

#[cfg(test)]
mod tests {
    use ratchet_model::ToolCallOutcome;
    use ratchet_test_model::{ScriptedBackend, ScriptedTurn};

    use super::*;

    fn client_with_script(script: Vec<ScriptedTurn>) -> BackendClient {
        BackendClient::new(ScriptedBackend::with_script(script))
    }

    /// A conversation with a task turn followed by `cycles` think/act
    /// pairs, each turn roughly 25 estimated tokens.
    fn conversation(cycles: usize) -> Conversation {
        let mut conversation = Conversation::default();
        conversation
            .push(TurnMessage::User("solve the task".to_owned()), 0);
        for step in 0..cycles {
            conversation.push(
                TurnMessage::Agent(format!(
                    "thinking about part {step} of the task at length {}",
                    "x".repeat(40)
                )),
                step as u32 + 1,
            );
            conversation.push(
                TurnMessage::Tool(ToolCallOutcome {
                    id: format!("tool:{step}"),
                    name: "probe".to_owned(),
                    content: format!("observation {step} {}", "y".repeat(40)),
                    success: true,
                }),
                step as u32 + 1,
            );
        }
        conversation
    }

    #[tokio::test]
    async fn test_under_budget_is_untouched() {
        let manager = ContextManager::new(ContextConfig::default());
        let client = client_with_script(vec![]);
        let mut conversation = conversation(3);
        let before = conversation.len();

        let compaction = manager
            .fit(&mut conversation, &client, 1)
            .await
            .unwrap();
        assert!(matches!(compaction, Compaction::None));
        assert_eq!(conversation.len(), before);
    }

    #[tokio::test]
    async fn test_sliding_window_keeps_task_and_tail() {
        let config = ContextConfig {
            max_tokens: 150,
            keep_recent: 4,
            strategy: CompactionStrategy::SlidingWindow,
        };
        let manager = ContextManager::new(config);
        let client = client_with_script(vec![]);
        let mut conversation = conversation(10);
        let tail: Vec<Turn> = conversation.items
            [conversation.len() - 4..]
            .iter()
            .map(|item| item.turn.clone())
            .collect();

        let compaction = manager
            .fit(&mut conversation, &client, 11)
            .await
            .unwrap();
        let Compaction::Dropped(dropped) = compaction else {
            panic!("expected truncation, got {compaction:?}");
        };
        assert!(dropped > 0);
        assert_eq!(dropped % 2, 0);

        // The task turn survives at the front.
        assert_eq!(conversation.items[0].turn.role, Role::User);
        assert_eq!(conversation.items[0].turn.content, "solve the task");
        // The recent tail survives unchanged.
        let kept: Vec<Turn> = conversation.items
            [conversation.len() - 4..]
            .iter()
            .map(|item| item.turn.clone())
            .collect();
        assert_eq!(kept, tail);
        assert!(ContextManager::estimate(&conversation) <= 150);
    }

    #[tokio::test]
    async fn test_context_floor_overflow() {
        let config = ContextConfig {
            max_tokens: 30,
            keep_recent: 4,
            strategy: CompactionStrategy::SlidingWindow,
        };
        let manager = ContextManager::new(config);
        let client = client_with_script(vec![]);
        let mut conversation = conversation(10);
        let before = conversation.len();

        let err = manager
            .fit(&mut conversation, &client, 11)
            .await
            .unwrap_err();
        assert!(err.estimated_tokens > err.max_tokens);
        // The window is left alone; no partial truncation happened.
        assert_eq!(conversation.len(), before);
    }

    #[tokio::test]
    async fn test_summarize_replaces_span() {
        let config = ContextConfig {
            max_tokens: 150,
            keep_recent: 4,
            strategy: CompactionStrategy::Summarize,
        };
        let manager = ContextManager::new(config);
        let client = client_with_script(vec![ScriptedTurn::text(
            "Earlier the agent probed parts 0 through 5.",
        )]);
        let mut conversation = conversation(10);

        let compaction = manager
            .fit(&mut conversation, &client, 11)
            .await
            .unwrap();
        let Compaction::Summarized(summary) = compaction else {
            panic!("expected summary, got {compaction:?}");
        };
        assert_eq!(summary.role, Role::User);
        assert!(summary.content.contains("probed parts 0 through 5"));

        // task turn, summary, then the recent tail.
        assert_eq!(conversation.items[0].turn.content, "solve the task");
        assert_eq!(conversation.items[1].turn, summary);
        assert_eq!(conversation.len(), 2 + 4);
    }

    #[tokio::test]
    async fn test_summarize_falls_back_to_truncation() {
        let config = ContextConfig {
            max_tokens: 150,
            keep_recent: 4,
            strategy: CompactionStrategy::Summarize,
        };
        let manager = ContextManager::new(config);
        // Empty script: the summary call fails.
        let client = client_with_script(vec![]);
        let mut conversation = conversation(10);

        let compaction = manager
            .fit(&mut conversation, &client, 11)
            .await
            .unwrap();
        assert!(matches!(compaction, Compaction::Dropped(_)));
        assert!(ContextManager::estimate(&conversation) <= 150);
    }
}
