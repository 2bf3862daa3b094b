mod builder;
mod outcome;

use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use futures_util::StreamExt;
use futures_util::stream;
use ratchet_model::{
    FinishReason, GenerateConfig, GenerateRequest, ToolCallOutcome,
    ToolCallRequest, TurnMessage,
};
use tokio::time::{Instant, sleep, timeout};

use crate::backend_client::{BackendClient, CompletedTurn};
use crate::cancel::CancelToken;
use crate::context::{Compaction, ContextManager};
use crate::conversation::{Conversation, Turn};
use crate::retry::RetryPolicy;
use crate::tool::Registry;
pub use builder::AgentLoopBuilder;
pub use outcome::{FailureReason, LoopOutcome, LoopStatus};

/// The synthetic observation fed back after a turn with no text, no tool
/// call, and no finish signal.
const MALFORMED_TURN_NUDGE: &str = "The last turn contained no text, no \
tool call, and no finish signal. Continue working on the task or finish \
with the final answer.";

/// A precondition violation detected before the loop starts.
///
/// This is the only error [`AgentLoop::run`] surfaces directly;
/// everything that happens mid-run is reported through the returned
/// [`LoopOutcome`] instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigError {
    /// The task string is empty.
    EmptyTask,
    /// `max_steps` must be at least 1.
    ZeroMaxSteps,
    /// `max_duration` must be positive.
    ZeroMaxDuration,
    /// The retry policy must allow at least one attempt.
    ZeroMaxAttempts,
    /// `tool_fan_out` must be at least 1.
    ZeroToolFanOut,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyTask => write!(f, "task must not be empty"),
            ConfigError::ZeroMaxSteps => {
                write!(f, "max_steps must be at least 1")
            }
            ConfigError::ZeroMaxDuration => {
                write!(f, "max_duration must be positive")
            }
            ConfigError::ZeroMaxAttempts => {
                write!(f, "retry policy must allow at least one attempt")
            }
            ConfigError::ZeroToolFanOut => {
                write!(f, "tool_fan_out must be at least 1")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// A bounded think/act/observe loop over a reasoning backend and a
/// registry of tools.
///
/// One instance drives exactly one task: [`AgentLoop::run`] consumes the
/// loop and returns a [`LoopOutcome`] carrying the terminal status and
/// the full trace of what was attempted, even on failure. Per-tool and
/// per-step problems are absorbed into observations whenever plausible so
/// the backend can self-correct; only fatal backend errors, context
/// overflow, retry exhaustion, and cancellation terminate the run.
pub struct AgentLoop {
    pub(crate) client: BackendClient,
    pub(crate) registry: Arc<Registry>,
    pub(crate) system_prompt: Option<String>,
    pub(crate) generate_config: GenerateConfig,
    pub(crate) max_steps: u32,
    pub(crate) max_duration: Duration,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) context: ContextManager,
    pub(crate) tool_fan_out: usize,
    pub(crate) cancel: CancelToken,
}

enum RequestError {
    DeadlineExceeded,
    Backend {
        kind: ratchet_model::ErrorKind,
        message: String,
        attempts: u32,
    },
}

impl AgentLoop {
    /// Runs the loop on the given task until it is resolved, the step or
    /// time budget is exhausted, or an unrecoverable error occurs.
    pub async fn run(
        mut self,
        task: impl Into<String>,
    ) -> Result<LoopOutcome, ConfigError> {
        let task = task.into();
        self.validate(&task)?;

        let deadline = Instant::now() + self.max_duration;
        let mut conversation = Conversation::default();
        let mut trace: Vec<Turn> = Vec::new();

        if let Some(prompt) = self.system_prompt.take() {
            trace.push(conversation.push(TurnMessage::System(prompt), 0));
        }
        trace.push(conversation.push(TurnMessage::User(task), 0));

        let mut steps = 0u32;
        let mut last_text: Option<String> = None;

        let status = loop {
            if self.cancel.is_cancelled() {
                info!(steps, "loop cancelled");
                break LoopStatus::Failed(FailureReason::Cancelled);
            }
            if steps >= self.max_steps {
                debug!(steps, "step budget exhausted");
                break LoopStatus::Exhausted;
            }
            if Instant::now() >= deadline {
                debug!(steps, "time budget exhausted");
                break LoopStatus::Exhausted;
            }
            steps += 1;

            match self
                .context
                .fit(&mut conversation, &self.client, steps)
                .await
            {
                Ok(Compaction::None) => {}
                Ok(Compaction::Dropped(dropped)) => {
                    debug!(step = steps, dropped, "compacted conversation");
                }
                Ok(Compaction::Summarized(turn)) => {
                    debug!(step = steps, "summarized conversation");
                    trace.push(turn);
                }
                Err(overflow) => {
                    error!(step = steps, %overflow, "context overflow");
                    break LoopStatus::Failed(FailureReason::ContextOverflow);
                }
            }

            let turn = match self.request_turn(&conversation, deadline).await
            {
                Ok(turn) => turn,
                Err(RequestError::DeadlineExceeded) => {
                    debug!(step = steps, "deadline hit awaiting the backend");
                    break LoopStatus::Exhausted;
                }
                Err(RequestError::Backend {
                    kind,
                    message,
                    attempts,
                }) => {
                    break LoopStatus::Failed(FailureReason::Backend {
                        kind,
                        message,
                        attempts,
                    });
                }
            };

            if !turn.text.is_empty() {
                last_text = Some(turn.text.clone());
                trace.push(
                    conversation
                        .push(TurnMessage::Agent(turn.text.clone()), steps),
                );
            }

            if turn.finish_reason == Some(FinishReason::Stop) {
                if !turn.tool_calls.is_empty() {
                    // A declared finish always wins over pending actions.
                    debug!(
                        step = steps,
                        skipped = turn.tool_calls.len(),
                        "finish declared alongside tool calls"
                    );
                }
                break LoopStatus::Completed;
            }

            if !turn.tool_calls.is_empty() {
                let outcomes =
                    self.dispatch_tool_calls(turn.tool_calls, deadline).await;
                for outcome in outcomes {
                    trace.push(
                        conversation.push(TurnMessage::Tool(outcome), steps),
                    );
                }
                continue;
            }

            if !turn.text.is_empty() {
                // No further tool call requested: the text is the answer.
                break LoopStatus::Completed;
            }

            warn!(step = steps, "backend produced a malformed turn");
            trace.push(conversation.push(
                TurnMessage::User(MALFORMED_TURN_NUDGE.to_owned()),
                steps,
            ));
        };

        let final_answer = match &status {
            LoopStatus::Completed | LoopStatus::Exhausted => last_text,
            LoopStatus::Failed(_) => None,
        };

        Ok(LoopOutcome {
            status,
            final_answer,
            steps,
            trace,
        })
    }

    fn validate(&self, task: &str) -> Result<(), ConfigError> {
        if task.trim().is_empty() {
            return Err(ConfigError::EmptyTask);
        }
        if self.max_steps == 0 {
            return Err(ConfigError::ZeroMaxSteps);
        }
        if self.max_duration.is_zero() {
            return Err(ConfigError::ZeroMaxDuration);
        }
        if self.retry_policy.max_attempts == 0 {
            return Err(ConfigError::ZeroMaxAttempts);
        }
        if self.tool_fan_out == 0 {
            return Err(ConfigError::ZeroToolFanOut);
        }
        Ok(())
    }

    /// Asks the backend for the next turn, retrying transient errors per
    /// policy. All waiting is bounded by the loop deadline.
    async fn request_turn(
        &self,
        conversation: &Conversation,
        deadline: Instant,
    ) -> Result<CompletedTurn, RequestError> {
        let req = GenerateRequest {
            messages: conversation.messages(),
            tools: self.registry.declarations(),
            config: self.generate_config.clone(),
        };

        let mut schedule = self
            .retry_policy
            .schedule(deadline.saturating_duration_since(Instant::now()));
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(RequestError::DeadlineExceeded);
            }
            let err =
                match timeout(remaining, self.client.generate(req.clone()))
                    .await
                {
                    Err(_) => return Err(RequestError::DeadlineExceeded),
                    Ok(Ok(turn)) => return Ok(turn),
                    Ok(Err(err)) => err,
                };
            let kind = err.kind();
            if !self.retry_policy.retries_backend(kind) {
                error!(?kind, "backend failed fatally");
                return Err(RequestError::Backend {
                    kind,
                    message: err.to_string(),
                    attempts: attempt,
                });
            }
            if attempt >= self.retry_policy.max_attempts {
                warn!(?kind, attempts = attempt, "backend retries exhausted");
                return Err(RequestError::Backend {
                    kind,
                    message: err.to_string(),
                    attempts: attempt,
                });
            }
            let Some(delay) = schedule.next_backoff() else {
                debug!(?kind, "no retry budget left before the deadline");
                return Err(RequestError::DeadlineExceeded);
            };
            debug!(?kind, attempt, ?delay, "retrying backend call");
            sleep(delay).await;
        }
    }

    /// Dispatches the tool calls of one turn.
    ///
    /// Calls run concurrently (bounded by `tool_fan_out`) only when every
    /// resolved tool declares itself side-effect-free; results are always
    /// collected in request order, not completion order, so the trace
    /// stays reproducible.
    async fn dispatch_tool_calls(
        &self,
        calls: Vec<ToolCallRequest>,
        deadline: Instant,
    ) -> Vec<ToolCallOutcome> {
        let parallelizable = calls.len() > 1
            && self.tool_fan_out > 1
            && calls.iter().all(|call| {
                self.registry
                    .lookup(&call.name)
                    .is_some_and(|tool| tool.side_effect_free())
            });

        if parallelizable {
            let invocations =
                calls.into_iter().map(|call| self.invoke_tool(call, deadline));
            let outcomes: Vec<ToolCallOutcome> = stream::iter(invocations)
                .buffered(self.tool_fan_out)
                .collect()
                .await;
            outcomes
        } else {
            let mut outcomes = Vec::with_capacity(calls.len());
            for call in calls {
                outcomes.push(self.invoke_tool(call, deadline).await);
            }
            outcomes
        }
    }

    /// Invokes one tool call, retrying transient failures per policy.
    /// Never fails the run: problems degrade to a recorded failed
    /// observation the backend can react to.
    async fn invoke_tool(
        &self,
        call: ToolCallRequest,
        deadline: Instant,
    ) -> ToolCallOutcome {
        let Some(tool) = self.registry.lookup(&call.name) else {
            warn!(tool = %call.name, "tool not found");
            return ToolCallOutcome {
                id: call.id,
                content: format!("tool `{}` is not available", call.name),
                name: call.name,
                success: false,
            };
        };

        let mut schedule = self
            .retry_policy
            .schedule(deadline.saturating_duration_since(Instant::now()));
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            trace!(tool = %call.name, attempt, "invoking tool");
            match tool.execute(call.arguments.clone()).await {
                Ok(output) => {
                    return ToolCallOutcome {
                        id: call.id,
                        name: call.name,
                        content: output,
                        success: true,
                    };
                }
                Err(err) => {
                    let kind = err.kind();
                    if self.retry_policy.retries_tool(kind)
                        && attempt < self.retry_policy.max_attempts
                        && Instant::now() < deadline
                    {
                        if let Some(delay) = schedule.next_backoff() {
                            debug!(
                                tool = %call.name,
                                ?kind,
                                attempt,
                                ?delay,
                                "retrying tool call"
                            );
                            sleep(delay).await;
                            continue;
                        }
                    }
                    warn!(
                        tool = %call.name,
                        ?kind,
                        attempts = attempt,
                        "tool call failed"
                    );
                    return ToolCallOutcome {
                        id: call.id,
                        name: call.name,
                        content: err.reason().into_owned(),
                        success: false,
                    };
                }
            }
        }
    }
}
