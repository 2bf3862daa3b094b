use ratchet_model::ErrorKind as BackendErrorKind;

use crate::conversation::Turn;

/// Why a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoopStatus {
    /// The backend declared the task resolved.
    Completed,
    /// The step or time budget ran out before a finish was declared.
    Exhausted,
    /// The run hit an unrecoverable condition.
    Failed(FailureReason),
}

/// The unrecoverable condition that terminated a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    /// The backend failed fatally, or exhausted its retry budget.
    Backend {
        /// The classified kind of the final backend error.
        kind: BackendErrorKind,
        /// The message of the final backend error.
        message: String,
        /// How many attempts were made, including the initial one.
        attempts: u32,
    },
    /// The conversation could not be reduced under the context budget.
    ContextOverflow,
    /// The run was cancelled via its [`CancelToken`].
    ///
    /// [`CancelToken`]: crate::CancelToken
    Cancelled,
}

/// What a finished run produced.
///
/// Returned for every terminal state; the trace is complete even when the
/// run failed, so a failed run can still be inspected turn by turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopOutcome {
    /// Why the run ended.
    pub status: LoopStatus,
    /// The last agent text, if any was produced.
    ///
    /// Present for [`LoopStatus::Completed`] and best-effort for
    /// [`LoopStatus::Exhausted`]; always `None` for failures.
    pub final_answer: Option<String>,
    /// How many steps were consumed.
    pub steps: u32,
    /// Every recorded turn, in order, untouched by context compaction.
    pub trace: Vec<Turn>,
}
