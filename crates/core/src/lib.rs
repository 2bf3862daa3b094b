//! Core logic of the bounded agent loop: conversation state, tool
//! execution, context management, retry policy, and the loop controller
//! itself.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
mod backend_client;
mod cancel;
pub mod context;
pub mod conversation;
mod retry;
pub mod tool;

pub use agent::{
    AgentLoop, AgentLoopBuilder, ConfigError, FailureReason, LoopOutcome,
    LoopStatus,
};
pub use cancel::CancelToken;
pub use retry::RetryPolicy;
