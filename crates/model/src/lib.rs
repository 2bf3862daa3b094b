//! An abstraction layer for reasoning backends.
//!
//! This crate establishes a unified protocol between the agent loop and
//! whatever produces its turns, so the loop can drive any backend without
//! knowing its wire format. A backend here is a passed-in capability
//! object, not a process-wide client singleton.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that implementors should adhere to. The one behavioral
//! guarantee required from implementors is error classification: every
//! backend error must carry an [`ErrorKind`] so the loop can branch on a
//! tagged value instead of catching broad error hierarchies.

#![deny(missing_docs)]

mod backend;
mod error;
mod request;
mod response;

pub use backend::*;
pub use error::*;
pub use request::*;
pub use response::*;
