//! An out-of-the-box bundle of tools for the `ratchet` agent loop.
//!
//! The crate includes a CLI binary that walks a scripted task through the
//! loop end to end. You can also use it as a library to bring the bundled
//! tools into your own agent setups.

#![deny(missing_docs)]

pub mod tools;

/// Re-exports of the [`ratchet_core`] crate.
pub mod core {
    pub use ratchet_core::*;
}
