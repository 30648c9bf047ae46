//! k6s Runtime - composes the governance engine's components into one
//! running daemon and owns its daemon entry point.
//!
//! Every other `k6s-*` crate implements one piece of the governance
//! model in isolation against a shared [`k6s_storage::Store`]; this
//! crate is the only one that wires them together into something that
//! can actually start, serve tool calls, and shut down cleanly.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod liveness;
mod runtime;

pub use error::{Result, RuntimeError};
pub use liveness::LivenessMarker;
pub use runtime::{Runtime, DB_FILE_NAME, ENGINE_DIR_NAME};
