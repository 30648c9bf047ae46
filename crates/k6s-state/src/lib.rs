//! Session, agent, and context state, backed by [`k6s_storage::Store`].
//!
//! This crate owns the lifecycle rules for sessions and agents
//! (§4.C of the governance model) and the key/value context store
//! agents use to hand off work across a pause/resume boundary.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod agent_ops;
mod context_ops;
mod error;
mod manager;
mod resume;
mod rows;
mod types;
mod util;

pub use error::{Result, StateError};
pub use manager::StateManager;
pub use types::{Agent, ContextEntry, Session};
