//! k6s Core - shared identifiers and domain enums.
//!
//! This crate has no dependencies on any other `k6s-*` crate. It holds
//! the vocabulary every other component shares: the id types scoped to
//! a session, the closed `EventType` set, and the session/agent/
//! violation state enums that map onto table columns in `k6s-storage`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod audit_event;
mod error;
mod event;
mod ids;
mod session;
mod ulid;
mod violation;

pub use audit_event::AuditEvent;
pub use error::{CoreError, Result};
pub use event::EventType;
pub use ids::{AgentId, AuditEventId, SessionId};
pub use session::{AgentRole, AgentState, SessionState};
pub use ulid::Ulid;
pub use violation::{Enforcement, EnforcementAction, ViolationType};
