//! Transactional exclusive file locks for the k6s governance engine.
//!
//! A lock is a row in `file_locks` keyed by `(path, session_id)`.
//! Acquisition runs inside a `BEGIN IMMEDIATE` transaction so the
//! "does a lock exist" read and the insert/update that follows are
//! atomic — no two concurrent `acquire` calls can both observe "no
//! lock" for the same path.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod manager;
mod types;

pub use error::{LockError, Result};
pub use manager::{LockManager, DEFAULT_LOCK_DURATION};
pub use types::{FileLock, LockResult};
