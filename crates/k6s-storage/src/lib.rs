//! k6s Storage - the embedded, serialized single-writer store.
//!
//! Every other component in the engine shares one [`Store`]. Its
//! internal mutex is the sole inter-component serialization point
//! (the sole inter-component serializer); the one other piece of shared mutable state is
//! the audit sequence counter, owned by `k6s-audit`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod db;
mod error;
mod migrations;

pub use db::Store;
pub use error::{Result, StoreError};
pub use migrations::{Migration, MIGRATIONS};

/// Re-exported so downstream crates can write closures against
/// `rusqlite::Connection`/`Transaction` without a direct dependency
/// version mismatch.
pub use rusqlite;
