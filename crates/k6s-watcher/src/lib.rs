//! k6s Watcher - the filesystem observer.
//!
//! Runs `notify` on a native thread and bridges its events into the
//! async runtime via a bounded channel. Raw events are classified into
//! synthetic `file_create`/`file_modify`/`file_delete` events, rename
//! pairs are split into a delete/create pair, directory-modify noise is
//! discarded, and the built-in ignore list filters version-control and
//! dependency-directory churn before anything reaches the audit log or
//! the boundary enforcer.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod classify;
mod error;
mod events;
mod ignore;
mod watcher;

pub use classify::classify;
pub use error::{Result, WatcherError};
pub use events::FileChangeEvent;
pub use ignore::{is_ignored, DEFAULT_IGNORE_GLOBS};
pub use watcher::{FileWatcher, WATCHER_AGENT_NAME};
