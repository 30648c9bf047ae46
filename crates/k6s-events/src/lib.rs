//! k6s Events - the in-process audit event bus.
//!
//! Sits above `k6s-storage` and below everything that produces or
//! consumes audit events. The bus has no durability of its own: it is
//! a fan-out mechanism for sinks (webhooks, metrics, gate triggers),
//! not the system of record — that's `k6s-audit`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod bus;

pub use bus::{EventBus, EventHandler, DEFAULT_QUEUE_CAPACITY};
