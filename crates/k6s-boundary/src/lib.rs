//! k6s Boundary - per-agent path access policy.
//!
//! A [`BoundaryEnforcer`] holds an ordered list of [`BoundaryConfig`]
//! entries plus the project root, and answers "may `agent_name` touch
//! `path`?" per §4.E of the governance model. Only advisory
//! (log-and-continue) enforcement is implemented; `strict` is carried
//! as a declared value with no reversion behavior.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod enforcer;
mod error;
mod matcher;
mod types;

pub use config::BoundaryConfig;
pub use enforcer::BoundaryEnforcer;
pub use error::{BoundaryError, Result};
pub use matcher::{glob_match, to_project_relative};
pub use types::{BoundarySummary, BoundaryViolation, CheckResult};
