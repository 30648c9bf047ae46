//! k6s Config - the declarative configuration tree.
//!
//! The YAML-loading CLI entry point is out of scope for the governance
//! core; this crate only defines the typed tree so
//! `BoundaryEnforcer` and `Runtime` can be built directly from a parsed
//! or hand-constructed [`K6sConfig`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod types;

pub use error::{ConfigError, Result};
pub use types::{
    BoundaryEntry, EnforcementMode, GateEntry, GateTrigger, K6sConfig, ObservabilitySection,
    OpenTelemetrySection, PluginEntry, PrometheusSection, ProjectSection, SessionSection,
    WebhookEntry,
};
