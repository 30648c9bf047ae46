//! The declarative configuration tree.
//!
//! The YAML/JSON *loading* entry point is out of scope for this crate —
//! that lives in the operator CLI — but the typed tree itself is not:
//! `BoundaryEnforcer` and `Runtime` are constructed directly from a
//! `K6sConfig` in tests and in embedding code, so the types need to
//! exist and deserialize on their own.

use serde::{Deserialize, Serialize};

/// Root configuration document.
///
/// Unknown top-level keys are rejected (`deny_unknown_fields`); missing
/// sections fall back to their documented defaults via `#[serde(default)]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct K6sConfig {
    /// Document schema version. Defaults to `"1"`.
    #[serde(default = "default_version")]
    pub version: String,
    /// Project identity.
    pub project: ProjectSection,
    /// Session defaults.
    #[serde(default)]
    pub session: SessionSection,
    /// Per-agent boundary policies, evaluated in order.
    #[serde(default)]
    pub boundaries: Vec<BoundaryEntry>,
    /// Declarative policy checkpoints (enforced outside this core).
    #[serde(default)]
    pub gates: Vec<GateEntry>,
    /// Event sink configuration.
    #[serde(default)]
    pub observability: ObservabilitySection,
    /// Plugin declarations.
    #[serde(default)]
    pub plugins: Vec<PluginEntry>,
}

fn default_version() -> String {
    "1".to_string()
}

/// Project identity section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    /// Human-readable project name.
    pub name: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Session-scoped defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SessionSection {
    /// Default cost ceiling for a session, in USD.
    pub default_budget_usd: f64,
    /// How many days saved context entries are retained.
    pub context_retention_days: u32,
    /// How many days audit events are retained.
    pub audit_retention_days: u32,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            default_budget_usd: 50.00,
            context_retention_days: 90,
            audit_retention_days: 365,
        }
    }
}

/// One `(pattern -> policy)` boundary rule.
///
/// Mirrors `k6s_boundary::BoundaryConfig`; this is the serde-facing
/// shape, converted at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundaryEntry {
    /// Shell-glob matched against agent names (`*` matches any).
    pub pattern: String,
    /// Paths an agent matching `pattern` is allowed to touch.
    #[serde(default)]
    pub allowed_paths: Vec<String>,
    /// Paths that are denied regardless of `allowed_paths`.
    #[serde(default)]
    pub forbidden_paths: Vec<String>,
    /// Advisory (log-and-continue) or strict (unimplemented revert).
    #[serde(default)]
    pub enforcement: EnforcementMode,
    /// Inert resource-limit hint; no enforcement path exists today.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens_per_hour: Option<u64>,
    /// Inert resource-limit hint; no enforcement path exists today.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cost_per_hour: Option<f64>,
}

/// Declared strictness for a [`BoundaryEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    /// Log-and-continue — the only behavior actually implemented.
    Advisory,
    /// Accepted and stored; produces the same logged behavior as
    /// `Advisory` until a revert/block plug-in exists.
    Strict,
}

impl Default for EnforcementMode {
    fn default() -> Self {
        Self::Advisory
    }
}

/// A declarative policy checkpoint.
///
/// Gates are modeled here as a data shape only; triggering/approval
/// logic is external to this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateEntry {
    /// Stable identifier, referenced by `gate_id` on audit events.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// What causes this gate to trigger.
    #[serde(default)]
    pub trigger: GateTrigger,
    /// How a decision is made.
    #[serde(default = "default_approval_mode")]
    pub approval_mode: String,
    /// How long to wait for a decision before `gate_expired`.
    #[serde(default = "default_gate_timeout")]
    pub timeout_seconds: u64,
    /// Where to surface the pending decision.
    #[serde(default = "default_notify")]
    pub notify: Vec<String>,
}

fn default_approval_mode() -> String {
    "manual".to_string()
}

fn default_gate_timeout() -> u64 {
    1800
}

fn default_notify() -> Vec<String> {
    vec!["terminal".to_string()]
}

/// Trigger condition for a [`GateEntry`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GateTrigger {
    /// Trigger when any of these event types occurs.
    pub event_types: Vec<String>,
    /// Trigger when a changed file matches any of these globs.
    pub file_patterns: Vec<String>,
    /// Trigger when accumulated cost crosses this threshold (USD).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_threshold: Option<f64>,
    /// Opaque custom trigger expression, interpreted outside this core.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
}

/// Event sink configuration. None of these sinks are dispatched to by
/// this core; the shapes exist so embedding code has somewhere typed to
/// read them from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ObservabilitySection {
    /// Prometheus metrics endpoint.
    pub prometheus: PrometheusSection,
    /// `OpenTelemetry` trace export.
    pub opentelemetry: OpenTelemetrySection,
    /// Outbound webhook sinks.
    pub webhooks: Vec<WebhookEntry>,
}

/// Prometheus metrics sink configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PrometheusSection {
    /// Whether the sink is enabled.
    pub enabled: bool,
    /// Port to serve metrics on.
    pub port: u16,
}

impl Default for PrometheusSection {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

/// `OpenTelemetry` trace sink configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OpenTelemetrySection {
    /// Whether the sink is enabled.
    pub enabled: bool,
    /// Collector endpoint.
    pub endpoint: String,
}

impl Default for OpenTelemetrySection {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:4317".to_string(),
        }
    }
}

/// A single outbound webhook sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookEntry {
    /// Destination URL.
    pub url: String,
    /// Event types to forward; empty means all.
    #[serde(default)]
    pub events: Vec<String>,
    /// Shared secret used to sign the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// A declared plugin module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginEntry {
    /// Plugin name.
    pub name: String,
    /// Module/path identifying the plugin implementation.
    pub module: String,
    /// Opaque plugin-specific configuration.
    #[serde(default)]
    pub config: serde_json::Value,
}

impl K6sConfig {
    /// Build the documented default configuration for a fresh project:
    /// one wildcard boundary forbidding secret-shaped files under
    /// advisory enforcement, plus the two default gates.
    #[must_use]
    pub fn default_config(project_name: impl Into<String>) -> Self {
        Self {
            version: default_version(),
            project: ProjectSection {
                name: project_name.into(),
                description: None,
            },
            session: SessionSection::default(),
            boundaries: vec![BoundaryEntry {
                pattern: "*".to_string(),
                allowed_paths: Vec::new(),
                forbidden_paths: vec![
                    ".env*".to_string(),
                    "**/*.pem".to_string(),
                    "**/*.key".to_string(),
                ],
                enforcement: EnforcementMode::Advisory,
                max_tokens_per_hour: None,
                max_cost_per_hour: None,
            }],
            gates: vec![
                GateEntry {
                    id: "dependency-approval".to_string(),
                    name: "Dependency approval".to_string(),
                    trigger: GateTrigger {
                        event_types: Vec::new(),
                        file_patterns: vec![
                            "**/Cargo.toml".to_string(),
                            "**/package.json".to_string(),
                            "**/requirements.txt".to_string(),
                            "**/go.mod".to_string(),
                        ],
                        cost_threshold: None,
                        custom: None,
                    },
                    approval_mode: default_approval_mode(),
                    timeout_seconds: default_gate_timeout(),
                    notify: default_notify(),
                },
                GateEntry {
                    id: "security-files".to_string(),
                    name: "Security-sensitive file access".to_string(),
                    trigger: GateTrigger {
                        event_types: Vec::new(),
                        file_patterns: vec![
                            ".env*".to_string(),
                            "**/*.pem".to_string(),
                            "**/*.key".to_string(),
                            "**/secrets/**".to_string(),
                        ],
                        cost_threshold: None,
                        custom: None,
                    },
                    approval_mode: default_approval_mode(),
                    timeout_seconds: default_gate_timeout(),
                    notify: default_notify(),
                },
            ],
            observability: ObservabilitySection::default(),
            plugins: Vec::new(),
        }
    }

    /// Parse a `K6sConfig` from a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::Invalid`] on unknown keys or
    /// structural mismatches.
    pub fn from_yaml(raw: &str) -> crate::Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| crate::ConfigError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_wildcard_boundary() {
        let cfg = K6sConfig::default_config("demo");
        assert_eq!(cfg.boundaries.len(), 1);
        assert_eq!(cfg.boundaries[0].pattern, "*");
        assert!(cfg.boundaries[0]
            .forbidden_paths
            .contains(&".env*".to_string()));
        assert_eq!(cfg.gates.len(), 2);
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let raw = "project:\n  name: demo\nbogus_section: true\n";
        assert!(K6sConfig::from_yaml(raw).is_err());
    }

    #[test]
    fn missing_sections_use_defaults() {
        let raw = "project:\n  name: demo\n";
        let cfg = K6sConfig::from_yaml(raw).unwrap();
        assert_eq!(cfg.session.default_budget_usd, 50.00);
        assert!(cfg.boundaries.is_empty());
    }
}
