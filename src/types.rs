//! Core data types shared by the discovery and audit pipelines

use std::collections::HashMap;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// The integration kind that marks a service as scrapeable.
pub const PROMETHEUS_INTEGRATION: &str = "prometheus";

/// A telemetry integration attached to a catalog service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIntegration {
    /// Opaque integration kind, e.g. `"prometheus"`
    #[serde(default)]
    pub integration_type: String,
}

impl ServiceIntegration {
    /// Convenience constructor, mostly for tests
    pub fn new(integration_type: impl Into<String>) -> Self {
        Self {
            integration_type: integration_type.into(),
        }
    }
}

/// A service as listed by the upstream catalog.
///
/// Identity is `name`, unique within a project. Created externally and
/// never mutated here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Unique service name within the project
    #[serde(rename = "service_name")]
    pub name: String,

    /// Service kind, e.g. `"elasticsearch"`; controls enrollment eligibility
    #[serde(default)]
    pub service_type: String,

    /// Opaque plan label
    #[serde(default)]
    pub plan: String,

    /// Opaque cloud label
    #[serde(default)]
    pub cloud_name: String,

    /// Number of nodes backing the service
    #[serde(default)]
    pub node_count: u64,

    /// Connection parameters; the scrape hostname lives under `"host"`
    #[serde(rename = "service_uri_params", default)]
    pub uri_params: HashMap<String, String>,

    /// Integrations already enrolled upstream
    #[serde(rename = "service_integrations", default)]
    pub integrations: Vec<ServiceIntegration>,
}

impl Service {
    /// Hostname to resolve for scraping, derived from the URI parameters.
    pub fn hostname(&self) -> Option<&str> {
        self.uri_params.get("host").map(String::as_str)
    }

    /// Whether the service already carries an integration of the given kind.
    pub fn has_integration(&self, kind: &str) -> bool {
        self.integrations
            .iter()
            .any(|i| i.integration_type == kind)
    }
}

/// Labels attached to a published target group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetLabels {
    /// Service name
    #[serde(rename = "aiven_service_name")]
    pub service_name: String,

    /// Service kind
    #[serde(rename = "aiven_service_type")]
    pub service_type: String,

    /// Hostname the targets were resolved from
    #[serde(rename = "aiven_hostname")]
    pub hostname: String,

    /// Plan label
    #[serde(rename = "aiven_plan")]
    pub plan: String,

    /// Cloud label
    #[serde(rename = "aiven_cloud")]
    pub cloud: String,

    /// Node count, serialized as a decimal string
    #[serde(rename = "aiven_node_count")]
    pub node_count: String,
}

/// One entry of the published target file: resolved addresses plus the
/// labels the scraper attaches to every sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    /// Resolved network addresses, textual form on the wire
    pub targets: Vec<IpAddr>,

    /// Fully populated labels; empty string where upstream lacks the value
    pub labels: TargetLabels,
}

impl TargetGroup {
    /// Build a target group for a service resolved to `targets`.
    pub fn for_service(service: &Service, hostname: &str, targets: Vec<IpAddr>) -> Self {
        Self {
            targets,
            labels: TargetLabels {
                service_name: service.name.clone(),
                service_type: service.service_type.clone(),
                hostname: hostname.to_string(),
                plan: service.plan.clone(),
                cloud: service.cloud_name.clone(),
                node_count: service.node_count.to_string(),
            },
        }
    }
}

/// An audit event as returned by the upstream event API.
///
/// Identity is `id`; `timestamp` is unix seconds and is NOT assumed
/// sorted within a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Stable event identifier
    #[serde(default)]
    pub id: String,

    /// Unix seconds
    #[serde(default)]
    pub timestamp: i64,

    /// Acting user
    #[serde(default)]
    pub user: String,

    /// Action performed
    #[serde(default)]
    pub action: String,

    /// Task the event belongs to
    #[serde(rename = "task", default)]
    pub task_id: String,

    /// Deployment the event belongs to
    #[serde(rename = "deployment", default)]
    pub deployment_name: String,

    /// Instance the event belongs to
    #[serde(default)]
    pub instance: String,
}

/// Envelope POSTed to the event collector, one per event.
#[derive(Debug, Serialize)]
pub struct SinkEvent<'a> {
    /// Fixed sourcetype for audit events
    pub sourcetype: &'static str,

    /// Deploy-environment label
    pub source: &'a str,

    /// The event payload
    pub event: &'a AuditEvent,
}

/// The fixed sourcetype carried by every sink envelope.
pub const AUDIT_EVENT_SOURCETYPE: &str = "bosh-audit-event";
