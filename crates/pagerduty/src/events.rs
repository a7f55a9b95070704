//! Events API v2 wire types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Event action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Trigger a new incident or add to an existing one
    Trigger,
    /// Resolve the incident correlated by the dedup key
    Resolve,
}

impl Action {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Resolve => "resolve",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Critical severity
    Critical,
    /// Error severity
    Error,
    /// Warning severity
    Warning,
    /// Info severity
    Info,
}

impl Severity {
    /// Get the wire name for this severity.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a label is not one of the four Events API severities.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid pagerduty severity: {0}")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Self::Critical),
            "error" => Ok(Self::Error),
            "warning" => Ok(Self::Warning),
            "info" => Ok(Self::Info),
            other => Err(UnknownSeverity(other.to_string())),
        }
    }
}

/// An Events API v2 event (the request envelope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Integration key of the target service
    pub routing_key: String,
    /// Event action (trigger, resolve)
    pub event_action: Action,
    /// Dedup key correlating trigger and resolve calls
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dedup_key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
    /// Name of the monitoring client that created the event
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client: String,
    /// URL of the monitoring client's view of the event
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_url: String,
    pub payload: Payload,
}

/// Event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    /// Brief summary of the event
    pub summary: String,
    /// Source of the event
    pub source: String,
    /// Severity level
    pub severity: Severity,
    /// Timestamp (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Component affected
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub component: String,
    /// Group for categorization
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,
    /// Class/type of event
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class: String,
    /// Free-form details, either a string or a structured value
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub custom_details: serde_json::Value,
}

/// A link rendered on the incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub text: String,
    pub href: String,
}

/// An image rendered on the incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// Response body of a successful enqueue.
///
/// Relays that do not speak JSON get a synthesized response, see
/// [`Client::send_event`](crate::Client::send_event).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub dedup_key: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Error object returned by the API on non-2xx responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    /// Usually empty, the relevant error is presented via `status`
    #[serde(default)]
    pub errors: Vec<String>,
}
