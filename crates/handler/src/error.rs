//! Error types for the handler pipeline.

use pagerduty::EventsApiError;
use thiserror::Error;

use crate::severity::StatusMapError;
use crate::template::TemplateError;

/// Where in the pipeline an error stops processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Aborts the whole invocation before any network call
    Precondition,
    /// Aborts the current delivery (one contact in contact routing)
    Rendering,
    /// Delivery failed, including the fallback attempt
    Delivery,
    /// One or more contacts could not be served
    Contact,
}

/// Errors raised while turning an event into a `PagerDuty` incident.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("event does not contain check")]
    MissingCheck,

    #[error("no auth token provided")]
    MissingToken,

    #[error("invalid details format: {0}")]
    InvalidDetailsFormat(String),

    #[error("invalid alternate endpoint: {endpoint}")]
    InvalidAlternateEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid value {value:?} for option {option}: {reason}")]
    InvalidOverride {
        option: String,
        value: String,
        reason: String,
    },

    #[error("team {team:?} with suffix {suffix:?} does not produce an environment variable name")]
    EmptyTeamVariable { team: String, suffix: String },

    #[error("contact routing enabled but no contacts were found")]
    NoContacts,

    #[error("invalid contact syntax: {0}")]
    InvalidContact(String),

    #[error(transparent)]
    StatusMap(#[from] StatusMapError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("failed to unmarshal json details rendered from template {template:?}: {source}")]
    JsonDetails {
        template: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize event for details: {0}")]
    EventSerialization(#[source] serde_json::Error),

    #[error("pagerduty dedup key is empty (template {template:?})")]
    EmptyDedupKey { template: String },

    #[error("no environment variable found for \"{variable}\" (contact {contact})")]
    ContactToken { contact: String, variable: String },

    #[error("event delivery failed: {primary}; fallback event failed: {fallback}")]
    Delivery {
        primary: EventsApiError,
        #[source]
        fallback: EventsApiError,
    },

    #[error("handler execution error for one or more contacts: {}", .failed.join(", "))]
    ContactsFailed { failed: Vec<String> },
}

impl HandlerError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::MissingCheck
            | Self::MissingToken
            | Self::InvalidDetailsFormat(_)
            | Self::InvalidAlternateEndpoint { .. }
            | Self::InvalidOverride { .. }
            | Self::EmptyTeamVariable { .. }
            | Self::NoContacts
            | Self::InvalidContact(_) => ErrorClass::Precondition,
            Self::StatusMap(_)
            | Self::Template(_)
            | Self::JsonDetails { .. }
            | Self::EventSerialization(_)
            | Self::EmptyDedupKey { .. } => ErrorClass::Rendering,
            Self::Delivery { .. } => ErrorClass::Delivery,
            Self::ContactToken { .. } | Self::ContactsFailed { .. } => ErrorClass::Contact,
        }
    }
}
