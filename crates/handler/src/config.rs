//! Handler configuration.
//!
//! [`HandlerConfig`] is built once per process (see [`crate::cli`]) and
//! only ever borrowed by the pipeline. Per-event annotation overrides
//! produce a copy instead of mutating the shared value.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, info};
use url::Url;

use crate::error::HandlerError;
use crate::event::Event;

pub const DEFAULT_DEDUP_KEY_TEMPLATE: &str = "{{entity.metadata.name}}-{{check.metadata.name}}";
pub const DEFAULT_SUMMARY_TEMPLATE: &str =
    "{{entity.metadata.name}}/{{check.metadata.name}} : {{check.output}}";
pub const DEFAULT_TEAM_SUFFIX: &str = "_pagerduty_token";
pub const DEFAULT_CLIENT_NAME: &str = "Sensu";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Annotation prefix for per-event configuration overrides.
pub const ANNOTATION_KEYSPACE: &str = "sensu.io/plugins/sensu-pagerduty-handler/config";

/// Options that event annotations may override.
const OVERRIDABLE_OPTIONS: &[&str] = &[
    "team",
    "team-suffix",
    "dedup-key-template",
    "status-map",
    "summary-template",
    "details-template",
    "details-format",
    "alternate-endpoint",
    "timeout",
    "sensu-base-url",
    "class-template",
    "group-template",
    "component-template",
    "client-name",
    "link-annotations",
    "use-event-timestamp",
];

/// How the rendered details template is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetailsFormat {
    /// Send the rendered text as is
    #[default]
    String,
    /// Parse the rendered text as JSON and send the structured value
    Json,
}

impl DetailsFormat {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for DetailsFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetailsFormat {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(Self::String),
            "json" => Ok(Self::Json),
            other => Err(HandlerError::InvalidDetailsFormat(other.to_string())),
        }
    }
}

/// Resolved handler configuration.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Static Events API routing key
    pub token: String,
    /// Team whose token variable overrides `token`
    pub team_name: String,
    pub team_suffix: String,
    pub dedup_key_template: String,
    /// Severity to statuses mapping as JSON, empty for the built-in mapping
    pub status_map_json: String,
    pub summary_template: String,
    /// Empty to send the whole event as details
    pub details_template: String,
    pub details_format: DetailsFormat,
    pub alternate_endpoint: Option<Url>,
    /// Per delivery attempt, zero disables the limit
    pub timeout: Duration,
    pub contact_routing: bool,
    pub client_name: String,
    /// Base URL of the monitoring web UI, used for the client URL
    pub base_url: String,
    pub link_annotations: bool,
    pub use_event_timestamp: bool,
    pub class_template: String,
    pub group_template: String,
    pub component_template: String,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            team_name: String::new(),
            team_suffix: DEFAULT_TEAM_SUFFIX.to_string(),
            dedup_key_template: DEFAULT_DEDUP_KEY_TEMPLATE.to_string(),
            status_map_json: String::new(),
            summary_template: DEFAULT_SUMMARY_TEMPLATE.to_string(),
            details_template: String::new(),
            details_format: DetailsFormat::String,
            alternate_endpoint: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            contact_routing: false,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            base_url: String::new(),
            link_annotations: false,
            use_event_timestamp: false,
            class_template: String::new(),
            group_template: String::new(),
            component_template: String::new(),
        }
    }
}

impl HandlerConfig {
    /// Parse an alternate endpoint, empty meaning none.
    pub fn parse_alternate_endpoint(endpoint: &str) -> Result<Option<Url>, HandlerError> {
        if endpoint.is_empty() {
            return Ok(None);
        }
        Url::parse(endpoint)
            .map(Some)
            .map_err(|source| HandlerError::InvalidAlternateEndpoint {
                endpoint: endpoint.to_string(),
                source,
            })
    }

    /// Timeout for one delivery attempt, `None` when unbounded.
    #[must_use]
    pub fn timeout_limit(&self) -> Option<Duration> {
        (!self.timeout.is_zero()).then_some(self.timeout)
    }

    /// Apply overrides from entity then check annotations under
    /// [`ANNOTATION_KEYSPACE`]. The token is secret and cannot be overridden.
    pub fn with_annotation_overrides(&self, event: &Event) -> Result<Cow<'_, Self>, HandlerError> {
        let prefix = format!("{ANNOTATION_KEYSPACE}/");
        let sources = [
            Some(&event.entity.metadata.annotations),
            event.check.as_ref().map(|check| &check.metadata.annotations),
        ];

        let mut config = Cow::Borrowed(self);
        for (key, value) in sources.into_iter().flatten().flatten() {
            let Some(option) = key.strip_prefix(&prefix) else {
                continue;
            };
            if !OVERRIDABLE_OPTIONS.contains(&option) {
                debug!(option, "Ignoring annotation for unknown or secret option");
                continue;
            }
            config.to_mut().apply_override(option, value)?;
            info!(option, "Configuration overridden by event annotation");
        }
        Ok(config)
    }

    fn apply_override(&mut self, option: &str, value: &str) -> Result<(), HandlerError> {
        match option {
            "team" => self.team_name = value.to_string(),
            "team-suffix" => self.team_suffix = value.to_string(),
            "dedup-key-template" => self.dedup_key_template = value.to_string(),
            "status-map" => self.status_map_json = value.to_string(),
            "summary-template" => self.summary_template = value.to_string(),
            "details-template" => self.details_template = value.to_string(),
            "details-format" => self.details_format = value.parse()?,
            "alternate-endpoint" => {
                self.alternate_endpoint = Self::parse_alternate_endpoint(value)?;
            }
            "timeout" => self.timeout = Duration::from_secs(parse_override(option, value)?),
            "sensu-base-url" => self.base_url = value.to_string(),
            "class-template" => self.class_template = value.to_string(),
            "group-template" => self.group_template = value.to_string(),
            "component-template" => self.component_template = value.to_string(),
            "client-name" => self.client_name = value.to_string(),
            "link-annotations" => self.link_annotations = parse_override(option, value)?,
            "use-event-timestamp" => self.use_event_timestamp = parse_override(option, value)?,
            _ => {}
        }
        Ok(())
    }
}

fn parse_override<T>(option: &str, value: &str) -> Result<T, HandlerError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|err: T::Err| HandlerError::InvalidOverride {
        option: option.to_string(),
        value: value.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::fixture;

    fn annotate_check(event: &mut Event, option: &str, value: &str) {
        if let Some(check) = event.check.as_mut() {
            check
                .metadata
                .annotations
                .insert(format!("{ANNOTATION_KEYSPACE}/{option}"), value.to_string());
        }
    }

    fn annotate_entity(event: &mut Event, option: &str, value: &str) {
        event
            .entity
            .metadata
            .annotations
            .insert(format!("{ANNOTATION_KEYSPACE}/{option}"), value.to_string());
    }

    #[test]
    fn test_details_format() {
        assert_eq!("json".parse::<DetailsFormat>().unwrap(), DetailsFormat::Json);
        assert_eq!(
            "string".parse::<DetailsFormat>().unwrap(),
            DetailsFormat::String
        );

        let err = "invalidformat".parse::<DetailsFormat>().unwrap_err();
        assert_eq!(err.to_string(), "invalid details format: invalidformat");
    }

    #[test]
    fn test_alternate_endpoint() {
        assert_eq!(HandlerConfig::parse_alternate_endpoint("").unwrap(), None);
        assert_eq!(
            HandlerConfig::parse_alternate_endpoint("https://relay.example.com/v2/enqueue")
                .unwrap()
                .unwrap()
                .host_str(),
            Some("relay.example.com")
        );

        let err = HandlerConfig::parse_alternate_endpoint("not a url").unwrap_err();
        assert_eq!(err.to_string(), "invalid alternate endpoint: not a url");
    }

    #[test]
    fn test_zero_timeout_is_unbounded() {
        let config = HandlerConfig {
            timeout: Duration::ZERO,
            ..HandlerConfig::default()
        };
        assert_eq!(config.timeout_limit(), None);
        assert_eq!(
            HandlerConfig::default().timeout_limit(),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_no_overrides_borrows() {
        let config = HandlerConfig::default();
        let event = fixture("foo", "bar");

        let effective = config.with_annotation_overrides(&event).unwrap();
        assert!(matches!(effective, Cow::Borrowed(_)));
    }

    #[test]
    fn test_check_annotations_override_entity_annotations() {
        let config = HandlerConfig::default();
        let mut event = fixture("foo", "bar");
        annotate_entity(&mut event, "summary-template", "entity summary");
        annotate_entity(&mut event, "group-template", "entity group");
        annotate_check(&mut event, "summary-template", "check summary");
        annotate_check(&mut event, "timeout", "5");

        let effective = config.with_annotation_overrides(&event).unwrap();
        assert_eq!(effective.summary_template, "check summary");
        assert_eq!(effective.group_template, "entity group");
        assert_eq!(effective.timeout, Duration::from_secs(5));
        assert_eq!(config.summary_template, DEFAULT_SUMMARY_TEMPLATE);
    }

    #[test]
    fn test_client_name_override() {
        let config = HandlerConfig::default();
        let mut event = fixture("foo", "bar");
        annotate_check(&mut event, "client-name", "Sensu Go");

        let effective = config.with_annotation_overrides(&event).unwrap();
        assert_eq!(effective.client_name, "Sensu Go");
        assert_eq!(config.client_name, DEFAULT_CLIENT_NAME);
    }

    #[test]
    fn test_link_annotations_override() {
        let config = HandlerConfig::default();
        let mut event = fixture("foo", "bar");
        annotate_check(&mut event, "link-annotations", "true");

        let effective = config.with_annotation_overrides(&event).unwrap();
        assert!(effective.link_annotations);
    }

    #[test]
    fn test_use_event_timestamp_override() {
        let config = HandlerConfig {
            use_event_timestamp: true,
            ..HandlerConfig::default()
        };
        let mut event = fixture("foo", "bar");
        annotate_entity(&mut event, "use-event-timestamp", "false");

        let effective = config.with_annotation_overrides(&event).unwrap();
        assert!(!effective.use_event_timestamp);
    }

    #[test]
    fn test_invalid_boolean_override_is_an_error() {
        let config = HandlerConfig::default();
        let mut event = fixture("foo", "bar");
        annotate_check(&mut event, "link-annotations", "yes");

        let err = config.with_annotation_overrides(&event).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value \"yes\" for option link-annotations: provided string was not `true` or `false`"
        );
    }

    #[test]
    fn test_token_cannot_be_overridden() {
        let config = HandlerConfig {
            token: "static".to_string(),
            ..HandlerConfig::default()
        };
        let mut event = fixture("foo", "bar");
        annotate_check(&mut event, "token", "stolen");

        let effective = config.with_annotation_overrides(&event).unwrap();
        assert_eq!(effective.token, "static");
    }

    #[test]
    fn test_invalid_override_is_an_error() {
        let config = HandlerConfig::default();
        let mut event = fixture("foo", "bar");
        annotate_check(&mut event, "details-format", "yaml");
        assert!(matches!(
            config.with_annotation_overrides(&event),
            Err(HandlerError::InvalidDetailsFormat(_))
        ));

        let mut event = fixture("foo", "bar");
        annotate_check(&mut event, "timeout", "soon");
        assert!(matches!(
            config.with_annotation_overrides(&event),
            Err(HandlerError::InvalidOverride { .. })
        ));
    }
}
