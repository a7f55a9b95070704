//! Incident field composition.
//!
//! Derives the summary, dedup key, details, PD-CEF fields (`group`,
//! `component`, `class`), client URL, links and timestamp of an incident
//! from an event, using the configured templates.

use std::borrow::Cow;

use pagerduty::Link;
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::config::{DetailsFormat, HandlerConfig};
use crate::error::HandlerError;
use crate::event::Event;
use crate::template::TemplateEvaluator;

/// Events API limit on the summary length, in characters.
pub const MAX_SUMMARY_CHARS: usize = 1024;

/// Check output limit in bytes. Events must stay below 512KB.
pub const MAX_OUTPUT_BYTES: usize = 256_000;

/// Prepended to check output that was cut to [`MAX_OUTPUT_BYTES`].
pub const TRUNCATION_MARKER: &str = "WARNING Truncated:\n";

/// Fields derived from one event for one delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Fields {
    pub summary: String,
    pub dedup_key: String,
    pub details: Value,
    pub group: String,
    pub component: String,
    pub class: String,
    pub client_url: String,
    pub links: Vec<Link>,
    pub timestamp: Option<String>,
}

/// Cut `output` to [`MAX_OUTPUT_BYTES`], marking it as truncated.
///
/// Returns `None` when the output is within the limit. The cut never splits
/// a UTF-8 sequence.
#[must_use]
pub fn truncate_output(output: &str) -> Option<String> {
    if output.len() <= MAX_OUTPUT_BYTES {
        return None;
    }
    let mut end = MAX_OUTPUT_BYTES;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    Some(format!("{TRUNCATION_MARKER}{}...", &output[..end]))
}

/// The event as it should be rendered, with oversized check output
/// truncated. The caller's event is left untouched.
#[must_use]
pub fn prepare_event(event: &Event) -> Cow<'_, Event> {
    let truncated = event
        .check
        .as_ref()
        .and_then(|check| truncate_output(&check.output));

    match truncated {
        Some(output) => {
            warn!(
                entity = event.entity_name(),
                check = event.check_name(),
                limit = MAX_OUTPUT_BYTES,
                "Check output truncated, incident payload would exceed the Events API limit"
            );
            let mut event = event.clone();
            if let Some(check) = event.check.as_mut() {
                check.output = output;
            }
            Cow::Owned(event)
        }
        None => Cow::Borrowed(event),
    }
}

/// Whether an annotation value should become a link.
///
/// Only absolute URLs with a scheme qualify, so plain words and bare paths
/// are not mistaken for links.
#[must_use]
pub fn is_link(value: &str) -> bool {
    Url::parse(value).is_ok()
}

/// Composes incident fields from events.
pub struct FieldComposer<'a> {
    config: &'a HandlerConfig,
    templates: &'a dyn TemplateEvaluator,
}

impl<'a> FieldComposer<'a> {
    pub fn new(config: &'a HandlerConfig, templates: &'a dyn TemplateEvaluator) -> Self {
        Self { config, templates }
    }

    /// Compose every field. `event` should already have gone through
    /// [`prepare_event`].
    pub fn compose(&self, event: &Event) -> Result<Fields, HandlerError> {
        Ok(Fields {
            summary: self.summary(event)?,
            details: self.details(event)?,
            group: self.group(event)?,
            component: self.component(event)?,
            class: self.class(event)?,
            dedup_key: self.dedup_key(event)?,
            client_url: self.client_url(event),
            links: self.links(event),
            timestamp: self.timestamp(event),
        })
    }

    pub fn summary(&self, event: &Event) -> Result<String, HandlerError> {
        let mut summary =
            self.templates
                .evaluate("summary", &self.config.summary_template, event)?;

        if let Some((cut, _)) = summary.char_indices().nth(MAX_SUMMARY_CHARS) {
            summary.truncate(cut);
        }

        info!(summary = %summary, "Incident summary");
        Ok(summary)
    }

    /// Rendered dedup key, which must not be empty.
    pub fn dedup_key(&self, event: &Event) -> Result<String, HandlerError> {
        let template = &self.config.dedup_key_template;
        let dedup_key = self.templates.evaluate("dedupKey", template, event)?;
        if dedup_key.is_empty() {
            return Err(HandlerError::EmptyDedupKey {
                template: template.clone(),
            });
        }
        Ok(dedup_key)
    }

    /// Rendered details, or the whole event when no template is configured.
    pub fn details(&self, event: &Event) -> Result<Value, HandlerError> {
        let template = &self.config.details_template;
        if template.is_empty() {
            return serde_json::to_value(event).map_err(HandlerError::EventSerialization);
        }

        let details = self.templates.evaluate("details", template, event)?;
        match self.config.details_format {
            DetailsFormat::String => Ok(Value::String(details)),
            DetailsFormat::Json => {
                serde_json::from_str(&details).map_err(|source| HandlerError::JsonDetails {
                    template: template.clone(),
                    source,
                })
            }
        }
    }

    pub fn group(&self, event: &Event) -> Result<String, HandlerError> {
        self.optional("group", &self.config.group_template, event)
            .map(Option::unwrap_or_default)
    }

    /// Rendered component, defaulting to the check name.
    pub fn component(&self, event: &Event) -> Result<String, HandlerError> {
        self.optional("component", &self.config.component_template, event)
            .map(|component| component.unwrap_or_else(|| event.check_name().to_string()))
    }

    pub fn class(&self, event: &Event) -> Result<String, HandlerError> {
        self.optional("class", &self.config.class_template, event)
            .map(Option::unwrap_or_default)
    }

    fn optional(
        &self,
        name: &str,
        template: &str,
        event: &Event,
    ) -> Result<Option<String>, HandlerError> {
        if template.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.templates.evaluate(name, template, event)?))
    }

    /// Link back to the event in the monitoring web UI, empty without a
    /// base URL.
    pub fn client_url(&self, event: &Event) -> String {
        if self.config.base_url.is_empty() {
            return String::new();
        }
        format!(
            "{}/c/~/n/{}/events/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            event.namespace(),
            event.entity_name(),
            event.check_name(),
        )
    }

    /// Links for check annotations, then entity annotations, whose value is
    /// a URL. Empty unless link annotations are enabled.
    pub fn links(&self, event: &Event) -> Vec<Link> {
        if !self.config.link_annotations {
            return vec![];
        }

        let check_annotations = event
            .check
            .iter()
            .flat_map(|check| &check.metadata.annotations)
            .map(|annotation| ("check", annotation));
        let entity_annotations = event
            .entity
            .metadata
            .annotations
            .iter()
            .map(|annotation| ("entity", annotation));

        check_annotations
            .chain(entity_annotations)
            .filter(|(_, (_, value))| is_link(value))
            .map(|(kind, (key, value))| Link {
                text: format!("{kind} {key}"),
                href: value.clone(),
            })
            .collect()
    }

    /// Event time, only when the event timestamp is in use.
    pub fn timestamp(&self, event: &Event) -> Option<String> {
        if self.config.use_event_timestamp {
            event.timestamp_rfc3339()
        } else {
            None
        }
    }
}
