//! Event handling pipeline.
//!
//! [`Handler::handle`] checks preconditions, resolves credentials and then
//! either manages a single incident or fans the event out to every contact,
//! one after the other. A failing contact never stops the remaining ones.

use pagerduty::{Action, Payload};
use tracing::{info, warn};

use crate::config::HandlerConfig;
use crate::credentials::{self, Contact, Credentials, EnvLookup};
use crate::delivery::{self, DeliveryOutcome, IncidentApi};
use crate::error::HandlerError;
use crate::event::Event;
use crate::fields::{self, FieldComposer};
use crate::severity;
use crate::template::TemplateEvaluator;

/// Status 0 resolves the incident, anything else triggers it.
#[must_use]
pub const fn action_for_status(status: u32) -> Action {
    if status == 0 {
        Action::Resolve
    } else {
        Action::Trigger
    }
}

/// Client for the configured endpoint.
#[must_use]
pub fn client_for(config: &HandlerConfig) -> pagerduty::Client {
    match &config.alternate_endpoint {
        Some(endpoint) => pagerduty::Client::with_endpoint(endpoint.as_str()),
        None => pagerduty::Client::new(),
    }
}

/// Handles events against one configuration.
pub struct Handler<'a> {
    config: &'a HandlerConfig,
    templates: &'a dyn TemplateEvaluator,
    api: &'a dyn IncidentApi,
    env: &'a dyn EnvLookup,
}

impl<'a> Handler<'a> {
    pub fn new(
        config: &'a HandlerConfig,
        templates: &'a dyn TemplateEvaluator,
        api: &'a dyn IncidentApi,
        env: &'a dyn EnvLookup,
    ) -> Self {
        Self {
            config,
            templates,
            api,
            env,
        }
    }

    /// Handle one event.
    ///
    /// Returns one outcome per successful delivery. In contact routing mode
    /// every contact is attempted, and any failure is reported afterwards as
    /// [`HandlerError::ContactsFailed`].
    pub async fn handle(&self, event: &Event) -> Result<Vec<DeliveryOutcome>, HandlerError> {
        event.check()?;
        let credentials = credentials::resolve(self.config, event, self.env)?;
        let event = fields::prepare_event(event);

        match credentials {
            Credentials::Token(token) => {
                let outcome = self.manage_incident(&event, &token).await?;
                Ok(vec![outcome])
            }
            Credentials::Contacts(contacts) => self.notify_contacts(&event, &contacts).await,
        }
    }

    async fn notify_contacts(
        &self,
        event: &Event,
        contacts: &[Contact],
    ) -> Result<Vec<DeliveryOutcome>, HandlerError> {
        let mut outcomes = Vec::with_capacity(contacts.len());
        let mut failed = vec![];

        for contact in contacts {
            let result = match contact.resolve_token(self.env) {
                Ok(token) => self.manage_incident(event, &token).await,
                Err(err) => Err(err),
            };

            match result {
                Ok(outcome) => {
                    info!(contact = %contact, "Incident managed for contact");
                    outcomes.push(outcome);
                }
                Err(err) => {
                    warn!(contact = %contact, error = %err, "Failed to manage incident for contact");
                    failed.push(contact.to_string());
                }
            }
        }

        if failed.is_empty() {
            Ok(outcomes)
        } else {
            Err(HandlerError::ContactsFailed { failed })
        }
    }

    /// Compose and deliver the incident for `event` with `routing_key`.
    pub async fn manage_incident(
        &self,
        event: &Event,
        routing_key: &str,
    ) -> Result<DeliveryOutcome, HandlerError> {
        let check = event.check()?;
        let severity = severity::resolve_severity(check.status, &self.config.status_map_json)?;
        info!(status = check.status, severity = %severity, "Incident severity");

        let fields = FieldComposer::new(self.config, self.templates).compose(event)?;

        let primary = pagerduty::Event {
            routing_key: routing_key.to_string(),
            event_action: action_for_status(check.status),
            dedup_key: fields.dedup_key,
            images: vec![],
            links: fields.links,
            client: self.config.client_name.clone(),
            client_url: fields.client_url,
            payload: Payload {
                summary: fields.summary,
                source: event.entity_name().to_string(),
                severity,
                timestamp: fields.timestamp,
                component: fields.component,
                group: fields.group,
                class: fields.class,
                custom_details: fields.details,
            },
        };
        let fallback = delivery::fallback_event(&primary, event.check_name());

        delivery::deliver_with_fallback(
            self.api,
            &primary,
            &fallback,
            self.config.timeout_limit(),
        )
        .await
    }
}

/// Apply the event's annotation overrides to `base`, then handle the event
/// against the resulting endpoint.
pub async fn run(
    base: &HandlerConfig,
    event: &Event,
    templates: &dyn TemplateEvaluator,
    env: &dyn EnvLookup,
) -> Result<Vec<DeliveryOutcome>, HandlerError> {
    let config = base.with_annotation_overrides(event)?;
    let client = client_for(&config);
    Handler::new(&config, templates, &client, env)
        .handle(event)
        .await
}
