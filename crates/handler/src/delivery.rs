//! Event delivery with a single fallback attempt.
//!
//! Delivery runs as a two-step state machine:
//!
//! ```text
//! Primary --ok--> Delivered
//!    |
//!   err
//!    v
//! Fallback --ok--> Delivered (primary failure logged)
//!    |
//!   err
//!    v
//! Failed (both failures reported)
//! ```
//!
//! The fallback event keeps the routing key, action and dedup key but drops
//! the enrichment most likely to have made the primary event too large.

use std::time::Duration;

use async_trait::async_trait;
use pagerduty::{EventResponse, EventsApiError, Payload};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::HandlerError;

/// Details sent with the fallback event.
pub const FALLBACK_DETAILS: &str =
    "Original payload had an error, maybe due to event length. PagerDuty Events must be less than 512KB";

/// The incident API the pipeline delivers to.
#[async_trait]
pub trait IncidentApi: Send + Sync {
    /// Endpoint, for logging.
    fn endpoint(&self) -> &str;

    /// Send one event, bounded by `timeout` when given.
    async fn send_event(
        &self,
        event: &pagerduty::Event,
        timeout: Option<Duration>,
    ) -> Result<EventResponse, EventsApiError>;
}

#[async_trait]
impl IncidentApi for pagerduty::Client {
    fn endpoint(&self) -> &str {
        pagerduty::Client::endpoint(self)
    }

    async fn send_event(
        &self,
        event: &pagerduty::Event,
        timeout: Option<Duration>,
    ) -> Result<EventResponse, EventsApiError> {
        pagerduty::Client::send_event(self, event, timeout).await
    }
}

/// How an event was delivered.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// The full event was accepted
    Primary(EventResponse),
    /// The full event failed, the reduced fallback event was accepted
    Fallback {
        response: EventResponse,
        primary_error: EventsApiError,
    },
}

impl DeliveryOutcome {
    #[must_use]
    pub fn response(&self) -> &EventResponse {
        match self {
            Self::Primary(response) | Self::Fallback { response, .. } => response,
        }
    }

    #[must_use]
    pub fn used_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Reduced copy of `primary`: fixed details, component set to the check
/// name, and no group, class, timestamp, links or client information.
#[must_use]
pub fn fallback_event(primary: &pagerduty::Event, check_name: &str) -> pagerduty::Event {
    pagerduty::Event {
        routing_key: primary.routing_key.clone(),
        event_action: primary.event_action,
        dedup_key: primary.dedup_key.clone(),
        images: vec![],
        links: vec![],
        client: String::new(),
        client_url: String::new(),
        payload: Payload {
            summary: primary.payload.summary.clone(),
            source: primary.payload.source.clone(),
            severity: primary.payload.severity,
            timestamp: None,
            component: check_name.to_string(),
            group: String::new(),
            class: String::new(),
            custom_details: Value::String(FALLBACK_DETAILS.to_string()),
        },
    }
}

/// Send `primary`, then `fallback` if the primary attempt fails.
///
/// Each attempt gets its own `timeout`.
pub async fn deliver_with_fallback(
    api: &dyn IncidentApi,
    primary: &pagerduty::Event,
    fallback: &pagerduty::Event,
    timeout: Option<Duration>,
) -> Result<DeliveryOutcome, HandlerError> {
    let primary_error = match api.send_event(primary, timeout).await {
        Ok(response) => {
            info!(
                action = %primary.event_action,
                status = %response.status,
                dedup_key = %response.dedup_key,
                message = %response.message,
                "Event submitted to PagerDuty"
            );
            return Ok(DeliveryOutcome::Primary(response));
        }
        Err(err) => err,
    };

    warn!(
        endpoint = api.endpoint(),
        dedup_key = %primary.dedup_key,
        error = %primary_error,
        "Event send failed, sending fallback event"
    );

    match api.send_event(fallback, timeout).await {
        Ok(response) => {
            info!(
                action = %fallback.event_action,
                status = %response.status,
                dedup_key = %response.dedup_key,
                message = %response.message,
                "Fallback event submitted to PagerDuty"
            );
            Ok(DeliveryOutcome::Fallback {
                response,
                primary_error,
            })
        }
        Err(fallback_error) => Err(HandlerError::Delivery {
            primary: primary_error,
            fallback: fallback_error,
        }),
    }
}
