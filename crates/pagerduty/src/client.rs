//! HTTP client for the Events API v2.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::error::EventsApiError;
use crate::events::{ErrorObject, Event, EventResponse};

/// `PagerDuty` Events API v2 endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://events.pagerduty.com/v2/enqueue";

/// User agent sent with every request.
pub const CLIENT_USER_AGENT: &str = concat!("pagerduty-handler/", env!("CARGO_PKG_VERSION"));

/// Client for the Events API v2.
///
/// The client is stateless apart from its endpoint, so one instance can be
/// shared across events and contacts.
#[derive(Debug, Clone)]
pub struct Client {
    endpoint: String,
    /// Synthesize a response from non-JSON success bodies (relays only)
    tolerate_non_json: bool,
    http: reqwest::Client,
}

impl Client {
    /// Create a client for the public Events API endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self::build(DEFAULT_ENDPOINT.to_string(), false)
    }

    /// Create a client for an alternate endpoint, such as an on-premises relay.
    #[must_use]
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let tolerate_non_json = endpoint != DEFAULT_ENDPOINT;
        Self::build(endpoint, tolerate_non_json)
    }

    /// A client that treats `endpoint` like the public Events API.
    #[cfg(test)]
    pub(crate) fn strict(endpoint: impl Into<String>) -> Self {
        Self::build(endpoint.into(), false)
    }

    fn build(endpoint: String, tolerate_non_json: bool) -> Self {
        Self {
            endpoint,
            tolerate_non_json,
            http: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether this client talks to the public Events API.
    #[must_use]
    pub fn is_default_endpoint(&self) -> bool {
        self.endpoint == DEFAULT_ENDPOINT
    }

    /// Send an event.
    ///
    /// A 200 or 202 response is decoded into an [`EventResponse`]. Alternate
    /// endpoints may answer with a non-JSON body, in which case a response is
    /// synthesized from the HTTP status line and the raw body. Any other
    /// status code is always an error.
    ///
    /// With a non-zero `timeout` the whole exchange is abandoned (and the
    /// in-flight request dropped) once it elapses.
    pub async fn send_event(
        &self,
        event: &Event,
        timeout: Option<Duration>,
    ) -> Result<EventResponse, EventsApiError> {
        match timeout.filter(|limit| !limit.is_zero()) {
            Some(limit) => tokio::time::timeout(limit, self.exchange(event))
                .await
                .map_err(|_| EventsApiError::Timeout(limit))?,
            None => self.exchange(event).await,
        }
    }

    async fn exchange(&self, event: &Event) -> Result<EventResponse, EventsApiError> {
        let body = serde_json::to_vec(event)?;

        debug!(
            endpoint = %self.endpoint,
            action = %event.event_action,
            dedup_key = %event.dedup_key,
            bytes = body.len(),
            "Sending PagerDuty event"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::ACCEPTED {
            return Err(Self::error_from_response(response).await);
        }

        let body = response.bytes().await?;
        match serde_json::from_slice::<EventResponse>(&body) {
            Ok(decoded) => Ok(decoded),
            Err(source) if !self.tolerate_non_json => Err(EventsApiError::MalformedResponse {
                endpoint: self.endpoint.clone(),
                status_code: status.as_u16(),
                source,
            }),
            Err(source) => {
                // Some relays answer with plain text; keep what they said.
                debug!(
                    endpoint = %self.endpoint,
                    error = %source,
                    "Non-JSON response from alternate endpoint"
                );
                Ok(EventResponse {
                    status: status.to_string(),
                    dedup_key: if status.is_success() {
                        event.dedup_key.clone()
                    } else {
                        String::new()
                    },
                    message: String::from_utf8_lossy(&body).into_owned(),
                    errors: vec![],
                })
            }
        }
    }

    async fn error_from_response(response: reqwest::Response) -> EventsApiError {
        let status_code = response.status().as_u16();

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(source) => {
                return EventsApiError::UnreadableBody {
                    status_code,
                    source,
                }
            }
        };

        match serde_json::from_slice::<ErrorObject>(&body) {
            Ok(error) => {
                warn!(
                    status = status_code,
                    api_status = %error.status,
                    message = %error.message,
                    "PagerDuty API request failed"
                );
                EventsApiError::Api { status_code, error }
            }
            Err(source) => {
                let body = String::from_utf8_lossy(&body).into_owned();
                warn!(status = status_code, body = %body, "PagerDuty API request failed");
                EventsApiError::MalformedErrorBody {
                    status_code,
                    body,
                    source,
                }
            }
        }
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}
