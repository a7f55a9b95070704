//! `PagerDuty` Events API v2 client.
//!
//! This crate provides the wire types and an HTTP client for enqueueing
//! trigger and resolve events, with two additions over a plain client:
//!
//! - events can be sent to an alternate endpoint (e.g. an on-premises relay)
//! - relays that answer a successful request with a non-JSON body are
//!   tolerated, and a response is synthesized from the status line and body
//!
//! # Usage
//!
//! ```no_run
//! use pagerduty::{Action, Client, Event, Payload, Severity};
//!
//! # async fn example() -> Result<(), pagerduty::EventsApiError> {
//! let client = Client::new();
//!
//! let event = Event {
//!     routing_key: "R0UT1NGK3Y".to_string(),
//!     event_action: Action::Trigger,
//!     dedup_key: "web-01-disk".to_string(),
//!     images: vec![],
//!     links: vec![],
//!     client: "Sensu".to_string(),
//!     client_url: String::new(),
//!     payload: Payload {
//!         summary: "web-01/disk : 97% used".to_string(),
//!         source: "web-01".to_string(),
//!         severity: Severity::Critical,
//!         timestamp: None,
//!         component: "disk".to_string(),
//!         group: String::new(),
//!         class: String::new(),
//!         custom_details: serde_json::Value::Null,
//!     },
//! };
//!
//! let response = client
//!     .send_event(&event, Some(std::time::Duration::from_secs(30)))
//!     .await?;
//! println!("{}: {}", response.status, response.dedup_key);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;
pub mod events;

pub use client::{Client, CLIENT_USER_AGENT, DEFAULT_ENDPOINT};
pub use error::EventsApiError;
pub use events::{
    Action, ErrorObject, Event, EventResponse, Image, Link, Payload, Severity, UnknownSeverity,
};
