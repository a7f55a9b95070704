//! Monitoring event handler that manages `PagerDuty` incidents.
//!
//! An event goes through the following steps:
//!
//! 1. **Preconditions**: the event must carry a check, and credentials must
//!    resolve (static token, team token or contact list)
//! 2. **Composition**: severity from the check status, then summary, dedup
//!    key, details and the optional PD-CEF fields from templates
//! 3. **Delivery**: the event is sent to the Events API, with a reduced
//!    fallback event if the full one is rejected
//!
//! In contact routing mode steps 2 and 3 run once per contact, in order, and
//! a failing contact does not stop the others.

#![warn(clippy::pedantic)]

pub mod cli;
pub mod config;
pub mod credentials;
pub mod delivery;
pub mod error;
pub mod event;
pub mod fields;
pub mod pipeline;
pub mod severity;
pub mod template;

pub use config::{DetailsFormat, HandlerConfig};
pub use credentials::{Contact, Credentials, EnvLookup, ProcessEnv};
pub use delivery::{DeliveryOutcome, IncidentApi};
pub use error::{ErrorClass, HandlerError};
pub use event::Event;
pub use pipeline::{run, Handler};
pub use template::{HandlebarsEvaluator, TemplateError, TemplateEvaluator};
