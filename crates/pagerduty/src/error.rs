//! Error types for the Events API client.

use std::time::Duration;

use thiserror::Error;

use crate::events::ErrorObject;

/// Errors that can occur when sending an event.
#[derive(Debug, Error)]
pub enum EventsApiError {
    /// HTTP request failed before a response was received
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The exchange did not complete within the configured timeout
    #[error("request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Non-2xx response carrying a JSON error object
    #[error("{}", api_error_message(*status_code, error))]
    Api {
        status_code: u16,
        error: ErrorObject,
    },

    /// Non-2xx response whose body could not be read
    #[error("HTTP response with status code: {status_code}: error: {source}")]
    UnreadableBody {
        status_code: u16,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response whose body (possibly empty) is not a JSON error object
    #[error(
        "HTTP response with status code: {status_code}, JSON unmarshal object body failed: {source}, body: {body}"
    )]
    MalformedErrorBody {
        status_code: u16,
        body: String,
        #[source]
        source: serde_json::Error,
    },

    /// 2xx response from the vendor endpoint that is not valid JSON
    #[error("invalid response body from {endpoint} (status code {status_code}): {source}")]
    MalformedResponse {
        endpoint: String,
        status_code: u16,
        #[source]
        source: serde_json::Error,
    },
}

impl EventsApiError {
    /// HTTP status code of the response, if one was received.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status_code, .. }
            | Self::UnreadableBody { status_code, .. }
            | Self::MalformedErrorBody { status_code, .. }
            | Self::MalformedResponse { status_code, .. } => Some(*status_code),
            Self::Http(_) | Self::Timeout(_) | Self::Serialization(_) => None,
        }
    }
}

fn api_error_message(status_code: u16, error: &ErrorObject) -> String {
    let mut message = format!(
        "HTTP response failed with status code {status_code}, status: {}, message: {}",
        error.status, error.message
    );
    if let Some(detail) = errors_detail(&error.errors) {
        message.push_str(": ");
        message.push_str(&detail);
    }
    message
}

fn errors_detail(errors: &[String]) -> Option<String> {
    match errors {
        [] => None,
        [only] => Some(only.clone()),
        [first, rest @ ..] => {
            let noun = if rest.len() > 1 { "errors" } else { "error" };
            Some(format!("{first} (and {} more {noun}...)", rest.len()))
        }
    }
}
