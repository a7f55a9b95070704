//! Command-line interface.
//!
//! Every option can also be set through its `PAGERDUTY_*` environment
//! variable. Templates use handlebars syntax and see the whole event.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{
    HandlerConfig, DEFAULT_CLIENT_NAME, DEFAULT_DEDUP_KEY_TEMPLATE, DEFAULT_SUMMARY_TEMPLATE,
    DEFAULT_TEAM_SUFFIX,
};
use crate::error::HandlerError;

/// Manage `PagerDuty` incidents from monitoring events.
#[derive(Parser, Debug)]
#[command(name = "pagerduty-handler")]
#[command(about = "Manage PagerDuty incidents from monitoring events")]
#[command(version)]
pub struct Cli {
    /// Events API v2 routing key
    #[arg(short = 't', long, env = "PAGERDUTY_TOKEN", hide_env_values = true, default_value = "")]
    pub token: String,

    /// Team name, combined with the team suffix to name the variable holding the routing key
    #[arg(long, env = "PAGERDUTY_TEAM", default_value = "")]
    pub team: String,

    /// Suffix appended to the team name
    #[arg(long, env = "PAGERDUTY_TEAM_SUFFIX", default_value = DEFAULT_TEAM_SUFFIX)]
    pub team_suffix: String,

    /// Template for the dedup key
    #[arg(short = 'k', long, env = "PAGERDUTY_DEDUP_KEY_TEMPLATE", default_value = DEFAULT_DEDUP_KEY_TEMPLATE)]
    pub dedup_key_template: String,

    /// Severity to statuses mapping, e.g. '{"info":[0],"warning":[1],"critical":[2]}'
    #[arg(short = 's', long, env = "PAGERDUTY_STATUS_MAP", default_value = "")]
    pub status_map: String,

    /// Template for the incident summary
    #[arg(short = 'S', long, env = "PAGERDUTY_SUMMARY_TEMPLATE", default_value = DEFAULT_SUMMARY_TEMPLATE)]
    pub summary_template: String,

    /// Template for the incident details, the whole event when empty
    #[arg(short = 'd', long, env = "PAGERDUTY_DETAILS_TEMPLATE", default_value = "")]
    pub details_template: String,

    /// How rendered details are sent: string or json
    #[arg(long, env = "PAGERDUTY_DETAILS_FORMAT", default_value = "string")]
    pub details_format: String,

    /// Alternate Events API endpoint, e.g. an on-premises relay
    #[arg(short = 'e', long, env = "PAGERDUTY_ALTERNATE_ENDPOINT", default_value = "")]
    pub alternate_endpoint: String,

    /// Timeout in seconds for each delivery attempt, 0 for none
    #[arg(long, env = "PAGERDUTY_TIMEOUT", default_value_t = crate::config::DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Route the event to the contacts listed in its annotations
    #[arg(long)]
    pub contact_routing: bool,

    /// Client name reported with the incident
    #[arg(long, default_value = DEFAULT_CLIENT_NAME)]
    pub client_name: String,

    /// Base URL of the monitoring web UI, used for the incident client URL
    #[arg(short = 'u', long, env = "PAGERDUTY_SENSU_BASE_URL", default_value = "")]
    pub sensu_base_url: String,

    /// Add check and entity annotations holding URLs as incident links
    #[arg(short = 'l', long)]
    pub link_annotations: bool,

    /// Send the event time as the incident timestamp
    #[arg(short = 'T', long)]
    pub use_event_timestamp: bool,

    /// Template for the incident class
    #[arg(long, env = "PAGERDUTY_CLASS_TEMPLATE", default_value = "")]
    pub class_template: String,

    /// Template for the incident group
    #[arg(long, env = "PAGERDUTY_GROUP_TEMPLATE", default_value = "")]
    pub group_template: String,

    /// Template for the incident component, the check name when empty
    #[arg(long, env = "PAGERDUTY_COMPONENT_TEMPLATE", default_value = "")]
    pub component_template: String,

    /// Read the event from this file instead of stdin
    #[arg(long, value_name = "FILE")]
    pub event: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    /// Validate the options into a handler configuration.
    pub fn into_config(self) -> Result<HandlerConfig, HandlerError> {
        Ok(HandlerConfig {
            details_format: self.details_format.parse()?,
            alternate_endpoint: HandlerConfig::parse_alternate_endpoint(&self.alternate_endpoint)?,
            token: self.token,
            team_name: self.team,
            team_suffix: self.team_suffix,
            dedup_key_template: self.dedup_key_template,
            status_map_json: self.status_map,
            summary_template: self.summary_template,
            details_template: self.details_template,
            timeout: Duration::from_secs(self.timeout),
            contact_routing: self.contact_routing,
            client_name: self.client_name,
            base_url: self.sensu_base_url,
            link_annotations: self.link_annotations,
            use_event_timestamp: self.use_event_timestamp,
            class_template: self.class_template,
            group_template: self.group_template,
            component_template: self.component_template,
        })
    }
}
