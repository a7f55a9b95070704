//! Routing key resolution.
//!
//! A routing key comes from one of three places:
//!
//! - the static token in the configuration
//! - a team variable, named after the configured team and suffix, which
//!   overrides the static token when it is set
//! - one `PAGERDUTY_TOKEN_<CONTACT>` variable per contact listed in the
//!   `contacts` annotations of the event (contact routing)
//!
//! Resolution never writes back into the configuration; the result is a
//! [`Credentials`] value scoped to the event being handled.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::config::HandlerConfig;
use crate::error::HandlerError;
use crate::event::Event;

/// Annotation key listing contacts, comma separated.
pub const CONTACTS_ANNOTATION: &str = "contacts";

/// Prefix of per-contact token variables.
pub const CONTACT_TOKEN_PREFIX: &str = "PAGERDUTY_TOKEN_";

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^A-Za-z0-9]+").expect("valid regex"));

static VALID_CONTACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[A-Za-z0-9_]+$").expect("valid regex"));

/// Source of environment-style variables.
pub trait EnvLookup: Send + Sync {
    /// Value of `name`, `None` when unset.
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// A validated contact identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Contact(String);

impl Contact {
    /// Validate a contact: letters, digits and underscores only.
    pub fn parse(contact: &str) -> Result<Self, HandlerError> {
        if VALID_CONTACT.is_match(contact) {
            Ok(Self(contact.to_string()))
        } else {
            Err(HandlerError::InvalidContact(contact.to_string()))
        }
    }

    /// Name of the variable holding this contact's routing key.
    #[must_use]
    pub fn token_variable(&self) -> String {
        format!("{CONTACT_TOKEN_PREFIX}{}", self.0.to_uppercase())
    }

    /// This contact's routing key.
    pub fn resolve_token(&self, env: &dyn EnvLookup) -> Result<String, HandlerError> {
        let variable = self.token_variable();
        match env.var(&variable) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(HandlerError::ContactToken {
                contact: self.0.clone(),
                variable,
            }),
        }
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Credentials for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A single routing key
    Token(String),
    /// Contact routing: one delivery per contact, in order
    Contacts(Vec<Contact>),
}

/// Variable name holding a team's routing key.
///
/// Runs of non-alphanumeric characters in both parts become `_`, and the
/// suffix is appended unless the team name already ends with it.
pub fn team_variable_name(team: &str, suffix: &str) -> Result<String, HandlerError> {
    let mut name = NON_ALPHANUMERIC.replace_all(team, "_").into_owned();
    let suffix = NON_ALPHANUMERIC.replace_all(suffix, "_");
    if !name.ends_with(&*suffix) {
        name.push_str(&suffix);
    }
    if name.is_empty() {
        return Err(HandlerError::EmptyTeamVariable {
            team: team.to_string(),
            suffix: suffix.into_owned(),
        });
    }
    Ok(name)
}

/// The team's routing key, `None` when team mode is off or the variable is
/// empty.
pub fn team_token(
    config: &HandlerConfig,
    env: &dyn EnvLookup,
) -> Result<Option<String>, HandlerError> {
    if config.team_name.is_empty() {
        return Ok(None);
    }

    let variable = team_variable_name(&config.team_name, &config.team_suffix)?;
    info!(variable = %variable, "Looking up team token");

    match env.var(&variable).filter(|token| !token.is_empty()) {
        Some(token) => {
            info!(variable = %variable, "Team token found, replacing default token");
            Ok(Some(token))
        }
        None => {
            info!(variable = %variable, "Team token is empty, using default token instead");
            Ok(None)
        }
    }
}

/// Contacts from event, check and entity annotations, de-duplicated in
/// first-seen order. Entries are kept exactly as written, so `"ops, dba"`
/// yields `" dba"` and fails validation.
#[must_use]
pub fn collect_contacts(event: &Event) -> Vec<String> {
    let mut contacts: Vec<String> = vec![];
    let listed = event
        .annotation_sources()
        .filter_map(|annotations| annotations.get(CONTACTS_ANNOTATION))
        .flat_map(|list| list.split(','));

    for contact in listed {
        if !contacts.iter().any(|seen| seen == contact) {
            contacts.push(contact.to_string());
        }
    }
    contacts
}

/// Resolve the credentials for `event`.
///
/// Any error here is a precondition failure: nothing has been sent yet.
/// Per-contact tokens are resolved later, one contact at a time.
pub fn resolve(
    config: &HandlerConfig,
    event: &Event,
    env: &dyn EnvLookup,
) -> Result<Credentials, HandlerError> {
    let token = team_token(config, env)?.unwrap_or_else(|| config.token.clone());

    if config.contact_routing {
        let contacts = collect_contacts(event);
        if contacts.is_empty() {
            return Err(HandlerError::NoContacts);
        }
        let contacts = contacts
            .iter()
            .map(|contact| Contact::parse(contact))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Credentials::Contacts(contacts));
    }

    if token.is_empty() {
        return Err(HandlerError::MissingToken);
    }
    Ok(Credentials::Token(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::fixture;

    fn env(vars: &[(&str, &str)]) -> HashMap<String, String> {
        vars.iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect()
    }

    fn team_config(team: &str, suffix: &str) -> HandlerConfig {
        HandlerConfig {
            token: "default_token".to_string(),
            team_name: team.to_string(),
            team_suffix: suffix.to_string(),
            ..HandlerConfig::default()
        }
    }

    #[test]
    fn test_team_variable_name() {
        assert_eq!(
            team_variable_name("test_team", "_test_suffix").unwrap(),
            "test_team_test_suffix"
        );
        assert_eq!(
            team_variable_name("test-team", "_test_suffix").unwrap(),
            "test_team_test_suffix"
        );
        assert_eq!(
            team_variable_name("test-team", "_test-a-suffix").unwrap(),
            "test_team_test_a_suffix"
        );
        assert_eq!(team_variable_name("test-team", "").unwrap(), "test_team");
        assert_eq!(
            team_variable_name("ops_pagerduty_token", "_pagerduty_token").unwrap(),
            "ops_pagerduty_token"
        );
    }

    #[test]
    fn test_team_variable_name_cannot_be_empty() {
        assert!(matches!(
            team_variable_name("", ""),
            Err(HandlerError::EmptyTeamVariable { .. })
        ));
    }

    #[test]
    fn test_team_token() {
        let env = env(&[("test_team_test_suffix", "token_value")]);

        let token = team_token(&team_config("test_team", "_test_suffix"), &env).unwrap();
        assert_eq!(token.as_deref(), Some("token_value"));

        let token = team_token(&team_config("test-team", "_test_suffix"), &env).unwrap();
        assert_eq!(token.as_deref(), Some("token_value"));
    }

    #[test]
    fn test_team_token_overrides_static_token() {
        let env = env(&[("test_team_test_suffix", "token_value")]);
        let event = fixture("foo", "bar");

        let credentials =
            resolve(&team_config("test_team", "_test_suffix"), &event, &env).unwrap();
        assert_eq!(credentials, Credentials::Token("token_value".to_string()));
    }

    #[test]
    fn test_missing_team_token_keeps_static_token() {
        let env = env(&[("other_team_test_suffix", "")]);
        let event = fixture("foo", "bar");

        let credentials =
            resolve(&team_config("other_team", "_test_suffix"), &event, &env).unwrap();
        assert_eq!(credentials, Credentials::Token("default_token".to_string()));
    }

    #[test]
    fn test_static_token_required() {
        let event = fixture("foo", "bar");
        let err = resolve(&HandlerConfig::default(), &event, &env(&[])).unwrap_err();
        assert!(matches!(err, HandlerError::MissingToken));
    }

    #[test]
    fn test_collect_contacts_dedups_in_order() {
        let mut event = fixture("foo", "bar");
        event
            .metadata
            .annotations
            .insert("contacts".to_string(), "ops,dba".to_string());
        if let Some(check) = event.check.as_mut() {
            check
                .metadata
                .annotations
                .insert("contacts".to_string(), "dba,web".to_string());
        }
        event
            .entity
            .metadata
            .annotations
            .insert("contacts".to_string(), "ops,net".to_string());

        assert_eq!(collect_contacts(&event), ["ops", "dba", "web", "net"]);
    }

    #[test]
    fn test_contact_routing_requires_contacts() {
        let config = HandlerConfig {
            contact_routing: true,
            ..HandlerConfig::default()
        };
        let err = resolve(&config, &fixture("foo", "bar"), &env(&[])).unwrap_err();
        assert!(matches!(err, HandlerError::NoContacts));
    }

    #[test]
    fn test_contact_routing_rejects_invalid_contacts() {
        let config = HandlerConfig {
            contact_routing: true,
            ..HandlerConfig::default()
        };
        let mut event = fixture("foo", "bar");
        event.metadata.annotations.insert(
            "contacts".to_string(),
            "valid_contact,invalid-contact".to_string(),
        );

        let err = resolve(&config, &event, &env(&[])).unwrap_err();
        assert_eq!(err.to_string(), "invalid contact syntax: invalid-contact");
    }

    #[test]
    fn test_contact_entries_are_not_trimmed() {
        let config = HandlerConfig {
            contact_routing: true,
            ..HandlerConfig::default()
        };
        let mut event = fixture("foo", "bar");
        event
            .metadata
            .annotations
            .insert("contacts".to_string(), "ops, dba".to_string());

        assert_eq!(collect_contacts(&event), ["ops", " dba"]);
        let err = resolve(&config, &event, &env(&[])).unwrap_err();
        assert_eq!(err.to_string(), "invalid contact syntax:  dba");
    }

    #[test]
    fn test_trailing_comma_is_an_invalid_contact() {
        let config = HandlerConfig {
            contact_routing: true,
            ..HandlerConfig::default()
        };
        let mut event = fixture("foo", "bar");
        event
            .entity
            .metadata
            .annotations
            .insert("contacts".to_string(), "ops,".to_string());

        let err = resolve(&config, &event, &env(&[])).unwrap_err();
        assert!(matches!(err, HandlerError::InvalidContact(contact) if contact.is_empty()));
    }

    #[test]
    fn test_contact_routing_does_not_need_static_token() {
        let config = HandlerConfig {
            contact_routing: true,
            ..HandlerConfig::default()
        };
        let mut event = fixture("foo", "bar");
        event
            .entity
            .metadata
            .annotations
            .insert("contacts".to_string(), "ops".to_string());

        let credentials = resolve(&config, &event, &env(&[])).unwrap();
        assert_eq!(
            credentials,
            Credentials::Contacts(vec![Contact::parse("ops").unwrap()])
        );
    }

    #[test]
    fn test_contact_token() {
        let contact = Contact::parse("ops_Team").unwrap();
        assert_eq!(contact.token_variable(), "PAGERDUTY_TOKEN_OPS_TEAM");

        let env = env(&[("PAGERDUTY_TOKEN_OPS_TEAM", "ops_token")]);
        assert_eq!(contact.resolve_token(&env).unwrap(), "ops_token");

        let err = Contact::parse("dba").unwrap().resolve_token(&env).unwrap_err();
        assert_eq!(
            err.to_string(),
            "no environment variable found for \"PAGERDUTY_TOKEN_DBA\" (contact dba)"
        );
    }
}
