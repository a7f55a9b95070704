//! Inbound monitoring event model.
//!
//! Only the fields the handler reads are typed. Everything else is kept in
//! the flattened `extra` maps so the event can be forwarded verbatim as
//! incident details.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::HandlerError;

/// Name, namespace, labels and annotations of an object.
///
/// Maps are ordered by key so iteration (and therefore link order) is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub annotations: BTreeMap<String, String>,
    /// Untyped metadata (`created_by`, ...), kept for details and templates
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The entity (host, service, proxy) the event is about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of a check execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Check {
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Exit status, 0 is OK
    #[serde(default)]
    pub status: u32,
    #[serde(default)]
    pub output: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A monitoring event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Seconds since the Unix epoch
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub entity: Entity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<Check>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// The check record, which every handled event must carry.
    pub fn check(&self) -> Result<&Check, HandlerError> {
        self.check.as_ref().ok_or(HandlerError::MissingCheck)
    }

    #[must_use]
    pub fn entity_name(&self) -> &str {
        &self.entity.metadata.name
    }

    /// Check name, empty when the event has no check.
    #[must_use]
    pub fn check_name(&self) -> &str {
        self.check.as_ref().map_or("", |check| &check.metadata.name)
    }

    /// Namespace of the event, falling back to the entity's namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        if self.metadata.namespace.is_empty() {
            &self.entity.metadata.namespace
        } else {
            &self.metadata.namespace
        }
    }

    /// Event time as an RFC 3339 string in UTC.
    #[must_use]
    pub fn timestamp_rfc3339(&self) -> Option<String> {
        DateTime::from_timestamp(self.timestamp, 0)
            .map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    /// Event-level, check-level and entity-level annotations, in that order.
    pub fn annotation_sources(&self) -> impl Iterator<Item = &BTreeMap<String, String>> {
        [
            Some(&self.metadata.annotations),
            self.check.as_ref().map(|check| &check.metadata.annotations),
            Some(&self.entity.metadata.annotations),
        ]
        .into_iter()
        .flatten()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An event for entity `entity` and check `check` in namespace `default`.
#[cfg(test)]
pub(crate) fn fixture(entity: &str, check: &str) -> Event {
    Event {
        timestamp: 1_550_816_894,
        metadata: ObjectMeta {
            namespace: "default".to_string(),
            ..ObjectMeta::default()
        },
        entity: Entity {
            metadata: ObjectMeta {
                name: entity.to_string(),
                namespace: "default".to_string(),
                ..ObjectMeta::default()
            },
            extra: Map::new(),
        },
        check: Some(Check {
            metadata: ObjectMeta {
                name: check.to_string(),
                namespace: "default".to_string(),
                ..ObjectMeta::default()
            },
            status: 0,
            output: String::new(),
            extra: Map::new(),
        }),
        extra: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_keeps_unknown_fields() {
        let event: Event = serde_json::from_value(json!({
            "timestamp": 1_550_816_894,
            "id": "3a5948f3-6ffd-4ea2-a41e-334f4a72ca2f",
            "entity": {
                "entity_class": "agent",
                "metadata": {
                    "name": "web-01",
                    "namespace": "production",
                    "annotations": null,
                    "created_by": "admin"
                }
            },
            "check": {
                "metadata": {"name": "disk", "labels": {"group": "storage"}},
                "status": 2,
                "output": "97% used",
                "interval": 60
            }
        }))
        .unwrap();

        assert_eq!(event.entity_name(), "web-01");
        assert_eq!(event.check_name(), "disk");
        assert_eq!(event.namespace(), "production");
        assert_eq!(event.check().unwrap().status, 2);
        assert_eq!(event.extra["id"], "3a5948f3-6ffd-4ea2-a41e-334f4a72ca2f");
        assert_eq!(event.entity.metadata.extra["created_by"], "admin");

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["entity"]["entity_class"], "agent");
        assert_eq!(value["check"]["interval"], 60);
        assert_eq!(value["check"]["metadata"]["labels"]["group"], "storage");
        assert_eq!(value["entity"]["metadata"]["created_by"], "admin");
    }

    #[test]
    fn test_missing_check_is_an_error() {
        let mut event = fixture("foo", "bar");
        event.check = None;

        assert!(matches!(event.check(), Err(HandlerError::MissingCheck)));
        assert_eq!(event.check_name(), "");
    }

    #[test]
    fn test_timestamp_rfc3339() {
        let event = fixture("foo", "bar");
        assert_eq!(
            event.timestamp_rfc3339().as_deref(),
            Some("2019-02-22T06:28:14Z")
        );
    }

    #[test]
    fn test_annotation_sources_order() {
        let mut event = fixture("foo", "bar");
        event
            .metadata
            .annotations
            .insert("contacts".to_string(), "event".to_string());
        event
            .entity
            .metadata
            .annotations
            .insert("contacts".to_string(), "entity".to_string());
        if let Some(check) = event.check.as_mut() {
            check
                .metadata
                .annotations
                .insert("contacts".to_string(), "check".to_string());
        }

        let order: Vec<&str> = event
            .annotation_sources()
            .filter_map(|annotations| annotations.get("contacts").map(String::as_str))
            .collect();
        assert_eq!(order, ["event", "check", "entity"]);
    }
}
