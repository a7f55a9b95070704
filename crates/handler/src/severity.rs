//! Check status to incident severity mapping.
//!
//! A status map is configured as JSON keyed by severity, e.g.
//! `{"info":[130,10],"error":[4]}`, and inverted once into a lookup from
//! status to severity. Statuses the map does not cover use the built-in
//! mapping: 0 is `info`, 1 is `warning`, 2 is `critical`, anything else is
//! `warning`.

use std::collections::BTreeMap;
use std::str::FromStr;

use pagerduty::{Severity, UnknownSeverity};
use thiserror::Error;

/// Errors raised while parsing a status map.
#[derive(Debug, Error)]
pub enum StatusMapError {
    #[error("invalid status map: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    UnknownSeverity(#[from] UnknownSeverity),

    #[error("status {status} is mapped to both {first} and {second}")]
    ConflictingStatus {
        status: u32,
        first: Severity,
        second: Severity,
    },
}

/// Validated lookup from check status to severity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusMap(BTreeMap<u32, Severity>);

impl StatusMap {
    /// Parse and invert a severity to statuses mapping.
    pub fn parse(json: &str) -> Result<Self, StatusMapError> {
        let by_severity: BTreeMap<String, Vec<u32>> = serde_json::from_str(json)?;

        let mut by_status = BTreeMap::new();
        for (label, statuses) in by_severity {
            let severity: Severity = label.parse()?;
            for status in statuses {
                if let Some(first) = by_status.insert(status, severity) {
                    if first != severity {
                        return Err(StatusMapError::ConflictingStatus {
                            status,
                            first,
                            second: severity,
                        });
                    }
                }
            }
        }

        Ok(Self(by_status))
    }

    #[must_use]
    pub fn get(&self, status: u32) -> Option<Severity> {
        self.0.get(&status).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for StatusMap {
    type Err = StatusMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Built-in mapping used when no status map covers `status`.
#[must_use]
pub const fn default_severity(status: u32) -> Severity {
    match status {
        0 => Severity::Info,
        2 => Severity::Critical,
        _ => Severity::Warning,
    }
}

/// Severity for `status`, consulting `map` first.
#[must_use]
pub fn severity(status: u32, map: Option<&StatusMap>) -> Severity {
    map.and_then(|map| map.get(status))
        .unwrap_or_else(|| default_severity(status))
}

/// Severity for `status` given the raw status map JSON (empty for none).
pub fn resolve_severity(status: u32, status_map_json: &str) -> Result<Severity, StatusMapError> {
    if status_map_json.is_empty() {
        return Ok(default_severity(status));
    }
    let map = StatusMap::parse(status_map_json)?;
    Ok(severity(status, Some(&map)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS_MAP: &str = r#"{"info":[130,10],"error":[4]}"#;

    #[test]
    fn test_parse_status_map() {
        let map = StatusMap::parse(STATUS_MAP).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(130), Some(Severity::Info));
        assert_eq!(map.get(10), Some(Severity::Info));
        assert_eq!(map.get(4), Some(Severity::Error));
    }

    #[test]
    fn test_parse_status_map_empty_status_list() {
        let map: StatusMap = r#"{"info":[130,10],"error":[]}"#.parse().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(4), None);
    }

    #[test]
    fn test_parse_status_map_invalid_json() {
        let err = StatusMap::parse(r#"{"info":[130,10],"error:[]}"#).unwrap_err();
        assert!(matches!(err, StatusMapError::Json(_)));
    }

    #[test]
    fn test_parse_status_map_invalid_severity() {
        let err = StatusMap::parse(r#"{"info":[130,10],"invalid":[4]}"#).unwrap_err();
        assert_eq!(err.to_string(), "invalid pagerduty severity: invalid");
    }

    #[test]
    fn test_parse_status_map_rejects_negative_status() {
        assert!(StatusMap::parse(r#"{"info":[-1]}"#).is_err());
    }

    #[test]
    fn test_parse_status_map_conflicting_status() {
        let err = StatusMap::parse(r#"{"info":[3],"critical":[3]}"#).unwrap_err();
        assert!(matches!(
            err,
            StatusMapError::ConflictingStatus { status: 3, .. }
        ));
    }

    #[test]
    fn test_default_severities() {
        assert_eq!(resolve_severity(0, "").unwrap(), Severity::Info);
        assert_eq!(resolve_severity(1, "").unwrap(), Severity::Warning);
        assert_eq!(resolve_severity(2, "").unwrap(), Severity::Critical);
        assert_eq!(resolve_severity(3, "").unwrap(), Severity::Warning);
        assert_eq!(resolve_severity(99, "").unwrap(), Severity::Warning);
    }

    #[test]
    fn test_status_map_takes_precedence() {
        assert_eq!(resolve_severity(130, STATUS_MAP).unwrap(), Severity::Info);
        assert_eq!(resolve_severity(10, STATUS_MAP).unwrap(), Severity::Info);
        assert_eq!(resolve_severity(4, STATUS_MAP).unwrap(), Severity::Error);
    }

    #[test]
    fn test_status_not_in_map_falls_back() {
        assert_eq!(resolve_severity(2, STATUS_MAP).unwrap(), Severity::Critical);
        assert_eq!(resolve_severity(0, STATUS_MAP).unwrap(), Severity::Info);
        assert_eq!(resolve_severity(7, STATUS_MAP).unwrap(), Severity::Warning);
    }

    #[test]
    fn test_invalid_status_map_is_an_error() {
        assert!(resolve_severity(2, r#"{"info":[130,10],"error"[4]}"#).is_err());
    }
}
