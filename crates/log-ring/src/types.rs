//! Log entry and severity types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A structured log entry retained in the ring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    pub level: String,
    #[serde(rename = "msg")]
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attrs: HashMap<String, serde_json::Value>,
}

impl LogEntry {
    /// Create an entry with the current timestamp and no attributes
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            level: level.as_str().to_string(),
            message: message.into(),
            attrs: HashMap::new(),
        }
    }

    /// The parsed severity of this entry, if its label is recognized
    pub fn parsed_level(&self) -> Option<LogLevel> {
        LogLevel::parse(&self.level)
    }
}

/// Log severity, totally ordered Debug < Info < Warn < Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Canonical label used for stored entries
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// Parse a severity label, case-insensitively.
    ///
    /// Unrecognized labels yield `None`; callers treat those entries as
    /// an unordered lowest-priority bucket.
    pub fn parse(label: &str) -> Option<Self> {
        match label.to_ascii_uppercase().as_str() {
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" => Some(LogLevel::Warn),
            "ERROR" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_parse_canonical_labels() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("INFO"), Some(LogLevel::Info));
        assert_eq!(LogLevel::parse("WARN"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("ERROR"), Some(LogLevel::Error));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("Warn"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("error"), Some(LogLevel::Error));
    }

    #[test]
    fn test_parse_unknown_label() {
        assert_eq!(LogLevel::parse("FATAL"), None);
        assert_eq!(LogLevel::parse(""), None);
    }

    #[test]
    fn test_entry_roundtrip() {
        let mut entry = LogEntry::new(LogLevel::Info, "cache hit");
        entry
            .attrs
            .insert("key".to_string(), serde_json::json!("abc_720.mp4"));

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"msg\":\"cache hit\""));
        assert!(json.contains("INFO"));

        let back: LogEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.message, "cache hit");
        assert_eq!(back.parsed_level(), Some(LogLevel::Info));
        assert_eq!(back.attrs["key"], "abc_720.mp4");
    }

    #[test]
    fn test_empty_attrs_omitted() {
        let entry = LogEntry::new(LogLevel::Warn, "plain entry");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("attrs"));
    }
}
