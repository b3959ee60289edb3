//! Access log format module
//!
//! Supported formats:
//! - `combined` (Apache/Nginx combined format)
//! - `common` (Common Log Format - CLF)
//! - `json` (one JSON object per line)

use chrono::{DateTime, Local};
use serde::Serialize;

const CLF_TIME: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Access log line layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLogFormat {
    Combined,
    Common,
    Json,
}

impl AccessLogFormat {
    /// Parse the configured format name; unknown names fall back to `combined`
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "common" => Self::Common,
            "json" => Self::Json,
            _ => Self::Combined,
        }
    }
}

/// One completed request
#[derive(Debug, Clone, Serialize)]
pub struct AccessLogEntry {
    pub remote_addr: String,
    #[serde(serialize_with = "serialize_rfc3339")]
    pub time: DateTime<Local>,
    pub method: String,
    pub path: String,
    /// Query string (without leading ?)
    pub query: Option<String>,
    pub http_version: String,
    pub status: u16,
    pub body_bytes: usize,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    /// Processing time in microseconds, delay included
    pub request_time_us: u64,
}

fn serialize_rfc3339<S: serde::Serializer>(
    time: &DateTime<Local>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.to_rfc3339())
}

impl AccessLogEntry {
    /// Create a new access log entry stamped with the current time
    pub fn new(remote_addr: String, method: String, path: String) -> Self {
        Self {
            remote_addr,
            time: Local::now(),
            method,
            path,
            query: None,
            http_version: "1.1".to_string(),
            status: 200,
            body_bytes: 0,
            referer: None,
            user_agent: None,
            request_time_us: 0,
        }
    }

    pub fn format(&self, format: AccessLogFormat) -> String {
        match format {
            AccessLogFormat::Combined => format!(
                "{} \"{}\" \"{}\"",
                self.common_line(),
                self.referer.as_deref().unwrap_or("-"),
                self.user_agent.as_deref().unwrap_or("-"),
            ),
            AccessLogFormat::Common => self.common_line(),
            AccessLogFormat::Json => {
                serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
            }
        }
    }

    /// `$remote_addr - - [$time_local] "$request" $status $body_bytes_sent`
    fn common_line(&self) -> String {
        let query = self
            .query
            .as_ref()
            .map(|q| format!("?{q}"))
            .unwrap_or_default();
        format!(
            "{} - - [{}] \"{} {}{} HTTP/{}\" {} {}",
            self.remote_addr,
            self.time.format(CLF_TIME),
            self.method,
            self.path,
            query,
            self.http_version,
            self.status,
            self.body_bytes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_entry() -> AccessLogEntry {
        let mut entry = AccessLogEntry::new(
            "192.168.1.1".to_string(),
            "GET".to_string(),
            "/delay".to_string(),
        );
        entry.query = Some("time=2".to_string());
        entry.status = 200;
        entry.body_bytes = 87;
        entry.referer = Some("https://example.com".to_string());
        entry.user_agent = Some("curl/8.5.0".to_string());
        entry.request_time_us = 2_000_315;
        entry
    }

    #[test]
    fn test_format_name() {
        assert_eq!(AccessLogFormat::from_name("JSON"), AccessLogFormat::Json);
        assert_eq!(AccessLogFormat::from_name("common"), AccessLogFormat::Common);
        assert_eq!(
            AccessLogFormat::from_name("whatever"),
            AccessLogFormat::Combined
        );
    }

    #[test]
    fn test_format_combined() {
        let log = create_test_entry().format(AccessLogFormat::Combined);
        assert!(log.starts_with("192.168.1.1 - - ["));
        assert!(log.contains("\"GET /delay?time=2 HTTP/1.1\" 200 87"));
        assert!(log.ends_with("\"https://example.com\" \"curl/8.5.0\""));
    }

    #[test]
    fn test_format_common() {
        let log = create_test_entry().format(AccessLogFormat::Common);
        assert!(log.contains("\"GET /delay?time=2 HTTP/1.1\" 200 87"));
        // Common format does not include referer/user-agent
        assert!(!log.contains("curl/8.5.0"));
    }

    #[test]
    fn test_format_json() {
        let log = create_test_entry().format(AccessLogFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&log).unwrap();
        assert_eq!(value["remote_addr"], "192.168.1.1");
        assert_eq!(value["query"], "time=2");
        assert_eq!(value["status"], 200);
        assert_eq!(value["request_time_us"], 2_000_315);
        assert!(value["time"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_format_json_escapes() {
        let mut entry = create_test_entry();
        entry.user_agent = Some("evil\"agent\n".to_string());
        let log = entry.format(AccessLogFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&log).unwrap();
        assert_eq!(value["user_agent"], "evil\"agent\n");
    }
}
