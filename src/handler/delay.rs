//! `/delay`: validate a requested duration, sleep, report the measured time
//!
//! The duration arrives either as the `time` query parameter (GET) or as the
//! `time` field of a JSON body (POST). Validation always completes before the
//! sleep starts, so a rejected request returns immediately.

use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

use super::error::RequestError;

pub const DELAY_MESSAGE: &str = "Delay completed!";

#[derive(Debug, Serialize)]
pub struct DelayResponse {
    pub message: &'static str,
    /// Measured seconds slept, rounded to the nearest second
    pub delay_time: u64,
    pub timestamp: DateTime<Local>,
}

/// Extract `time` from a raw query string, percent-decoding the value
pub fn time_from_query(query: Option<&str>) -> Result<i64, RequestError> {
    let raw = query.and_then(|q| {
        form_urlencoded::parse(q.as_bytes())
            .find(|(key, _)| key == "time")
            .map(|(_, value)| value)
    });

    match raw.as_deref() {
        None | Some("") => Err(RequestError::MissingTime),
        Some(value) => parse_seconds(value),
    }
}

/// Extract `time` from a JSON body; accepts an integer or a numeric string
pub fn time_from_json(body: &[u8]) -> Result<i64, RequestError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(RequestError::MissingTime);
    }

    let value: Value = serde_json::from_slice(body).map_err(|_| RequestError::InvalidBody)?;
    let Value::Object(fields) = value else {
        return Err(RequestError::InvalidBody);
    };

    match fields.get("time") {
        None | Some(Value::Null) => Err(RequestError::MissingTime),
        Some(Value::Number(n)) => n.as_i64().ok_or(RequestError::InvalidTime),
        Some(Value::String(s)) if s.is_empty() => Err(RequestError::MissingTime),
        Some(Value::String(s)) => parse_seconds(s),
        Some(_) => Err(RequestError::InvalidTime),
    }
}

fn parse_seconds(value: &str) -> Result<i64, RequestError> {
    value.parse().map_err(|_| RequestError::InvalidTime)
}

/// Check `0 <= time <= max`
pub fn validate(time: i64, max: u64) -> Result<u64, RequestError> {
    u64::try_from(time)
        .ok()
        .filter(|secs| *secs <= max)
        .ok_or(RequestError::OutOfRange { max })
}

/// Suspend this request for `secs` seconds, then describe what happened
pub async fn run(secs: u64) -> DelayResponse {
    let started = Instant::now();
    tokio::time::sleep(Duration::from_secs(secs)).await;

    DelayResponse {
        message: DELAY_MESSAGE,
        delay_time: rounded_secs(started.elapsed()),
        timestamp: Local::now(),
    }
}

const fn rounded_secs(elapsed: Duration) -> u64 {
    if elapsed.subsec_millis() >= 500 {
        elapsed.as_secs() + 1
    } else {
        elapsed.as_secs()
    }
}
