//! `POST /date`: today's date plus the instant it was read

use chrono::{DateTime, Local};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::http;

#[derive(Debug, Serialize)]
pub struct DateResponse {
    /// `YYYY-MM-DD`, always the calendar date of `timestamp`
    pub date: String,
    pub timestamp: DateTime<Local>,
}

impl DateResponse {
    pub fn at(now: DateTime<Local>) -> Self {
        Self {
            date: now.format("%Y-%m-%d").to_string(),
            timestamp: now,
        }
    }
}

/// The request body is irrelevant here and is left for hyper to discard.
pub fn handle() -> Response<Full<Bytes>> {
    http::json_response(StatusCode::OK, &DateResponse::at(Local::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_date_matches_timestamp() {
        let now = Local.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        let resp = DateResponse::at(now);
        assert_eq!(resp.date, "2024-02-29");
        assert_eq!(resp.timestamp, now);
    }

    #[test]
    fn test_serialized_shape() {
        let now = Local.with_ymd_and_hms(2025, 1, 5, 8, 0, 0).unwrap();
        let value = serde_json::to_value(DateResponse::at(now)).unwrap();
        assert_eq!(value["date"], "2025-01-05");
        assert!(value["timestamp"].as_str().unwrap().starts_with("2025-01-05T08:00:00"));
    }
}
