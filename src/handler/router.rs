//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: preflight short-circuit, path/method
//! match under a per-request deadline, and the headers every response carries.

use std::net::SocketAddr;
use std::time::Duration;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, InvalidHeaderValue, CONTENT_TYPE, REFERER, SERVER, USER_AGENT};
use hyper::{Method, Request, Response, StatusCode, Version};
use tokio::time::Instant;

use super::error::RequestError;
use super::{date, delay, health};
use crate::config::Config;
use crate::http::{self, CorsHeaders};
use crate::logger::{self, AccessLogEntry, AccessLogFormat};

const DATE_ALLOW: &str = "POST, OPTIONS";
const DELAY_ALLOW: &str = "GET, POST, OPTIONS";

/// Known paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Health,
    Date,
    Delay,
}

impl Endpoint {
    fn from_path(path: &str) -> Option<Self> {
        match path {
            "/" => Some(Self::Health),
            "/date" => Some(Self::Date),
            "/delay" => Some(Self::Delay),
            _ => None,
        }
    }
}

/// Routes requests to the health, date and delay operations.
///
/// Built once from configuration at startup and shared behind an `Arc`.
#[derive(Debug)]
pub struct Dispatcher {
    max_delay: u64,
    max_body_size: u64,
    /// Bound on one request, longest valid delay included
    request_timeout: Duration,
    cors: CorsHeaders,
    server_name: HeaderValue,
    access_log: Option<AccessLogFormat>,
}

impl Dispatcher {
    pub fn new(config: &Config) -> Result<Self, InvalidHeaderValue> {
        Ok(Self {
            max_delay: config.delay.max_seconds(),
            max_body_size: config.http.max_body_size,
            request_timeout: config.request_timeout(),
            cors: CorsHeaders::from_config(&config.cors)?,
            server_name: HeaderValue::from_str(&config.http.server_name)?,
            access_log: config
                .logging
                .access_log
                .then(|| AccessLogFormat::from_name(&config.logging.access_log_format)),
        })
    }

    /// Serve one request from `peer` and write its access log line
    pub async fn handle<B>(&self, req: Request<B>, peer: SocketAddr) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let Some(format) = self.access_log else {
            return self.dispatch(req).await;
        };

        let started = Instant::now();
        let mut entry = AccessLogEntry::new(
            peer.ip().to_string(),
            req.method().to_string(),
            req.uri().path().to_string(),
        );
        entry.query = req.uri().query().map(ToString::to_string);
        entry.http_version = version_label(req.version()).to_string();
        entry.referer = header_string(&req, REFERER.as_str());
        entry.user_agent = header_string(&req, USER_AGENT.as_str());

        let resp = self.dispatch(req).await;

        entry.status = resp.status().as_u16();
        entry.body_bytes = resp
            .body()
            .size_hint()
            .exact()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, format);

        resp
    }

    /// Produce the response for `req`, with CORS and common headers attached
    pub async fn dispatch<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let mut resp = if req.method() == Method::OPTIONS {
            http::empty_response(StatusCode::NO_CONTENT)
        } else {
            self.route_within_deadline(req)
                .await
                .unwrap_or_else(RequestError::into_response)
        };

        let headers = resp.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(http::JSON_CONTENT_TYPE));
        headers.insert(SERVER, self.server_name.clone());
        self.cors.apply(headers);
        resp
    }

    async fn route_within_deadline<B>(
        &self,
        req: Request<B>,
    ) -> Result<Response<Full<Bytes>>, RequestError>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let path = req.uri().path().to_string();
        match tokio::time::timeout(self.request_timeout, self.route(req)).await {
            Ok(result) => result,
            Err(_) => {
                logger::log_warning(&format!(
                    "Request for {path} timed out after {} seconds",
                    self.request_timeout.as_secs()
                ));
                Err(RequestError::Timeout)
            }
        }
    }

    async fn route<B>(&self, req: Request<B>) -> Result<Response<Full<Bytes>>, RequestError>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let endpoint = Endpoint::from_path(req.uri().path()).ok_or(RequestError::NotFound)?;
        let method = req.method().clone();

        match (endpoint, method) {
            (Endpoint::Health, Method::GET | Method::HEAD) => Ok(health::handle()),
            (Endpoint::Health, _) => Err(RequestError::NotFound),

            (Endpoint::Date, Method::POST) => Ok(date::handle()),
            (Endpoint::Date, _) => Err(RequestError::MethodNotAllowed { allow: DATE_ALLOW }),

            (Endpoint::Delay, Method::GET) => {
                let time = delay::time_from_query(req.uri().query())?;
                self.delay(time).await
            }
            (Endpoint::Delay, Method::POST) => {
                check_body_size(&req, self.max_body_size)?;
                let body = read_body(req.into_body(), self.max_body_size).await?;
                let time = delay::time_from_json(&body)?;
                self.delay(time).await
            }
            (Endpoint::Delay, _) => Err(RequestError::MethodNotAllowed { allow: DELAY_ALLOW }),
        }
    }

    async fn delay(&self, time: i64) -> Result<Response<Full<Bytes>>, RequestError> {
        let secs = delay::validate(time, self.max_delay)?;
        logger::log_debug(&format!("Delaying request for {secs}s"));
        let body = delay::run(secs).await;
        Ok(http::json_response(StatusCode::OK, &body))
    }
}

/// Reject early when Content-Length already exceeds the limit
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Result<(), RequestError> {
    let Some(content_length) = req.headers().get(hyper::header::CONTENT_LENGTH) else {
        return Ok(());
    };
    match content_length.to_str().ok().and_then(|s| s.parse::<u64>().ok()) {
        Some(size) if size > max_body_size => {
            logger::log_warning(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            Err(RequestError::BodyTooLarge)
        }
        Some(_) => Ok(()),
        None => {
            logger::log_warning("Invalid Content-Length header, skipping size check");
            Ok(())
        }
    }
}

async fn read_body<B>(body: B, limit: u64) -> Result<Bytes, RequestError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(RequestError::BodyTooLarge),
        Err(e) => {
            logger::log_warning(&format!("Failed to read request body: {e}"));
            Err(RequestError::InvalidBody)
        }
    }
}

fn header_string<B>(req: &Request<B>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

const fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
