//! CORS header set, validated once at startup

use hyper::header::{
    HeaderMap, HeaderValue, InvalidHeaderValue, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
};

use crate::config::CorsConfig;

#[derive(Debug, Clone)]
pub struct CorsHeaders {
    allow_origin: HeaderValue,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    max_age: HeaderValue,
}

impl CorsHeaders {
    pub fn from_config(config: &CorsConfig) -> Result<Self, InvalidHeaderValue> {
        Ok(Self {
            allow_origin: HeaderValue::from_str(&config.allow_origin)?,
            allow_methods: HeaderValue::from_str(&config.allow_methods)?,
            allow_headers: HeaderValue::from_str(&config.allow_headers)?,
            max_age: HeaderValue::from(config.max_age),
        })
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        headers.insert(ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
    }
}
