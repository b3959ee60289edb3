//! HTTP protocol layer module
//!
//! Response builders and header sets, decoupled from the endpoints.

pub mod cors;
pub mod response;

pub use cors::CorsHeaders;
pub use response::{
    empty_response, error_response, json_response, method_not_allowed, JSON_CONTENT_TYPE,
};
