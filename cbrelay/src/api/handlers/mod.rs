//! HTTP request handlers.
//!
//! - [`callbacks`]: result delivery from the workflow engine
//! - [`results`]: polling by the original requester
//!
//! Handlers return [`crate::errors::Error`], which renders as a JSON `{"message": ...}` body
//! with the matching status code.

pub mod callbacks;
pub mod results;

use axum::http::{Method, StatusCode};

use crate::errors::Error;

/// Plain `OPTIONS` requests that are not CORS preflights still succeed.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Fallback for known paths hit with an unsupported method.
pub async fn method_not_allowed(method: Method) -> Error {
    Error::MethodNotAllowed {
        method: method.to_string(),
    }
}
