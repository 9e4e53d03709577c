//! HTTP surface of the relay.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # Endpoints
//!
//! - `POST /callback`: the workflow engine delivers a result
//! - `GET /result?callbackId=...` and `GET /status/{callbackId}`: the requester polls for it
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`; the document is
//! served at `/api-docs/openapi.json` and rendered at `/docs`.

pub mod handlers;
pub mod models;
