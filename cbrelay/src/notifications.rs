//! Browser notification page for callbacks delivered through an embedded browser context.
//!
//! When the workflow engine's callback is made from a popup or iframe, the response page
//! posts a `callback-received` message to the embedding window so it can stop polling.
//! Nothing here touches the result store.

use axum::http::{HeaderMap, header};
use minijinja::{Environment, context};
use serde_json::json;

use crate::errors::Error;
use crate::types::{CorrelationId, ResultEntry};

const CALLBACK_RECEIVED_TEMPLATE: &str = include_str!("templates/callback_received.html");

/// Message type posted to the embedding window
pub const CALLBACK_RECEIVED_MESSAGE: &str = "callback-received";

/// Whether the `Accept` header ranks HTML above JSON.
///
/// Only explicit `text/html` and `application/json` entries count. The higher quality value
/// wins, and on a tie the type listed first wins.
pub fn prefers_html(headers: &HeaderMap) -> bool {
    let Some(accept) = headers.get(header::ACCEPT).and_then(|value| value.to_str().ok()) else {
        return false;
    };

    let mut html: Option<(f32, usize)> = None;
    let mut json: Option<(f32, usize)> = None;

    for (position, range) in accept.split(',').enumerate() {
        let mut parts = range.split(';').map(str::trim);
        let media_type = parts.next().unwrap_or_default();
        let quality = parts
            .filter_map(|param| param.strip_prefix("q="))
            .find_map(|q| q.parse::<f32>().ok())
            .unwrap_or(1.0);

        let slot = if media_type.eq_ignore_ascii_case("text/html") {
            &mut html
        } else if media_type.eq_ignore_ascii_case("application/json") {
            &mut json
        } else {
            continue;
        };
        if slot.is_none_or(|(best, _)| quality > best) {
            *slot = Some((quality, position));
        }
    }

    match (html, json) {
        (Some((html_q, _)), _) if html_q <= 0.0 => false,
        (Some(_), None) => true,
        (Some((html_q, html_pos)), Some((json_q, json_pos))) => {
            html_q > json_q || (html_q == json_q && html_pos < json_pos)
        }
        (None, _) => false,
    }
}

/// Render the page acknowledging a stored callback.
pub fn render_callback_received(callback_id: &CorrelationId, entry: &ResultEntry) -> Result<String, Error> {
    let mut env = Environment::new();
    env.add_template("callback_received.html", CALLBACK_RECEIVED_TEMPLATE)
        .map_err(|e| Error::Internal {
            operation: format!("load notification template: {e}"),
        })?;

    let message = json!({
        "type": CALLBACK_RECEIVED_MESSAGE,
        "callbackId": callback_id.as_str(),
        "result": entry,
    });

    env.get_template("callback_received.html")
        .and_then(|template| {
            template.render(context! {
                callback_id => callback_id.as_str(),
                message => message,
            })
        })
        .map_err(|e| Error::Internal {
            operation: format!("render notification page: {e}"),
        })
}
