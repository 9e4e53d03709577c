//! Callback payloads posted by the workflow engine.
//!
//! The upstream provider is inconsistent about field naming, so the body is read as a raw
//! JSON object and normalised here rather than through a fixed serde struct.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::errors::{Error, Result};
use crate::types::{CorrelationId, ResultEntry, ResultStatus};

/// Keys that may carry the correlation id, highest priority first.
pub const CALLBACK_ID_FIELDS: &[&str] = &["callbackId", "callback_id"];

/// Keys that may carry the numeric estimate, highest priority first.
pub const ESTIMATE_FIELDS: &[&str] = &[
    "totalEstimate",
    "total_estimate",
    "Total Estimate $",
    "Total Estimate",
    "totalCost",
    "estimate",
];

/// Callback body as documented for producers.
///
/// Any key from [`ESTIMATE_FIELDS`] is accepted in place of `totalEstimate`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallbackRequest {
    /// Correlation id chosen by the original requester
    pub callback_id: String,
    /// `success` (default) or `error`
    #[serde(default)]
    pub status: Option<ResultStatus>,
    /// Estimate value, required when status is `success`
    #[serde(default)]
    pub total_estimate: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Acknowledgement returned once a callback is stored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallbackAck {
    pub success: bool,
    pub callback_id: String,
    pub status: ResultStatus,
}

/// A callback body reduced to its correlation id and canonical result.
#[derive(Debug, Clone)]
pub struct NormalizedCallback {
    pub callback_id: CorrelationId,
    pub entry: ResultEntry,
}

impl NormalizedCallback {
    pub fn from_json(body: Value) -> Result<Self> {
        let Value::Object(fields) = body else {
            return Err(Error::BadRequest {
                message: "Callback body must be a JSON object".to_string(),
            });
        };

        let callback_id = match first_present(&fields, CALLBACK_ID_FIELDS) {
            Some((_, Value::String(raw))) => CorrelationId::parse(raw)?,
            Some((field, _)) => {
                return Err(Error::BadRequest {
                    message: format!("{field} must be a string"),
                });
            }
            None => {
                return Err(Error::BadRequest {
                    message: "callbackId is required".to_string(),
                });
            }
        };

        let status = ResultStatus::resolve(fields.get("status").and_then(Value::as_str));

        let total_estimate = match first_present(&fields, ESTIMATE_FIELDS) {
            None => None,
            Some((field, value)) => match parse_number(value) {
                Some(number) => Some(number),
                None if status == ResultStatus::Success => {
                    return Err(Error::BadRequest {
                        message: format!("{field} must be a number"),
                    });
                }
                // Error results carry no usable estimate
                None => None,
            },
        };

        let message = match fields.get("message") {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(_) => {
                return Err(Error::BadRequest {
                    message: "message must be a string".to_string(),
                });
            }
        };

        let entry = ResultEntry::new(status, total_estimate, message)?;
        Ok(Self { callback_id, entry })
    }

    pub fn ack(&self) -> CallbackAck {
        CallbackAck {
            success: true,
            callback_id: self.callback_id.to_string(),
            status: self.entry.status,
        }
    }
}

/// First candidate key holding a non-null value.
fn first_present<'a>(fields: &'a Map<String, Value>, candidates: &[&'static str]) -> Option<(&'static str, &'a Value)> {
    candidates
        .iter()
        .find_map(|&key| fields.get(key).filter(|value| !value.is_null()).map(|value| (key, value)))
}

/// Numbers pass through; strings such as `"$2,200.50"` are accepted too.
fn parse_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .chars()
            .filter(|c| !matches!(c, '$' | ','))
            .collect::<String>()
            .trim()
            .parse::<f64>()
            .ok(),
        _ => None,
    }?;

    number.is_finite().then_some(number)
}
