//! Poll responses returned to the original requester.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::types::ResultEntry;

/// Query string for `GET /result`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ResultQuery {
    /// Correlation id supplied when the computation was requested
    #[serde(rename = "callbackId")]
    pub callback_id: Option<String>,
    /// Snake-case spelling of `callbackId`, used only when `callbackId` is absent
    #[serde(rename = "callback_id")]
    pub callback_id_snake: Option<String>,
}

impl ResultQuery {
    /// The requested id, preferring `callbackId` when both spellings are sent.
    pub fn into_callback_id(self) -> Option<String> {
        self.callback_id.or(self.callback_id_snake)
    }
}

/// Observable state of a correlation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Pending,
    Completed,
}

/// Outcome of a poll.
///
/// An id that was never written and one whose result has expired both read as `pending`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PollResponse {
    pub status: PollStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultEntry>,
}

impl From<Option<ResultEntry>> for PollResponse {
    fn from(entry: Option<ResultEntry>) -> Self {
        let status = if entry.is_some() {
            PollStatus::Completed
        } else {
            PollStatus::Pending
        };
        Self { status, result: entry }
    }
}
