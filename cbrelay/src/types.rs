//! Domain types shared by the callback receiver, the poller and the result store.
//!
//! - [`CorrelationId`]: opaque caller-supplied token linking a callback to later polls
//! - [`ResultStatus`]: outcome reported by the workflow engine
//! - [`ResultEntry`]: the stored result for one correlation id

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::errors::Error;

/// Caller-generated token identifying one asynchronous computation.
///
/// Uniqueness is the caller's responsibility. The only requirement is that the id is not
/// empty once surrounding whitespace is removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::BadRequest {
                message: "callbackId must not be empty".to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of the upstream computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    #[default]
    Success,
    Error,
}

impl ResultStatus {
    /// Resolve a raw status value. Missing or unrecognised values fall back to `Success`.
    pub fn resolve(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("error") => ResultStatus::Error,
            _ => ResultStatus::Success,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Success => "success",
            ResultStatus::Error => "error",
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A result posted by the workflow engine, as held in the store and returned to pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub status: ResultStatus,
    /// Canonical estimate value, required when `status` is `success`
    pub total_estimate: Option<f64>,
    pub message: Option<String>,
    pub written_at: DateTime<Utc>,
}

impl ResultEntry {
    /// Build an entry stamped with the current time.
    ///
    /// A successful result must carry a finite estimate.
    pub fn new(status: ResultStatus, total_estimate: Option<f64>, message: Option<String>) -> Result<Self, Error> {
        if let Some(value) = total_estimate
            && !value.is_finite()
        {
            return Err(Error::BadRequest {
                message: "totalEstimate must be a finite number".to_string(),
            });
        }

        if status == ResultStatus::Success && total_estimate.is_none() {
            return Err(Error::BadRequest {
                message: "A numeric totalEstimate is required when status is success".to_string(),
            });
        }

        Ok(Self {
            status,
            total_estimate,
            message,
            written_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_id_trims_and_rejects_empty() {
        assert_eq!(CorrelationId::parse("  abc-123 ").unwrap().as_str(), "abc-123");
        assert!(matches!(CorrelationId::parse(""), Err(Error::BadRequest { .. })));
        assert!(matches!(CorrelationId::parse("   "), Err(Error::BadRequest { .. })));
    }

    #[test]
    fn test_status_defaults_to_success() {
        assert_eq!(ResultStatus::resolve(None), ResultStatus::Success);
        assert_eq!(ResultStatus::resolve(Some("bogus")), ResultStatus::Success);
        assert_eq!(ResultStatus::resolve(Some("success")), ResultStatus::Success);
        assert_eq!(ResultStatus::resolve(Some(" ERROR ")), ResultStatus::Error);
    }

    #[test]
    fn test_success_requires_estimate() {
        let err = ResultEntry::new(ResultStatus::Success, None, None).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        let entry = ResultEntry::new(ResultStatus::Success, Some(1500.0), None).unwrap();
        assert_eq!(entry.total_estimate, Some(1500.0));
    }

    #[test]
    fn test_error_entry_without_estimate() {
        let entry = ResultEntry::new(ResultStatus::Error, None, Some("workflow failed".to_string())).unwrap();
        assert_eq!(entry.status, ResultStatus::Error);
        assert_eq!(entry.message.as_deref(), Some("workflow failed"));
    }

    #[test]
    fn test_non_finite_estimate_rejected() {
        assert!(ResultEntry::new(ResultStatus::Success, Some(f64::NAN), None).is_err());
        assert!(ResultEntry::new(ResultStatus::Error, Some(f64::INFINITY), None).is_err());
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = ResultEntry::new(ResultStatus::Success, Some(2200.0), None).unwrap();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["totalEstimate"], 2200.0);
        assert!(json.get("writtenAt").is_some());
    }
}
