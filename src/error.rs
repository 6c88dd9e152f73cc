//! Error types shared by the resolver, the history pager and the service client.

use crate::model::ParameterStyle;
use thiserror::Error;

/// A submission that must not be sent; nothing was sent to the service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("the 'triggered_by' parameter is required and must contain an email address")]
    MissingTriggeredBy,

    #[error("'triggered_by' must be a valid email address, got '{value}'")]
    InvalidEmailShape { value: String },

    #[error("{style} expects {expected} input")]
    ShapeMismatch {
        style: ParameterStyle,
        expected: &'static str,
    },

    #[error("{style} is not accepted by any task of this job")]
    UnsupportedStyle { style: ParameterStyle },

    #[error("task subset was given but is empty")]
    EmptyTaskSubset,

    #[error("job has no task with key '{key}'")]
    UnknownTaskKey { key: String },
}

/// Failure talking to the workflow service.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{error_code} (HTTP {status}): {message}")]
    Api {
        status: u16,
        error_code: String,
        message: String,
    },

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// A listing or run-history fetch failed; the caller keeps what it had.
#[derive(Debug, Error)]
#[error("error fetching {what}: {source}")]
pub struct FetchError {
    pub what: String,
    #[source]
    pub source: ClientError,
}

impl FetchError {
    pub fn runs(job_id: i64, source: ClientError) -> Self {
        Self {
            what: format!("runs of job {job_id}"),
            source,
        }
    }

    pub fn jobs(source: ClientError) -> Self {
        Self {
            what: "jobs".into(),
            source,
        }
    }

    pub fn job(job_id: i64, source: ClientError) -> Self {
        Self {
            what: format!("job {job_id}"),
            source,
        }
    }
}

/// run-now was rejected or could not be delivered. Never retried.
#[derive(Debug, Error)]
#[error("error triggering job {job_id}: {source}")]
pub struct SubmissionError {
    pub job_id: i64,
    #[source]
    pub source: ClientError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_error_keeps_remote_message() {
        let err = SubmissionError {
            job_id: 12,
            source: ClientError::Api {
                status: 403,
                error_code: "PERMISSION_DENIED".into(),
                message: "User does not have Manage Run permissions".into(),
            },
        };
        let text = err.to_string();
        assert!(text.contains("job 12"));
        assert!(text.contains("PERMISSION_DENIED (HTTP 403): User does not have Manage Run permissions"));
    }

    #[test]
    fn validation_error_names_the_style() {
        let err = ValidationError::ShapeMismatch {
            style: ParameterStyle::DbtCommands,
            expected: "list",
        };
        assert_eq!(err.to_string(), "dbt_commands expects list input");
    }
}
