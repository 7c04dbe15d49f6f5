use serde_json::Value;
use std::fmt;

use crate::resource::Document;

/// Processing status codes reported in a resource's `status.code` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Waiting,
    Queued,
    Started,
    InProgress,
    Summarized,
    Finished,
    Uploading,
    Faulty,
    Unknown,
    Runnable,
}

impl StatusCode {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => StatusCode::Waiting,
            1 => StatusCode::Queued,
            2 => StatusCode::Started,
            3 => StatusCode::InProgress,
            4 => StatusCode::Summarized,
            5 => StatusCode::Finished,
            6 => StatusCode::Uploading,
            -1 => StatusCode::Faulty,
            -2 => StatusCode::Unknown,
            -3 => StatusCode::Runnable,
            _ => return None,
        })
    }

    pub fn code(self) -> i64 {
        match self {
            StatusCode::Waiting => 0,
            StatusCode::Queued => 1,
            StatusCode::Started => 2,
            StatusCode::InProgress => 3,
            StatusCode::Summarized => 4,
            StatusCode::Finished => 5,
            StatusCode::Uploading => 6,
            StatusCode::Faulty => -1,
            StatusCode::Unknown => -2,
            StatusCode::Runnable => -3,
        }
    }

    /// Codes after which the server will do no further work on the resource.
    pub fn is_failure(self) -> bool {
        matches!(self, StatusCode::Faulty | StatusCode::Unknown)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::Waiting => "waiting",
            StatusCode::Queued => "queued",
            StatusCode::Started => "started",
            StatusCode::InProgress => "in progress",
            StatusCode::Summarized => "summarized",
            StatusCode::Finished => "finished",
            StatusCode::Uploading => "uploading",
            StatusCode::Faulty => "faulty",
            StatusCode::Unknown => "unknown",
            StatusCode::Runnable => "runnable",
        };
        write!(f, "{} ({})", name, self.code())
    }
}

/// Readiness of a resource as read from one fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Still being processed. `None` when the document carries no recognised code.
    Pending(Option<StatusCode>),
    /// Processing ended in error; waiting longer will not help.
    Failed {
        code: StatusCode,
        message: Option<String>,
    },
}

fn status(document: &Document) -> Option<&Value> {
    document
        .get("status")
        .or_else(|| document.get("object").and_then(|o| o.get("status")))
}

pub fn status_code(document: &Document) -> Option<StatusCode> {
    status(document)
        .and_then(|s| s.get("code"))
        .and_then(Value::as_i64)
        .and_then(StatusCode::from_code)
}

pub fn verdict(document: &Document) -> Readiness {
    match status_code(document) {
        Some(StatusCode::Finished) => Readiness::Ready,
        Some(code) if code.is_failure() => Readiness::Failed {
            code,
            message: status(document)
                .and_then(|s| s.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string),
        },
        other => Readiness::Pending(other),
    }
}

/// True only for the terminal FINISHED code.
pub fn is_finished(document: &Document) -> bool {
    verdict(document) == Readiness::Ready
}
