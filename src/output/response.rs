//! Task response formatting and output.
//!
//! Provides JSON envelope, printing, and exit code mapping.

use serde::Serialize;
use stagehand::error::Hint;
use stagehand::{Error, ErrorCode, Result};

#[derive(Debug, Serialize)]
pub struct TaskResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

#[derive(Debug, Serialize)]
pub struct TaskError {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<Hint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl<T: Serialize> TaskResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize response".to_string()))
        })
    }
}

impl TaskResponse<()> {
    pub fn from_error(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(TaskError {
                code: err.code.as_str().to_string(),
                message: err.message.clone(),
                details: err.details.clone(),
                hints: if err.hints.is_empty() {
                    None
                } else {
                    Some(err.hints.clone())
                },
                retryable: err.retryable,
            }),
        }
    }
}

fn print_response<T: Serialize>(response: &TaskResponse<T>) -> Result<()> {
    use std::io::{self, Write};

    let payload = response.to_json()?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", payload) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            return Ok(()); // Exit gracefully on SIGPIPE
        }
        return Err(Error::internal_io(
            e.to_string(),
            Some("write stdout".to_string()),
        ));
    }
    Ok(())
}

/// Print the envelope for a task result and return the process exit code.
pub fn print_json_result(result: Result<serde_json::Value>) -> (Result<()>, i32) {
    match result {
        Ok(data) => (print_response(&TaskResponse::success(data)), 0),
        Err(err) => {
            let exit_code = exit_code_for_error(err.code);
            (print_response(&TaskResponse::<()>::from_error(&err)), exit_code)
        }
    }
}

fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ValidationMissingArgument | ErrorCode::ValidationInvalidArgument => 2,

        ErrorCode::JiraUnknownField
        | ErrorCode::JiraTransitionNotFound
        | ErrorCode::JiraProjectNotFound
        | ErrorCode::JiraIssueTypeNotFound
        | ErrorCode::GitTagNotFound => 4,

        ErrorCode::SshIdentityFileNotFound
        | ErrorCode::SessionConnectFailed
        | ErrorCode::SessionClosed => 10,

        ErrorCode::RemoteCommandFailed
        | ErrorCode::LaneNotEnabled
        | ErrorCode::GitNoStoryReferences
        | ErrorCode::JiraHttpError
        | ErrorCode::JiraUnsupportedFieldType
        | ErrorCode::JiraFieldValidation => 20,

        ErrorCode::InternalIoError
        | ErrorCode::InternalJsonError
        | ErrorCode::InternalUnexpected => 1,
    }
}
