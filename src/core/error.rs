use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ValidationMissingArgument,
    ValidationInvalidArgument,

    SshIdentityFileNotFound,
    SessionConnectFailed,
    SessionClosed,

    RemoteCommandFailed,

    LaneNotEnabled,

    GitTagNotFound,
    GitNoStoryReferences,

    JiraHttpError,
    JiraUnknownField,
    JiraUnsupportedFieldType,
    JiraFieldValidation,
    JiraTransitionNotFound,
    JiraProjectNotFound,
    JiraIssueTypeNotFound,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::SshIdentityFileNotFound => "ssh.identity_file_not_found",
            ErrorCode::SessionConnectFailed => "session.connect_failed",
            ErrorCode::SessionClosed => "session.closed",

            ErrorCode::RemoteCommandFailed => "remote.command_failed",

            ErrorCode::LaneNotEnabled => "lane.not_enabled",

            ErrorCode::GitTagNotFound => "git.tag_not_found",
            ErrorCode::GitNoStoryReferences => "git.no_story_references",

            ErrorCode::JiraHttpError => "jira.http_error",
            ErrorCode::JiraUnknownField => "jira.unknown_field",
            ErrorCode::JiraUnsupportedFieldType => "jira.unsupported_field_type",
            ErrorCode::JiraFieldValidation => "jira.field_validation",
            ErrorCode::JiraTransitionNotFound => "jira.transition_not_found",
            ErrorCode::JiraProjectNotFound => "jira.project_not_found",
            ErrorCode::JiraIssueTypeNotFound => "jira.issue_type_not_found",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgumentDetails {
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SshIdentityFileNotFoundDetails {
    pub address: String,
    pub identity_file: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectFailedDetails {
    pub target: String,
    pub exit_code: i32,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValidationDetails {
    pub field: String,
    pub given: String,
    pub allowed_values: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpErrorDetails {
    pub status: u16,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    fn with_details<T: Serialize>(code: ErrorCode, message: impl Into<String>, details: T) -> Self {
        let details =
            serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(code, message, details)
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        Self::with_details(
            ErrorCode::ValidationMissingArgument,
            "Missing required task parameter",
            MissingArgumentDetails { args },
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
    ) -> Self {
        Self::with_details(
            ErrorCode::ValidationInvalidArgument,
            "Invalid task parameter",
            InvalidArgumentDetails {
                field: field.into(),
                problem: problem.into(),
            },
        )
    }

    pub fn ssh_identity_file_not_found(
        address: impl Into<String>,
        identity_file: impl Into<String>,
    ) -> Self {
        Self::with_details(
            ErrorCode::SshIdentityFileNotFound,
            "SSH identity file not found",
            SshIdentityFileNotFoundDetails {
                address: address.into(),
                identity_file: identity_file.into(),
            },
        )
    }

    pub fn session_connect_failed(
        target: impl Into<String>,
        exit_code: i32,
        stderr: impl Into<String>,
    ) -> Self {
        Self::with_details(
            ErrorCode::SessionConnectFailed,
            "Could not establish connection to host",
            ConnectFailedDetails {
                target: target.into(),
                exit_code,
                stderr: stderr.into(),
            },
        )
    }

    pub fn session_closed() -> Self {
        Self::new(
            ErrorCode::SessionClosed,
            "Session is closed and cannot execute further commands",
            Value::Object(serde_json::Map::new()),
        )
    }

    pub fn remote_command_failed(details: RemoteCommandFailedDetails) -> Self {
        Self::with_details(
            ErrorCode::RemoteCommandFailed,
            "Remote command failed",
            details,
        )
    }

    pub fn lane_not_enabled(git_dir: impl Into<String>) -> Self {
        let git_dir = git_dir.into();
        Self::new(
            ErrorCode::LaneNotEnabled,
            format!("Fastlane is not enabled for '{}'", git_dir),
            serde_json::json!({ "gitDir": git_dir }),
        )
        .with_hint("Run 'fastlane init' in the repository first")
    }

    pub fn git_tag_not_found(prefix: impl Into<String>, known_tags: Vec<String>) -> Self {
        let prefix = prefix.into();
        Self::new(
            ErrorCode::GitTagNotFound,
            format!("No tags found matching prefix '{}'", prefix),
            serde_json::json!({ "prefix": prefix, "knownTags": known_tags }),
        )
    }

    pub fn git_no_story_references(pattern: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::GitNoStoryReferences,
            "No story references found in commit messages",
            serde_json::json!({ "pattern": pattern.into() }),
        )
    }

    pub fn jira_http(status: u16, endpoint: impl Into<String>, body: Option<Value>) -> Self {
        let retryable = status >= 500;
        let mut err = Self::with_details(
            ErrorCode::JiraHttpError,
            format!("Jira request failed with status {}", status),
            HttpErrorDetails {
                status,
                endpoint: endpoint.into(),
                body,
            },
        );
        err.retryable = Some(retryable);
        err
    }

    pub fn jira_unknown_field(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(
            ErrorCode::JiraUnknownField,
            format!("Jira does not recognise field '{}'", name),
            serde_json::json!({ "field": name }),
        )
    }

    pub fn jira_unsupported_field_type(
        field: impl Into<String>,
        schema_type: impl Into<String>,
    ) -> Self {
        let field = field.into();
        let schema_type = schema_type.into();
        Self::new(
            ErrorCode::JiraUnsupportedFieldType,
            format!("Field '{}' has unsupported type '{}'", field, schema_type),
            serde_json::json!({ "field": field, "schemaType": schema_type }),
        )
    }

    pub fn jira_field_validation(
        field: impl Into<String>,
        given: impl Into<String>,
        allowed_values: Vec<String>,
    ) -> Self {
        let field = field.into();
        let given = given.into();
        let message = format!(
            "Field '{}' only supports values of {:?}. Given '{}'",
            field, allowed_values, given
        );
        Self::with_details(
            ErrorCode::JiraFieldValidation,
            message,
            FieldValidationDetails {
                field,
                given,
                allowed_values,
            },
        )
    }

    pub fn jira_transition_not_found(
        issue_id: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        let issue_id = issue_id.into();
        let status = status.into();
        Self::new(
            ErrorCode::JiraTransitionNotFound,
            format!("Unable to find status '{}' for issue {}", status, issue_id),
            serde_json::json!({ "issueId": issue_id, "status": status }),
        )
    }

    pub fn jira_project_not_found(project: impl Into<String>) -> Self {
        let project = project.into();
        Self::new(
            ErrorCode::JiraProjectNotFound,
            format!("Project '{}' not found", project),
            serde_json::json!({ "project": project }),
        )
    }

    pub fn jira_issue_type_not_found(
        issue_type: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        let issue_type = issue_type.into();
        let project = project.into();
        Self::new(
            ErrorCode::JiraIssueTypeNotFound,
            format!(
                "Issue type '{}' not found in project '{}'",
                issue_type, project
            ),
            serde_json::json!({ "issueType": issue_type, "project": project }),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalIoError,
            "IO error",
            serde_json::json!({ "error": error.into(), "context": context }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            serde_json::json!({ "error": error.into(), "context": context }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}
