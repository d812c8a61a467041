//! Task entry points invoked by the orchestration host.
//!
//! Each task takes a typed parameter struct (deserialized from the host's
//! JSON parameter document, camelCase names matching the host variables),
//! validates it at entry, and returns a serializable set of output variables.

pub mod fastlane;
pub mod git;
pub mod jira;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::host::{ConnectionOptions, SshOptions};
use crate::jira::JiraClient;

/// Remote host configuration shared by the git and fastlane tasks.
/// Absent means local execution.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientHostParams {
    pub address: String,
    pub username: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub private_key_file: Option<String>,
}

pub(crate) fn connection_options(host: Option<&ClientHostParams>) -> ConnectionOptions {
    match host {
        None => {
            log_status!("session", "No client host configured, using local execution");
            ConnectionOptions::Local
        }
        Some(host) => {
            let mut opts = SshOptions::new(host.address.clone(), host.username.clone());
            if let Some(port) = host.port {
                opts.port = port;
            }
            opts.identity_file = host.private_key_file.clone();
            ConnectionOptions::Ssh(opts)
        }
    }
}

/// Issue tracker server configuration as supplied by the host platform.
/// Task-level credentials, when present, override the server's own.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraServerParams {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

pub(crate) fn jira_client(
    server: &JiraServerParams,
    task_username: Option<&str>,
    task_password: Option<&str>,
) -> Result<JiraClient> {
    let (username, password) = match task_username.filter(|u| !u.is_empty()) {
        Some(username) => (username.to_string(), task_password.unwrap_or("").to_string()),
        None => (
            server.username.clone().unwrap_or_default(),
            server.password.clone().unwrap_or_default(),
        ),
    };

    if server.url.trim().is_empty() {
        return Err(Error::validation_missing_argument(vec![
            "jiraServer.url".to_string()
        ]));
    }
    if username.is_empty() {
        return Err(Error::validation_missing_argument(vec![
            "username".to_string()
        ]));
    }

    JiraClient::new(server.url.clone(), username, password)
}

pub(crate) fn browse_url(server_url: &str, issue_id: &str) -> String {
    format!("{}/browse/{}", server_url.trim_end_matches('/'), issue_id)
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T> {
    serde_json::from_value(params)
        .map_err(|e| Error::validation_invalid_argument("params", e.to_string()))
}

/// Collect the names of required parameters that are empty and fail with one
/// `validation.missing_argument` listing all of them.
pub(crate) fn require_non_empty(pairs: &[(&str, &str)]) -> Result<()> {
    let missing: Vec<String> = pairs
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::validation_missing_argument(missing))
    }
}

/// Run a task by its dotted name against a JSON parameter document, returning
/// the task's output variables as JSON.
pub fn run_task(name: &str, params: Value) -> Result<Value> {
    fn output<T: serde::Serialize>(value: T) -> Result<Value> {
        serde_json::to_value(value)
            .map_err(|e| Error::internal_json(e.to_string(), Some("serialize task output".to_string())))
    }

    match name {
        "jira.create_issue" => output(jira::create_issue(parse_params(params)?)?),
        "jira.update_issue" => output(jira::update_issue(parse_params(params)?)?),
        "jira.add_comment" => output(jira::add_comment(parse_params(params)?)?),
        "jira.story_gate" => output(jira::story_gate(parse_params(params)?)?),
        "jira.epic_gate" => output(jira::epic_gate(parse_params(params)?)?),
        "git.tag_commit" => output(git::tag_commit(parse_params(params)?)?),
        "git.collect_stories" => output(git::collect_stories(parse_params(params)?)?),
        "fastlane.run_lane" => output(fastlane::run_lane(parse_params(params)?)?),
        other => Err(
            Error::validation_invalid_argument("task", format!("Unknown task '{}'", other))
                .with_hint(format!("Available tasks: {}", TASK_NAMES.join(", "))),
        ),
    }
}

pub const TASK_NAMES: [&str; 8] = [
    "jira.create_issue",
    "jira.update_issue",
    "jira.add_comment",
    "jira.story_gate",
    "jira.epic_gate",
    "git.tag_commit",
    "git.collect_stories",
    "fastlane.run_lane",
];
