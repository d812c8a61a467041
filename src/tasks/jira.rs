//! Jira task entry points: issue create/update/comment and release gates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{browse_url, jira_client, require_non_empty, JiraServerParams};
use crate::error::Result;
use crate::gate::{self, GateResult};

fn field_pairs(fields: &BTreeMap<String, String>) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

// ============================================================================
// jira.create_issue
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIssueParams {
    pub jira_server: JiraServerParams,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub project: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub issue_type: String,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub additional_fields: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIssueOutput {
    pub issue_id: String,
    pub url: String,
}

pub fn create_issue(params: CreateIssueParams) -> Result<CreateIssueOutput> {
    require_non_empty(&[
        ("project", &params.project),
        ("title", &params.title),
        ("issueType", &params.issue_type),
    ])?;

    let client = jira_client(
        &params.jira_server,
        params.username.as_deref(),
        params.password.as_deref(),
    )?;

    let issue_id = client.create_issue(
        &params.project,
        &params.title,
        params.description.as_deref(),
        &params.issue_type,
        params.assignee.as_deref().filter(|a| !a.is_empty()),
        &field_pairs(&params.additional_fields),
    )?;

    log_status!("jira", "Created issue {}", issue_id);
    let url = browse_url(&params.jira_server.url, &issue_id);
    Ok(CreateIssueOutput { issue_id, url })
}

// ============================================================================
// jira.update_issue
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIssueParams {
    pub jira_server: JiraServerParams,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub issue_id: String,
    #[serde(default)]
    pub new_status: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub additional_fields: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIssueOutput {
    pub issue_id: String,
    pub url: String,
}

pub fn update_issue(params: UpdateIssueParams) -> Result<UpdateIssueOutput> {
    require_non_empty(&[("issueId", &params.issue_id)])?;

    let client = jira_client(
        &params.jira_server,
        params.username.as_deref(),
        params.password.as_deref(),
    )?;

    if let Some(status) = params.new_status.as_deref().filter(|s| !s.is_empty()) {
        client.transition_issue(&params.issue_id, status)?;
        log_status!("jira", "Transitioned {} to '{}'", params.issue_id, status);
    }
    if let Some(comment) = params.comment.as_deref().filter(|c| !c.is_empty()) {
        client.add_comment(&params.issue_id, comment)?;
    }

    let assignee = params.assignee.as_deref().filter(|a| !a.is_empty());
    if assignee.is_some() || !params.additional_fields.is_empty() {
        client.update_issue(
            &params.issue_id,
            assignee,
            &field_pairs(&params.additional_fields),
        )?;
    }

    log_status!("jira", "Updated issue {}", params.issue_id);
    let url = browse_url(&params.jira_server.url, &params.issue_id);
    Ok(UpdateIssueOutput {
        issue_id: params.issue_id,
        url,
    })
}

// ============================================================================
// jira.add_comment
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentParams {
    pub jira_server: JiraServerParams,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub comment: String,
    pub issues: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentOutput {
    pub updated: Vec<String>,
}

pub fn add_comment(params: AddCommentParams) -> Result<AddCommentOutput> {
    require_non_empty(&[("comment", &params.comment)])?;

    let client = jira_client(
        &params.jira_server,
        params.username.as_deref(),
        params.password.as_deref(),
    )?;

    let mut updated = Vec::new();
    for issue_id in &params.issues {
        client.add_comment(issue_id, &params.comment)?;
        log_status!("jira", "Commented on {}", issue_id);
        updated.push(issue_id.clone());
    }

    Ok(AddCommentOutput { updated })
}

// ============================================================================
// jira.story_gate / jira.epic_gate
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateParams {
    pub jira_server: JiraServerParams,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Epic id for the story gate, feature id for the epic gate.
    pub issue_id: String,
    pub wait_for_status: String,
}

/// Block-until-done gate over the stories linked to an epic. The host
/// platform reschedules the task while `complete < total`.
pub fn story_gate(params: GateParams) -> Result<GateResult> {
    require_non_empty(&[
        ("issueId", &params.issue_id),
        ("waitForStatus", &params.wait_for_status),
    ])?;

    let client = jira_client(
        &params.jira_server,
        params.username.as_deref(),
        params.password.as_deref(),
    )?;
    let links = client.find_story_links(&params.issue_id)?;
    let result = gate::evaluate(&links, &params.wait_for_status);
    log_status!("gate", "{}", result.status_line());
    Ok(result)
}

/// Block-until-done gate over the epics linked to a feature.
pub fn epic_gate(params: GateParams) -> Result<GateResult> {
    require_non_empty(&[
        ("issueId", &params.issue_id),
        ("waitForStatus", &params.wait_for_status),
    ])?;

    let client = jira_client(
        &params.jira_server,
        params.username.as_deref(),
        params.password.as_deref(),
    )?;
    let links = client.find_epic_links(&params.issue_id)?;
    let result = gate::evaluate(&links, &params.wait_for_status);
    log_status!("gate", "{}", result.status_line());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn create_issue_params_deserialize_from_host_document() {
        let params: CreateIssueParams = serde_json::from_value(json!({
            "jiraServer": {"url": "https://jira.example.com", "username": "svc", "password": "pw"},
            "project": "REL",
            "title": "Cut release 2026.09",
            "issueType": "Task",
            "additionalFields": {"Priority": "High"}
        }))
        .unwrap();
        assert_eq!(params.project, "REL");
        assert_eq!(params.additional_fields["Priority"], "High");
        assert!(params.assignee.is_none());
    }

    #[test]
    fn create_issue_validates_required_params() {
        let params: CreateIssueParams = serde_json::from_value(json!({
            "jiraServer": {"url": "https://jira.example.com"},
            "project": "",
            "title": "x",
            "issueType": ""
        }))
        .unwrap();
        let err = create_issue(params).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationMissingArgument);
        assert_eq!(err.details["args"], json!(["project", "issueType"]));
    }

    #[test]
    fn gate_params_require_status() {
        let params: GateParams = serde_json::from_value(json!({
            "jiraServer": {"url": "https://jira.example.com", "username": "svc", "password": "pw"},
            "issueId": "REL-10",
            "waitForStatus": ""
        }))
        .unwrap();
        let err = story_gate(params).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationMissingArgument);
    }
}
