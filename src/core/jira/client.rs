use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::jira::fields::{resolve_and_set, FieldDescriptor};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const HTTP_TIMEOUT_SECS: u64 = 30;

/// Retry behavior for search requests. Only server-side (5xx) failures are
/// retried; client errors propagate immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff: base, 2x, 4x, ...
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Cooperative cancellation for retry loops. Cloneable; another thread can
/// hold a clone and cancel a pending retry.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Status and summary of one linked issue, keyed by issue id in link maps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueLink {
    pub status: String,
    pub summary: String,
}

/// One available workflow transition for an issue.
#[derive(Debug, Clone)]
pub struct Transition {
    pub id: String,
    pub to_name: String,
}

/// Create-screen metadata for one project / issue type pair.
#[derive(Debug)]
pub struct CreateMeta {
    pub project_key: String,
    pub issue_type_name: String,
    pub fields: HashMap<String, Value>,
}

#[derive(Debug)]
pub struct JiraClient {
    base_url: String,
    username: String,
    password: String,
    http: reqwest::blocking::Client,
    retry: RetryPolicy,
}

impl JiraClient {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self> {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("stagehand/{}", VERSION))
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::internal_io(e.to_string(), Some("create HTTP client".to_string())))?;

        Ok(Self {
            base_url,
            username: username.into(),
            password: password.into(),
            http,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self, uri: &str) -> String {
        format!("{}/rest/api/2/{}", self.base_url, uri)
    }

    fn send(
        &self,
        method: reqwest::Method,
        uri: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::blocking::Response> {
        let endpoint = self.endpoint(uri);
        let mut request = self
            .http
            .request(method, &endpoint)
            .basic_auth(&self.username, Some(&self.password));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .map_err(|e| Error::internal_io(e.to_string(), Some(format!("request {}", endpoint))))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().ok();
            return Err(Error::jira_http(status.as_u16(), endpoint, body));
        }

        Ok(response)
    }

    fn get_json(&self, uri: &str) -> Result<Value> {
        self.send(reqwest::Method::GET, uri, None)?
            .json()
            .map_err(|e| Error::internal_json(e.to_string(), Some(format!("parse {}", uri))))
    }

    fn post_json(&self, uri: &str, body: &Value) -> Result<Value> {
        self.send(reqwest::Method::POST, uri, Some(body))?
            .json()
            .map_err(|e| Error::internal_json(e.to_string(), Some(format!("parse {}", uri))))
    }

    fn post(&self, uri: &str, body: &Value) -> Result<()> {
        self.send(reqwest::Method::POST, uri, Some(body))?;
        Ok(())
    }

    fn put(&self, uri: &str, body: &Value) -> Result<()> {
        self.send(reqwest::Method::PUT, uri, Some(body))?;
        Ok(())
    }

    // ========================================================================
    // Field metadata
    // ========================================================================

    /// Global field list keyed by lowercased display name.
    pub fn get_fields(&self) -> Result<HashMap<String, FieldDescriptor>> {
        let descriptors: Vec<FieldDescriptor> = serde_json::from_value(self.get_json("field")?)
            .map_err(|e| {
                Error::internal_json(e.to_string(), Some("parse field list".to_string()))
            })?;
        Ok(descriptors
            .into_iter()
            .map(|d| (d.name.trim().to_lowercase(), d))
            .collect())
    }

    /// Edit-screen metadata for an existing issue, keyed by field key.
    pub fn get_edit_meta(&self, issue_id: &str) -> Result<HashMap<String, Value>> {
        let meta = self.get_json(&format!("issue/{}/editmeta", issue_id))?;
        Ok(value_object_to_map(&meta["fields"]))
    }

    /// Create-screen metadata for a project (matched case-insensitively by
    /// name or key) and issue type (matched case-insensitively by name).
    pub fn get_create_meta(&self, project: &str, issue_type: &str) -> Result<CreateMeta> {
        let meta = self.get_json("issue/createmeta?expand=projects.issuetypes.fields")?;
        find_create_meta(&meta, project, issue_type)
    }

    // ========================================================================
    // Issue create / update / comment
    // ========================================================================

    /// Create an issue and return its key.
    pub fn create_issue(
        &self,
        project: &str,
        title: &str,
        description: Option<&str>,
        issue_type: &str,
        assignee: Option<&str>,
        additional_fields: &[(String, String)],
    ) -> Result<String> {
        let meta = self.get_create_meta(project, issue_type)?;

        let mut fields = Map::new();
        fields.insert("project".to_string(), json!({ "key": meta.project_key }));
        fields.insert("summary".to_string(), json!(title));
        fields.insert(
            "description".to_string(),
            json!(description.unwrap_or_default()),
        );
        fields.insert(
            "issuetype".to_string(),
            json!({ "name": meta.issue_type_name }),
        );
        if let Some(assignee) = assignee {
            fields.insert("assignee".to_string(), json!({ "name": assignee }));
        }

        self.set_additional_fields(&mut fields, additional_fields, &meta.fields)?;

        let response = self.post_json("issue", &json!({ "fields": fields }))?;
        response["key"]
            .as_str()
            .map(|k| k.to_string())
            .ok_or_else(|| {
                Error::internal_json(
                    "create response has no issue key".to_string(),
                    Some("create issue".to_string()),
                )
            })
    }

    /// Update assignee and/or additional fields on an existing issue.
    pub fn update_issue(
        &self,
        issue_id: &str,
        assignee: Option<&str>,
        additional_fields: &[(String, String)],
    ) -> Result<()> {
        let edit_meta = self.get_edit_meta(issue_id)?;

        let mut fields = Map::new();
        if let Some(assignee) = assignee {
            fields.insert("assignee".to_string(), json!({ "name": assignee }));
        }
        self.set_additional_fields(&mut fields, additional_fields, &edit_meta)?;

        self.put(&format!("issue/{}", issue_id), &json!({ "fields": fields }))
    }

    fn set_additional_fields(
        &self,
        fields: &mut Map<String, Value>,
        additional_fields: &[(String, String)],
        screen_meta: &HashMap<String, Value>,
    ) -> Result<()> {
        if additional_fields.is_empty() {
            return Ok(());
        }
        let lookup = self.get_fields()?;
        for (name, value) in additional_fields {
            resolve_and_set(fields, name, value, &lookup, screen_meta)?;
        }
        Ok(())
    }

    pub fn add_comment(&self, issue_id: &str, comment: &str) -> Result<()> {
        let body = json!({
            "update": {
                "comment": [ { "add": { "body": comment } } ]
            }
        });
        self.put(&format!("issue/{}", issue_id), &body)
    }

    // ========================================================================
    // Search
    // ========================================================================

    pub fn search(&self, jql: &str, fields: &[&str], max_results: u32) -> Result<Value> {
        self.search_with_cancel(jql, fields, max_results, &CancelToken::new())
    }

    /// JQL search with bounded retry on server-side failures. Each 5xx
    /// response is retried with exponential backoff until the policy's
    /// attempt cap is reached or the token is cancelled; 4xx responses
    /// propagate immediately.
    pub fn search_with_cancel(
        &self,
        jql: &str,
        fields: &[&str],
        max_results: u32,
        cancel: &CancelToken,
    ) -> Result<Value> {
        if jql.trim().is_empty() {
            return Err(Error::validation_invalid_argument(
                "jql",
                "No JQL query provided",
            ));
        }

        let body = json!({
            "jql": jql,
            "startAt": 0,
            "fields": fields,
            "maxResults": max_results,
        });

        let mut attempt = 0;
        loop {
            match self.post_json("search", &body) {
                Ok(response) => return Ok(response),
                Err(err) => {
                    let retryable = err.retryable.unwrap_or(false);
                    attempt += 1;
                    if !retryable || attempt >= self.retry.max_attempts || cancel.is_cancelled() {
                        return Err(err);
                    }
                    let delay = self.retry.delay_for_attempt(attempt - 1);
                    log_status!(
                        "jira",
                        "Search failed (attempt {}/{}), retrying in {}s",
                        attempt,
                        self.retry.max_attempts,
                        delay.as_secs()
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }

    // ========================================================================
    // Link queries (gates)
    // ========================================================================

    /// Stories linked to an epic, keyed by issue id.
    pub fn find_story_links(&self, epic_id: &str) -> Result<BTreeMap<String, IssueLink>> {
        let response = self.search(&story_links_jql(epic_id), &["summary", "status"], 100)?;
        Ok(map_link_results(&response))
    }

    /// Epics linked to a feature, keyed by issue id.
    pub fn find_epic_links(&self, feature_id: &str) -> Result<BTreeMap<String, IssueLink>> {
        let response = self.search(&epic_links_jql(feature_id), &["summary", "status"], 100)?;
        Ok(map_link_results(&response))
    }

    /// Features assigned to a fix version, keyed by issue id.
    pub fn find_feature_links(&self, version: &str) -> Result<BTreeMap<String, IssueLink>> {
        let response = self.search(&feature_links_jql(version), &["summary", "status"], 100)?;
        Ok(map_link_results(&response))
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    pub fn get_transitions(&self, issue_id: &str) -> Result<Vec<Transition>> {
        let response = self.get_json(&format!(
            "issue/{}/transitions?expand=transitions.fields",
            issue_id
        ))?;
        Ok(parse_transitions(&response))
    }

    /// Move an issue to the named status. The target is matched
    /// case-insensitively against the destination of each available
    /// transition.
    pub fn transition_issue(&self, issue_id: &str, new_status: &str) -> Result<()> {
        let transitions = self.get_transitions(issue_id)?;
        let transition = find_transition(&transitions, new_status)
            .ok_or_else(|| Error::jira_transition_not_found(issue_id, new_status))?;

        let body = json!({ "transition": { "id": transition.id } });
        self.post(
            &format!("issue/{}/transitions?expand=transitions.fields", issue_id),
            &body,
        )
    }
}

pub fn story_links_jql(epic_id: &str) -> String {
    format!("\"Epic Link\" = {} AND issuetype = \"User Story\"", epic_id)
}

pub fn epic_links_jql(feature_id: &str) -> String {
    format!("issuetype = Epic AND \"Parent Link\" = \"{}\"", feature_id)
}

pub fn feature_links_jql(version: &str) -> String {
    format!("issuetype = Feature AND fixVersion = \"{}\"", version)
}

/// Flatten a search response into an ordered key → {status, summary} map.
pub fn map_link_results(response: &Value) -> BTreeMap<String, IssueLink> {
    let mut links = BTreeMap::new();
    let Some(issues) = response["issues"].as_array() else {
        return links;
    };
    for issue in issues {
        let Some(key) = issue["key"].as_str() else {
            continue;
        };
        let fields = &issue["fields"];
        links.insert(
            key.to_string(),
            IssueLink {
                status: fields["status"]["name"].as_str().unwrap_or_default().to_string(),
                summary: fields["summary"].as_str().unwrap_or_default().to_string(),
            },
        );
    }
    links
}

pub fn parse_transitions(response: &Value) -> Vec<Transition> {
    response["transitions"]
        .as_array()
        .map(|transitions| {
            transitions
                .iter()
                .filter_map(|t| {
                    let id = match &t["id"] {
                        Value::String(s) => s.clone(),
                        Value::Number(n) => n.to_string(),
                        _ => return None,
                    };
                    let to_name = t["to"]["name"].as_str()?.to_string();
                    Some(Transition { id, to_name })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Case-insensitive match of a target status against transition destinations.
pub fn find_transition<'a>(transitions: &'a [Transition], status: &str) -> Option<&'a Transition> {
    transitions
        .iter()
        .find(|t| t.to_name.eq_ignore_ascii_case(status))
}

fn value_object_to_map(value: &Value) -> HashMap<String, Value> {
    value
        .as_object()
        .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

/// Locate the create metadata for a project/issue-type pair inside the full
/// createmeta response.
pub fn find_create_meta(meta: &Value, project: &str, issue_type: &str) -> Result<CreateMeta> {
    let wanted_project = project.trim().to_lowercase();
    let projects = meta["projects"].as_array().cloned().unwrap_or_default();
    let project_meta = projects
        .iter()
        .find(|p| {
            p["name"]
                .as_str()
                .is_some_and(|n| n.to_lowercase() == wanted_project)
                || p["key"]
                    .as_str()
                    .is_some_and(|k| k.to_lowercase() == wanted_project)
        })
        .ok_or_else(|| Error::jira_project_not_found(project))?;

    let wanted_type = issue_type.trim().to_lowercase();
    let issue_types = project_meta["issuetypes"].as_array().cloned().unwrap_or_default();
    let type_meta = issue_types
        .iter()
        .find(|t| {
            t["name"]
                .as_str()
                .is_some_and(|n| n.to_lowercase() == wanted_type)
        })
        .ok_or_else(|| Error::jira_issue_type_not_found(issue_type, project))?;

    Ok(CreateMeta {
        project_key: project_meta["key"].as_str().unwrap_or_default().to_string(),
        issue_type_name: type_meta["name"].as_str().unwrap_or_default().to_string(),
        fields: value_object_to_map(&type_meta["fields"]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn jql_builders() {
        assert_eq!(
            story_links_jql("REL-10"),
            "\"Epic Link\" = REL-10 AND issuetype = \"User Story\""
        );
        assert_eq!(
            epic_links_jql("REL-1"),
            "issuetype = Epic AND \"Parent Link\" = \"REL-1\""
        );
        assert_eq!(
            feature_links_jql("2026.09"),
            "issuetype = Feature AND fixVersion = \"2026.09\""
        );
    }

    #[test]
    fn link_results_are_keyed_and_ordered() {
        let response = json!({
            "issues": [
                {"key": "REL-2", "fields": {"status": {"name": "Done"}, "summary": "Checkout"}},
                {"key": "REL-1", "fields": {"status": {"name": "Open"}, "summary": "Login"}}
            ]
        });
        let links = map_link_results(&response);
        assert_eq!(links.len(), 2);
        assert_eq!(links["REL-1"].status, "Open");
        assert_eq!(links["REL-2"].summary, "Checkout");
        assert_eq!(
            links.keys().collect::<Vec<_>>(),
            vec!["REL-1", "REL-2"]
        );
    }

    #[test]
    fn link_results_tolerate_empty_response() {
        assert!(map_link_results(&json!({})).is_empty());
    }

    #[test]
    fn transitions_parse_numeric_and_string_ids() {
        let response = json!({
            "transitions": [
                {"id": 1, "to": {"name": "Done"}},
                {"id": "21", "to": {"name": "Cancelled"}}
            ]
        });
        let transitions = parse_transitions(&response);
        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[0].id, "1");
        assert_eq!(transitions[1].to_name, "Cancelled");
    }

    #[test]
    fn transition_match_is_case_insensitive() {
        let transitions = vec![Transition {
            id: "1".to_string(),
            to_name: "Done".to_string(),
        }];
        assert_eq!(find_transition(&transitions, "done").map(|t| t.id.as_str()), Some("1"));
        assert!(find_transition(&transitions, "Cancelled").is_none());
    }

    #[test]
    fn create_meta_lookup_matches_name_or_key() {
        let meta = json!({
            "projects": [
                {"name": "Mobile Releases", "key": "REL", "issuetypes": [
                    {"name": "Task", "fields": {"priority": {"name": "Priority"}}}
                ]}
            ]
        });
        let found = find_create_meta(&meta, "mobile releases", "task").unwrap();
        assert_eq!(found.project_key, "REL");
        assert_eq!(found.issue_type_name, "Task");
        assert!(found.fields.contains_key("priority"));

        let found = find_create_meta(&meta, "rel", "Task").unwrap();
        assert_eq!(found.project_key, "REL");
    }

    #[test]
    fn create_meta_lookup_reports_missing_project_and_type() {
        let meta = json!({ "projects": [ {"name": "Web", "key": "WEB", "issuetypes": []} ] });
        let err = find_create_meta(&meta, "mobile", "Task").unwrap_err();
        assert_eq!(err.code, ErrorCode::JiraProjectNotFound);

        let err = find_create_meta(&meta, "web", "Task").unwrap_err();
        assert_eq!(err.code, ErrorCode::JiraIssueTypeNotFound);
    }

    #[test]
    fn retry_policy_backs_off_exponentially() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
    }

    #[test]
    fn cancel_token_flags_cancellation() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn http_errors_mark_server_failures_retryable() {
        let err = Error::jira_http(503, "https://jira/rest/api/2/search", None);
        assert_eq!(err.retryable, Some(true));
        let err = Error::jira_http(400, "https://jira/rest/api/2/search", None);
        assert_eq!(err.retryable, Some(false));
    }
}
