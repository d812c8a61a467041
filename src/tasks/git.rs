//! Git task entry points: release tagging and story collection.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{connection_options, require_non_empty, ClientHostParams};
use crate::error::{Error, Result};
use crate::git::{CommitInfo, GitClient};

// ============================================================================
// git.tag_commit
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagCommitParams {
    #[serde(default)]
    pub client_host: Option<ClientHostParams>,
    pub clone_url: String,
    pub repo_base_dir: String,
    pub commit_id: String,
    pub tag_name: String,
    #[serde(default)]
    pub push_to_origin: bool,
    #[serde(default)]
    pub show_output: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagCommitOutput {
    pub tag_name: String,
    pub repo_name: String,
}

pub fn tag_commit(params: TagCommitParams) -> Result<TagCommitOutput> {
    require_non_empty(&[
        ("cloneUrl", &params.clone_url),
        ("repoBaseDir", &params.repo_base_dir),
        ("commitId", &params.commit_id),
        ("tagName", &params.tag_name),
    ])?;

    let client = GitClient::new(
        connection_options(params.client_host.as_ref()),
        params.clone_url,
        params.repo_base_dir,
        "",
    )
    .with_output(params.show_output);

    client.fetch_or_update()?;
    client.tag_and_push(&params.commit_id, &params.tag_name, params.push_to_origin)?;

    Ok(TagCommitOutput {
        tag_name: params.tag_name,
        repo_name: client.repo_name,
    })
}

// ============================================================================
// git.collect_stories
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectStoriesParams {
    #[serde(default)]
    pub client_host: Option<ClientHostParams>,
    pub clone_url: String,
    pub repo_base_dir: String,
    /// Start of the commit range; the end is the newest prefixed tag.
    pub commit_id: String,
    pub tag_prefix: String,
    /// Pattern with one capture group extracting the story id from a commit
    /// subject, e.g. `(REL-\d+)`.
    pub story_pattern: String,
    #[serde(default)]
    pub show_output: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectStoriesOutput {
    pub stories: Vec<String>,
}

pub fn collect_stories(params: CollectStoriesParams) -> Result<CollectStoriesOutput> {
    require_non_empty(&[
        ("cloneUrl", &params.clone_url),
        ("repoBaseDir", &params.repo_base_dir),
        ("commitId", &params.commit_id),
        ("tagPrefix", &params.tag_prefix),
        ("storyPattern", &params.story_pattern),
    ])?;

    let pattern = Regex::new(&params.story_pattern).map_err(|e| {
        Error::validation_invalid_argument("storyPattern", e.to_string())
    })?;

    let client = GitClient::new(
        connection_options(params.client_host.as_ref()),
        params.clone_url,
        params.repo_base_dir,
        params.tag_prefix.clone(),
    )
    .with_output(params.show_output);

    client.fetch_or_update()?;
    let commits = client.commits_between_commit_and_latest_tag(&params.commit_id)?;

    let stories = extract_story_ids(&commits, &pattern);
    if stories.is_empty() {
        return Err(Error::git_no_story_references(params.story_pattern));
    }

    log_status!("git", "Found {} story reference(s)", stories.len());
    Ok(CollectStoriesOutput { stories })
}

/// Story ids from commit subjects, first occurrence order, deduplicated.
fn extract_story_ids(commits: &[CommitInfo], pattern: &Regex) -> Vec<String> {
    let mut stories: Vec<String> = Vec::new();
    for commit in commits {
        if let Some(captures) = pattern.captures(&commit.subject) {
            if let Some(story) = captures.get(1) {
                let story = story.as_str().to_string();
                if !stories.contains(&story) {
                    stories.push(story);
                }
            }
        }
    }
    stories
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    fn commit(id: &str, subject: &str) -> CommitInfo {
        CommitInfo {
            id: id.to_string(),
            subject: subject.to_string(),
        }
    }

    #[test]
    fn story_ids_are_deduplicated_in_first_seen_order() {
        let commits = vec![
            commit("a", "REL-7: fix login"),
            commit("b", "chore: bump version"),
            commit("c", "REL-3: add settings screen"),
            commit("d", "REL-7: follow-up"),
        ];
        let pattern = Regex::new(r"(REL-\d+)").unwrap();
        assert_eq!(extract_story_ids(&commits, &pattern), vec!["REL-7", "REL-3"]);
    }

    #[test]
    fn only_the_first_capture_group_is_collected() {
        let commits = vec![commit("a", "[REL-12] polish REL-99 banner")];
        let pattern = Regex::new(r"\[(REL-\d+)\]").unwrap();
        assert_eq!(extract_story_ids(&commits, &pattern), vec!["REL-12"]);
    }

    #[test]
    fn invalid_story_pattern_is_rejected_up_front() {
        let params: CollectStoriesParams = serde_json::from_value(json!({
            "cloneUrl": "https://example.com/team/app",
            "repoBaseDir": "/opt/repos",
            "commitId": "abc123",
            "tagPrefix": "REL-",
            "storyPattern": "(REL-"
        }))
        .unwrap();
        let err = collect_stories(params).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
    }

    #[test]
    fn tag_commit_validates_required_params() {
        let params: TagCommitParams = serde_json::from_value(json!({
            "cloneUrl": "https://example.com/team/app",
            "repoBaseDir": "",
            "commitId": "abc123",
            "tagName": ""
        }))
        .unwrap();
        let err = tag_commit(params).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationMissingArgument);
        assert_eq!(err.details["args"], json!(["repoBaseDir", "tagName"]));
    }
}
