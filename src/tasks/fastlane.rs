//! Fastlane task entry point: run a lane in a repository on the target host.

use serde::{Deserialize, Serialize};

use super::{connection_options, require_non_empty, ClientHostParams};
use crate::error::Result;
use crate::git::GitClient;
use crate::lane::LaneClient;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLaneParams {
    #[serde(default)]
    pub client_host: Option<ClientHostParams>,
    pub clone_url: String,
    pub repo_base_dir: String,
    #[serde(default)]
    pub git_branch: Option<String>,
    pub lane: String,
    /// Lane options as ordered key/value pairs, passed to fastlane in the
    /// order given.
    #[serde(default)]
    pub options: Vec<(String, String)>,
    #[serde(default)]
    pub show_output: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunLaneOutput {
    pub lane: String,
    pub repo_name: String,
}

pub fn run_lane(params: RunLaneParams) -> Result<RunLaneOutput> {
    require_non_empty(&[
        ("cloneUrl", &params.clone_url),
        ("repoBaseDir", &params.repo_base_dir),
        ("lane", &params.lane),
    ])?;

    let options = connection_options(params.client_host.as_ref());
    let git = GitClient::new(
        options.clone(),
        params.clone_url,
        params.repo_base_dir,
        "",
    )
    .with_output(params.show_output);

    git.fetch_or_update()?;
    if let Some(branch) = params.git_branch.as_deref().filter(|b| !b.is_empty()) {
        git.checkout(branch)?;
    }

    LaneClient::new(options, git.git_dir.clone())
        .with_output(params.show_output)
        .run_lane(&params.lane, &params.options)?;

    Ok(RunLaneOutput {
        lane: params.lane,
        repo_name: git.repo_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn lane_options_keep_document_order() {
        let params: RunLaneParams = serde_json::from_value(json!({
            "cloneUrl": "https://example.com/team/app",
            "repoBaseDir": "/opt/repos",
            "lane": "beta",
            "options": [["scheme", "Release"], ["env", "staging"]]
        }))
        .unwrap();
        assert_eq!(
            params.options,
            vec![
                ("scheme".to_string(), "Release".to_string()),
                ("env".to_string(), "staging".to_string())
            ]
        );
    }

    #[test]
    fn run_lane_validates_required_params() {
        let params: RunLaneParams = serde_json::from_value(json!({
            "cloneUrl": "",
            "repoBaseDir": "/opt/repos",
            "lane": ""
        }))
        .unwrap();
        let err = run_lane(params).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationMissingArgument);
        assert_eq!(err.details["args"], json!(["cloneUrl", "lane"]));
    }
}
