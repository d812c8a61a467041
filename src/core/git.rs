use serde::Serialize;

use crate::error::{Error, Result};
use crate::host::ConnectionOptions;
use crate::session::HostSession;

/// Git operations against a working copy on the target host. Everything is
/// built from session command execution plus remote existence checks; there
/// is no local git binding.
pub struct GitClient {
    options: ConnectionOptions,
    clone_url: String,
    tag_prefix: String,
    show_output: bool,
    pub git_dir: String,
    pub repo_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    pub id: String,
    pub subject: String,
}

impl GitClient {
    pub fn new(
        options: ConnectionOptions,
        clone_url: impl Into<String>,
        repo_base_dir: impl Into<String>,
        tag_prefix: impl Into<String>,
    ) -> Self {
        let clone_url = clone_url.into();
        let mut repo_base_dir = repo_base_dir.into();
        if !repo_base_dir.starts_with('/') {
            let cwd = std::env::current_dir()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|_| ".".to_string());
            repo_base_dir = format!("{}/{}", cwd, repo_base_dir);
        }
        let repo_name = repo_name_from_url(&clone_url).to_string();
        let git_dir = format!("{}/{}", repo_base_dir, repo_name);

        Self {
            options,
            clone_url,
            tag_prefix: tag_prefix.into(),
            show_output: false,
            git_dir,
            repo_name,
        }
    }

    pub fn with_output(mut self, show_output: bool) -> Self {
        self.show_output = show_output;
        self
    }

    fn session(&self) -> HostSession {
        HostSession::new(self.options.clone()).with_streaming(self.show_output)
    }

    /// Clone the repository if it is not present on the target yet, otherwise
    /// pull the latest changes. Idempotent: safe to call repeatedly.
    pub fn fetch_or_update(&self) -> Result<()> {
        let mut session = self.session();
        if session.remote_file_exists(&self.git_dir)? {
            log_status!("git", "'{}' already cloned, pulling latest changes", self.repo_name);
            session.execute_in(&self.git_dir, &pull_command(), true)?;
        } else {
            log_status!("git", "Cloning into '{}'", self.git_dir);
            session.execute(&clone_command(&self.clone_url, &self.git_dir), true)?;
        }
        session.close();
        Ok(())
    }

    /// Check out a branch; an unknown branch surfaces as a nonzero exit.
    pub fn checkout(&self, branch: &str) -> Result<()> {
        let mut session = self.session();
        log_status!("git", "Checking out '{}'", branch);
        session.execute_in(&self.git_dir, &checkout_command(branch), true)?;
        session.close();
        Ok(())
    }

    /// Create an annotated tag at the given commit and optionally push tags.
    /// Fails when the commit id does not exist in the repository.
    pub fn tag_and_push(&self, commit_id: &str, tag_name: &str, push: bool) -> Result<()> {
        let mut session = self.session();
        log_status!("git", "Tagging commit '{}' with '{}'", commit_id, tag_name);
        session.execute_in(&self.git_dir, &tag_command(commit_id, tag_name), true)?;
        if push {
            log_status!("git", "Pushing tags");
            session.execute_in(&self.git_dir, &push_tags_command(), true)?;
        }
        session.close();
        Ok(())
    }

    /// Newest tag matching the client's tag prefix, from the decoration log.
    pub fn latest_tag_with_prefix(&self, session: &mut HostSession) -> Result<String> {
        let result = session.execute_in(
            &self.git_dir,
            &[
                "git".to_string(),
                "log".to_string(),
                "--tags".to_string(),
                "--simplify-by-decoration".to_string(),
                "--pretty=%d".to_string(),
            ],
            true,
        )?;

        let known_tags: Vec<String> = result
            .stdout
            .iter()
            .flat_map(|line| parse_tag_decorations(line))
            .collect();

        match first_tag_with_prefix(&known_tags, &self.tag_prefix) {
            Some(tag) => Ok(tag.to_string()),
            None => Err(Error::git_tag_not_found(
                self.tag_prefix.clone(),
                known_tags,
            )),
        }
    }

    /// Commits between a start commit and the newest prefixed tag, newest
    /// first.
    pub fn commits_between_commit_and_latest_tag(
        &self,
        start_commit_id: &str,
    ) -> Result<Vec<CommitInfo>> {
        let mut session = self.session();
        let end_tag = self.latest_tag_with_prefix(&mut session)?;
        log_status!("git", "Using tag '{}' as range end", end_tag);

        let result = session.execute_in(
            &self.git_dir,
            &[
                "git".to_string(),
                "log".to_string(),
                "--pretty=format:%H%x1f%s".to_string(),
                format!("{}...{}", start_commit_id, end_tag),
            ],
            true,
        )?;
        session.close();

        Ok(result
            .stdout
            .iter()
            .filter_map(|line| parse_commit_line(line))
            .collect())
    }
}

pub fn repo_name_from_url(clone_url: &str) -> &str {
    clone_url.rsplit('/').next().unwrap_or(clone_url)
}

fn clone_command(clone_url: &str, git_dir: &str) -> Vec<String> {
    vec![
        "git".to_string(),
        "clone".to_string(),
        clone_url.to_string(),
        git_dir.to_string(),
    ]
}

fn pull_command() -> Vec<String> {
    vec!["git".to_string(), "pull".to_string()]
}

fn checkout_command(branch: &str) -> Vec<String> {
    vec![
        "git".to_string(),
        "checkout".to_string(),
        branch.to_string(),
    ]
}

fn tag_command(commit_id: &str, tag_name: &str) -> Vec<String> {
    vec![
        "git".to_string(),
        "tag".to_string(),
        "-a".to_string(),
        tag_name.to_string(),
        "-m".to_string(),
        tag_name.to_string(),
        commit_id.to_string(),
    ]
}

fn push_tags_command() -> Vec<String> {
    vec![
        "git".to_string(),
        "push".to_string(),
        "--tags".to_string(),
    ]
}

/// Extract tag names from a `git log --pretty=%d` decoration line, e.g.
/// ` (HEAD -> main, tag: REL-42, origin/main)`.
fn parse_tag_decorations(line: &str) -> Vec<String> {
    let trimmed = line.trim().trim_start_matches('(').trim_end_matches(')');
    trimmed
        .split(',')
        .filter_map(|part| {
            part.trim()
                .strip_prefix("tag: ")
                .map(|t| t.trim().to_string())
        })
        .filter(|t| !t.is_empty())
        .collect()
}

/// Newest tag carrying the prefix, in decoration-log order (newest first).
/// An empty prefix matches every tag.
fn first_tag_with_prefix<'a>(tags: &'a [String], prefix: &str) -> Option<&'a str> {
    tags.iter()
        .find(|t| t.starts_with(prefix))
        .map(|t| t.as_str())
}

fn parse_commit_line(line: &str) -> Option<CommitInfo> {
    let (id, subject) = line.split_once('\u{1f}')?;
    if id.is_empty() {
        return None;
    }
    Some(CommitInfo {
        id: id.to_string(),
        subject: subject.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_name_is_last_url_segment() {
        assert_eq!(
            repo_name_from_url("git@example.com:team/mobile-app"),
            "mobile-app"
        );
        assert_eq!(
            repo_name_from_url("https://example.com/team/mobile-app"),
            "mobile-app"
        );
    }

    #[test]
    fn git_dir_is_derived_from_base_and_repo() {
        let client = GitClient::new(
            ConnectionOptions::Local,
            "https://example.com/team/mobile-app",
            "/opt/repos",
            "REL-",
        );
        assert_eq!(client.git_dir, "/opt/repos/mobile-app");
        assert_eq!(client.repo_name, "mobile-app");
    }

    #[test]
    fn relative_base_dir_is_resolved_against_cwd() {
        let client = GitClient::new(
            ConnectionOptions::Local,
            "https://example.com/team/app",
            "repos",
            "",
        );
        assert!(client.git_dir.starts_with('/'));
        assert!(client.git_dir.ends_with("/repos/app"));
    }

    #[test]
    fn decoration_parsing_extracts_tags() {
        assert_eq!(
            parse_tag_decorations(" (tag: REL-1383-16)"),
            vec!["REL-1383-16"]
        );
        assert_eq!(
            parse_tag_decorations(" (HEAD -> main, tag: REL-2, origin/main)"),
            vec!["REL-2"]
        );
        assert_eq!(
            parse_tag_decorations(" (tag: a, tag: b)"),
            vec!["a", "b"]
        );
        assert!(parse_tag_decorations(" (origin/main)").is_empty());
        assert!(parse_tag_decorations("").is_empty());
    }

    #[test]
    fn commit_line_parsing_splits_hash_and_subject() {
        let commit = parse_commit_line("abc123\u{1f}REL-7: fix login").unwrap();
        assert_eq!(commit.id, "abc123");
        assert_eq!(commit.subject, "REL-7: fix login");
        assert!(parse_commit_line("no-separator").is_none());
    }

    #[test]
    fn tag_command_creates_annotated_tag_at_commit() {
        assert_eq!(
            tag_command("abc123", "REL-9"),
            vec!["git", "tag", "-a", "REL-9", "-m", "REL-9", "abc123"]
        );
    }

    #[test]
    fn first_prefixed_tag_respects_log_order() {
        let tags = vec![
            "OTHER-1".to_string(),
            "REL-12".to_string(),
            "REL-11".to_string(),
        ];
        assert_eq!(first_tag_with_prefix(&tags, "REL-"), Some("REL-12"));
        assert_eq!(first_tag_with_prefix(&tags, ""), Some("OTHER-1"));
        assert_eq!(first_tag_with_prefix(&tags, "HOTFIX-"), None);
    }
}
