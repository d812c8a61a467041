use crate::error::{Error, Result};
use crate::host::ConnectionOptions;
use crate::session::HostSession;

/// Runs fastlane lanes in a repository on the target host.
pub struct LaneClient {
    options: ConnectionOptions,
    git_dir: String,
    show_output: bool,
}

impl LaneClient {
    pub fn new(options: ConnectionOptions, git_dir: impl Into<String>) -> Self {
        Self {
            options,
            git_dir: git_dir.into(),
            show_output: false,
        }
    }

    pub fn with_output(mut self, show_output: bool) -> Self {
        self.show_output = show_output;
        self
    }

    /// Run a named lane, passing options as `key:value` tokens in the order
    /// given. Fails with `lane.not_enabled` when the repository has no
    /// `fastlane/Fastfile`.
    pub fn run_lane(&self, lane: &str, options: &[(String, String)]) -> Result<()> {
        let mut session = HostSession::new(self.options.clone()).with_streaming(self.show_output);

        log_status!("fastlane", "Checking if '{}' is fastlane enabled", self.git_dir);
        let fastfile = format!("{}/fastlane/Fastfile", self.git_dir);
        if !session.remote_file_exists(&fastfile)? {
            return Err(Error::lane_not_enabled(self.git_dir.clone()));
        }

        log_status!("fastlane", "Running lane '{}'", lane);
        session.execute_in(&self.git_dir, &lane_command(lane, options), true)?;
        session.close();
        Ok(())
    }
}

fn lane_command(lane: &str, options: &[(String, String)]) -> Vec<String> {
    let mut cmd = vec!["fastlane".to_string(), lane.to_string()];
    for (key, value) in options {
        cmd.push(format!("{}:{}", key, value));
    }
    cmd
}
