use crate::error::{Error, Result};
use crate::utils::shell;
use std::path::PathBuf;
use std::process::Command;
use uuid::Uuid;

/// How to reach a target host. One variant per transport kind, each with its
/// own explicit field set.
#[derive(Debug, Clone)]
pub enum ConnectionOptions {
    /// Execute on the machine running the task, through `sh -c`.
    Local,
    /// Execute on a remote host over OpenSSH.
    Ssh(SshOptions),
}

#[derive(Debug, Clone)]
pub struct SshOptions {
    pub address: String,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<String>,
    pub connect_timeout_secs: u64,
}

impl SshOptions {
    pub fn new(address: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            user: user.into(),
            port: 22,
            identity_file: None,
            connect_timeout_secs: 10,
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.address)
    }

    /// Resolve and validate the identity file, expanding a leading tilde.
    fn resolved_identity_file(&self) -> Result<Option<String>> {
        match &self.identity_file {
            Some(path) if !path.is_empty() => {
                let expanded = shellexpand::tilde(path).to_string();
                if !std::path::Path::new(&expanded).exists() {
                    return Err(Error::ssh_identity_file_not_found(
                        self.address.clone(),
                        expanded,
                    ));
                }
                Ok(Some(expanded))
            }
            _ => Ok(None),
        }
    }
}

impl ConnectionOptions {
    pub fn target_label(&self) -> String {
        match self {
            ConnectionOptions::Local => "local".to_string(),
            ConnectionOptions::Ssh(opts) => opts.destination(),
        }
    }

    /// Establish a live connection. For SSH this starts an OpenSSH control
    /// master so every subsequent command reuses one underlying channel.
    pub fn connect(&self) -> Result<Connection> {
        match self {
            ConnectionOptions::Local => Ok(Connection {
                channel: Channel::Local,
                closed: false,
            }),
            ConnectionOptions::Ssh(opts) => {
                let identity_file = opts.resolved_identity_file()?;
                let control_path =
                    std::env::temp_dir().join(format!("stagehand-{}.ctl", Uuid::new_v4()));

                let mut cmd = Command::new("ssh");
                cmd.arg("-M")
                    .arg("-S")
                    .arg(&control_path)
                    .args(["-o", "BatchMode=yes"])
                    .args([
                        "-o",
                        &format!("ConnectTimeout={}", opts.connect_timeout_secs),
                    ])
                    .args(["-o", "ServerAliveInterval=15"])
                    .args(["-o", "ServerAliveCountMax=3"]);
                if let Some(identity_file) = &identity_file {
                    cmd.args(["-i", identity_file]);
                }
                if opts.port != 22 {
                    cmd.args(["-p", &opts.port.to_string()]);
                }
                // -f -N: background the master without running a remote command
                cmd.args(["-fN", &opts.destination()]);

                let output = cmd.output().map_err(|e| {
                    Error::internal_io(e.to_string(), Some("spawn ssh control master".to_string()))
                })?;

                if !output.status.success() {
                    return Err(Error::session_connect_failed(
                        opts.destination(),
                        output.status.code().unwrap_or(-1),
                        String::from_utf8_lossy(&output.stderr).to_string(),
                    ));
                }

                Ok(Connection {
                    channel: Channel::Ssh {
                        destination: opts.destination(),
                        control_path,
                    },
                    closed: false,
                })
            }
        }
    }
}

/// Result of one command execution on the target host.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_joined(&self) -> String {
        self.stdout.join("\n")
    }

    pub fn stderr_joined(&self) -> String {
        self.stderr.join("\n")
    }
}

#[derive(Debug)]
enum Channel {
    Local,
    Ssh {
        destination: String,
        control_path: PathBuf,
    },
}

/// A live channel to one target host. Created by `ConnectionOptions::connect`,
/// closed exactly once.
#[derive(Debug)]
pub struct Connection {
    channel: Channel,
    closed: bool,
}

impl Connection {
    /// Run a raw shell command line on the target and capture its output.
    pub fn run_shell(&self, command: &str) -> Result<CommandResult> {
        if self.closed {
            return Err(Error::session_closed());
        }

        let output = match &self.channel {
            Channel::Local => Command::new("sh").args(["-c", command]).output(),
            Channel::Ssh {
                destination,
                control_path,
            } => Command::new("ssh")
                .arg("-S")
                .arg(control_path)
                .args(["-o", "BatchMode=yes"])
                .arg(destination)
                .arg(command)
                .output(),
        };

        let output = output.map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("execute: {}", command)))
        })?;

        Ok(CommandResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: split_lines(&output.stdout),
            stderr: split_lines(&output.stderr),
        })
    }

    /// Existence check against the target filesystem.
    pub fn file_exists(&self, path: &str) -> Result<bool> {
        let result = self.run_shell(&format!("test -e {}", shell::quote_path(path)))?;
        Ok(result.success())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the connection. Safe to call multiple times.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Channel::Ssh {
            destination,
            control_path,
        } = &self.channel
        {
            let _ = Command::new("ssh")
                .args(["-O", "exit"])
                .arg("-S")
                .arg(control_path)
                .arg(destination)
                .output();
            let _ = std::fs::remove_file(control_path);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(bytes);
    if text.is_empty() {
        return Vec::new();
    }
    let mut lines: Vec<String> = text.split('\n').map(|l| l.to_string()).collect();
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_lines_drops_trailing_newline() {
        assert_eq!(split_lines(b"one\ntwo\n"), vec!["one", "two"]);
    }

    #[test]
    fn split_lines_keeps_interior_blanks() {
        assert_eq!(split_lines(b"one\n\ntwo\n"), vec!["one", "", "two"]);
    }

    #[test]
    fn split_lines_empty_output() {
        assert!(split_lines(b"").is_empty());
    }

    #[test]
    fn local_connection_captures_stdout() {
        let conn = ConnectionOptions::Local.connect().unwrap();
        let result = conn.run_shell("echo hello").unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, vec!["hello"]);
        assert!(result.stderr.is_empty());
    }

    #[test]
    fn local_connection_captures_exit_code() {
        let conn = ConnectionOptions::Local.connect().unwrap();
        let result = conn.run_shell("exit 3").unwrap();
        assert_eq!(result.exit_code, 3);
        assert!(!result.success());
    }

    #[test]
    fn closed_connection_refuses_commands() {
        let mut conn = ConnectionOptions::Local.connect().unwrap();
        conn.close();
        conn.close(); // idempotent
        let err = conn.run_shell("echo hi").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::SessionClosed);
    }

    #[test]
    fn file_exists_reports_both_ways() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present");
        std::fs::write(&present, "x").unwrap();

        let conn = ConnectionOptions::Local.connect().unwrap();
        assert!(conn.file_exists(present.to_str().unwrap()).unwrap());
        assert!(!conn
            .file_exists(dir.path().join("absent").to_str().unwrap())
            .unwrap());
    }

    #[test]
    fn missing_identity_file_fails_fast() {
        let mut opts = SshOptions::new("release-box", "deploy");
        opts.identity_file = Some("/nonexistent/id_rsa".to_string());
        let err = ConnectionOptions::Ssh(opts).connect().unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::SshIdentityFileNotFound);
    }
}
