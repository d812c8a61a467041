use crate::error::{Error, RemoteCommandFailedDetails, Result};
use crate::host::{CommandResult, Connection, ConnectionOptions};
use crate::utils::shell;
use std::io::Write;
use uuid::Uuid;

/// A scoped unit of work against one target host.
///
/// Owns at most one `Connection` and one temporary working directory, both
/// created lazily. The connection is reused for every command issued through
/// the session and released exactly once — `close()` is idempotent and also
/// runs from `Drop`, so the release happens even when a command fails and the
/// error propagates out of the calling scope.
pub struct HostSession {
    options: ConnectionOptions,
    conn: Option<Connection>,
    work_dir: Option<String>,
    stream_output: bool,
    closed: bool,
}

impl HostSession {
    pub fn new(options: ConnectionOptions) -> Self {
        Self {
            options,
            conn: None,
            work_dir: None,
            stream_output: false,
            closed: false,
        }
    }

    /// Echo captured command output to this process's stdout/stderr after
    /// each execution.
    pub fn with_streaming(mut self, stream_output: bool) -> Self {
        self.stream_output = stream_output;
        self
    }

    /// Establish the connection if it does not exist yet. Idempotent.
    pub fn open(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::session_closed());
        }
        if self.conn.is_none() {
            self.conn = Some(self.options.connect()?);
        }
        Ok(())
    }

    fn conn(&mut self) -> Result<&Connection> {
        self.open()?;
        self.conn
            .as_ref()
            .ok_or_else(Error::session_closed)
    }

    /// The session's temporary working directory on the target host,
    /// provisioned on first use and removed at close.
    pub fn work_dir(&mut self) -> Result<String> {
        if let Some(dir) = &self.work_dir {
            return Ok(dir.clone());
        }
        let dir = format!("/tmp/stagehand-{}", Uuid::new_v4());
        self.run_command_line(format!("mkdir -p {}", shell::quote_path(&dir)), true)?;
        self.work_dir = Some(dir.clone());
        Ok(dir)
    }

    /// Run a command given as argument tokens. Each token is quoted
    /// individually before the line is sent to the target shell.
    ///
    /// With `check_success`, a nonzero exit code surfaces the captured output
    /// and fails with `remote.command_failed`.
    pub fn execute(&mut self, cmd: &[String], check_success: bool) -> Result<CommandResult> {
        self.run_command_line(shell::quote_args(cmd), check_success)
    }

    /// Run a command with the target shell's working directory set first.
    pub fn execute_in(
        &mut self,
        dir: &str,
        cmd: &[String],
        check_success: bool,
    ) -> Result<CommandResult> {
        let line = format!(
            "cd {} && {}",
            shell::quote_path(dir),
            shell::quote_args(cmd)
        );
        self.run_command_line(line, check_success)
    }

    fn run_command_line(&mut self, command_line: String, check_success: bool) -> Result<CommandResult> {
        let stream_output = self.stream_output;
        let result = self.conn()?.run_shell(&command_line)?;

        if stream_output {
            // stdout is reserved for the response envelope
            let _ = echo_captured(&result, &mut std::io::stderr().lock());
        }

        if check_success && !result.success() {
            return Err(Error::remote_command_failed(RemoteCommandFailedDetails {
                command: command_line,
                exit_code: result.exit_code,
                stdout: result.stdout_joined(),
                stderr: result.stderr_joined(),
            }));
        }

        Ok(result)
    }

    /// Existence check against the target filesystem.
    pub fn remote_file_exists(&mut self, path: &str) -> Result<bool> {
        self.conn()?.file_exists(path)
    }

    /// Create a file in the session's working directory with the given
    /// content and return its path.
    pub fn upload_text_to_work_dir(&mut self, content: &str, filename: &str) -> Result<String> {
        let dir = self.work_dir()?;
        let path = format!("{}/{}", dir, filename);
        let line = format!(
            "printf '%s' {} > {}",
            shell::quote_arg(content),
            shell::quote_path(&path)
        );
        self.run_command_line(line, true)?;
        Ok(path)
    }

    /// Remove the working directory and release the connection.
    /// Safe to call multiple times; a no-op once closed.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let (Some(conn), Some(dir)) = (&self.conn, &self.work_dir) {
            let _ = conn.run_shell(&format!("rm -rf {}", shell::quote_path(dir)));
        }
        if let Some(conn) = &mut self.conn {
            conn.close();
        }
        self.conn = None;
        self.work_dir = None;
    }
}

impl Drop for HostSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Echo captured command output, stdout lines first, into one sink.
fn echo_captured(result: &CommandResult, sink: &mut dyn std::io::Write) -> std::io::Result<()> {
    for line in &result.stdout {
        writeln!(sink, "{}", line)?;
    }
    for line in &result.stderr {
        writeln!(sink, "{}", line)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn local_session() -> HostSession {
        HostSession::new(ConnectionOptions::Local)
    }

    #[test]
    fn execute_success_returns_output_lines() {
        let mut session = local_session();
        let result = session
            .execute(&["printf".to_string(), "a\\nb".to_string()], true)
            .unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, vec!["a", "b"]);
    }

    #[test]
    fn execute_failure_carries_exit_code() {
        let mut session = local_session();
        let err = session
            .execute(&["sh".to_string(), "-c".to_string(), "exit 7".to_string()], true)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RemoteCommandFailed);
        assert_eq!(err.details["exitCode"], 7);
    }

    #[test]
    fn execute_failure_without_check_returns_result() {
        let mut session = local_session();
        let result = session.execute(&["false".to_string()], false).unwrap();
        assert_eq!(result.exit_code, 1);
    }

    #[test]
    fn open_then_close_is_idempotent() {
        let mut session = local_session();
        session.open().unwrap();
        session.open().unwrap();
        session.close();
        session.close();
        let err = session.open().unwrap_err();
        assert_eq!(err.code, ErrorCode::SessionClosed);
    }

    #[test]
    fn work_dir_is_provisioned_and_removed() {
        let mut session = local_session();
        let dir = session.work_dir().unwrap();
        assert_eq!(dir, session.work_dir().unwrap());
        assert!(std::path::Path::new(&dir).is_dir());
        session.close();
        assert!(!std::path::Path::new(&dir).exists());
    }

    #[test]
    fn upload_text_writes_content() {
        let mut session = local_session();
        let path = session
            .upload_text_to_work_dir("lane: beta\n", "lane-config.yml")
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "lane: beta\n"
        );
        session.close();
    }

    #[test]
    fn remote_file_exists_gates_on_target_fs() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("Fastfile");
        std::fs::write(&marker, "lane").unwrap();

        let mut session = local_session();
        assert!(session
            .remote_file_exists(marker.to_str().unwrap())
            .unwrap());
        assert!(!session
            .remote_file_exists(dir.path().join("missing").to_str().unwrap())
            .unwrap());
    }

    #[test]
    fn echoed_output_keeps_line_order_in_one_sink() {
        let result = CommandResult {
            exit_code: 0,
            stdout: vec!["Cloning into 'app'...".to_string(), "done.".to_string()],
            stderr: vec!["warning: redirecting".to_string()],
        };
        let mut sink = Vec::new();
        echo_captured(&result, &mut sink).unwrap();
        assert_eq!(
            String::from_utf8(sink).unwrap(),
            "Cloning into 'app'...\ndone.\nwarning: redirecting\n"
        );
    }

    #[test]
    fn execute_in_changes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = local_session();
        let result = session
            .execute_in(dir.path().to_str().unwrap(), &["pwd".to_string()], true)
            .unwrap();
        let reported = result.stdout.first().cloned().unwrap_or_default();
        let canonical = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(
            std::fs::canonicalize(&reported).unwrap(),
            canonical
        );
    }
}
