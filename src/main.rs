use clap::Parser;

use stagehand::{tasks, Error, Result};

mod output;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(version = VERSION)]
#[command(about = "Release orchestration tasks for Jira, git and fastlane")]
struct Cli {
    /// Dotted task name, e.g. jira.create_issue
    task: String,

    /// JSON parameter document: a file path, '-' for stdin, or inline JSON
    #[arg(long, default_value = "-")]
    params: String,
}

/// Load the parameter document from a file, stdin, or an inline JSON literal.
fn read_params(source: &str) -> Result<serde_json::Value> {
    let raw = if source == "-" {
        use std::io::Read;
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| Error::internal_io(e.to_string(), Some("read stdin".to_string())))?;
        buffer
    } else if source.trim_start().starts_with('{') {
        source.to_string()
    } else {
        std::fs::read_to_string(source).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read params file '{}'", source)))
        })?
    };

    serde_json::from_str(&raw)
        .map_err(|e| Error::validation_invalid_argument("params", e.to_string()))
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let result = read_params(&cli.params).and_then(|params| tasks::run_task(&cli.task, params));

    let (printed, exit_code) = output::print_json_result(result);
    if printed.is_err() {
        return std::process::ExitCode::from(1);
    }
    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
