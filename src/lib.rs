/// Macro for prefixed status logging to stderr (only when stderr is a terminal).
///
/// Usage:
/// ```ignore
/// log_status!("git", "Cloning into {}", repo_dir);
/// log_status!("jira", "Created issue {}", issue_id);
/// ```
#[macro_export]
macro_rules! log_status {
    ($prefix:expr, $($arg:tt)*) => {
        if ::std::io::IsTerminal::is_terminal(&::std::io::stderr()) {
            eprintln!(concat!("[", $prefix, "] {}"), format_args!($($arg)*));
        }
    };
}

pub mod core;
pub mod tasks;
pub mod utils;

// Re-export everything from core for ergonomic library use
// Users can write `stagehand::session` instead of `stagehand::core::session`
pub use core::*;
