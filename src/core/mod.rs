// Public modules
pub mod error;
pub mod gate;
pub mod git;
pub mod host;
pub mod jira;
pub mod lane;
pub mod session;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
pub use host::{CommandResult, Connection, ConnectionOptions, SshOptions};
pub use session::HostSession;
