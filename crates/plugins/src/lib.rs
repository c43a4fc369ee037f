//! Bundled command executors for Colloquy.
//!
//! These give the model its hands: listing and reading workspace files,
//! writing results back, fetching URLs, reading the clock, and running
//! allowlisted shell commands. Each executor declares a side-effect class
//! in its descriptor so the confirmation policy can gate the dangerous
//! ones.

pub mod http_get;
pub mod list_files;
pub mod now;
pub mod read_file;
pub mod shell;
pub mod workspace;
pub mod write_file;

use std::path::PathBuf;
use std::sync::Arc;

use colloquy_dispatch::ExecutorRegistry;

pub use http_get::HttpGetExecutor;
pub use list_files::ListFilesExecutor;
pub use now::NowExecutor;
pub use read_file::ReadFileExecutor;
pub use shell::ShellExecutor;
pub use write_file::WriteFileExecutor;

/// Build a registry holding every bundled executor.
///
/// File commands are scoped to `workspace`. The shell executor only runs
/// commands whose base name appears in `allowed_shell`; an empty allowlist
/// leaves the shell command unregistered entirely.
pub fn default_registry(
    workspace: impl Into<PathBuf>,
    allowed_shell: Vec<String>,
) -> ExecutorRegistry {
    let workspace = workspace.into();
    let registry = ExecutorRegistry::new();
    registry.register(Arc::new(ListFilesExecutor::new(workspace.clone())));
    registry.register(Arc::new(ReadFileExecutor::new(workspace.clone())));
    registry.register(Arc::new(WriteFileExecutor::new(workspace)));
    registry.register(Arc::new(HttpGetExecutor::new()));
    registry.register(Arc::new(NowExecutor));
    if !allowed_shell.is_empty() {
        registry.register(Arc::new(ShellExecutor::new(allowed_shell)));
    }
    registry
}
