pub mod exec;
#[cfg(test)]
pub mod fake;

use anyhow::Result;
use tracing::{debug, info, warn};

pub use exec::LocalHost;

/// The machine being provisioned. Every stage goes through this trait so a
/// whole run can be replayed against an in-memory host in tests.
#[allow(async_fn_in_trait)]
pub trait Host {
    /// Execute a shell command and return stdout, failing on non-zero exit
    async fn exec(&self, cmd: &str) -> Result<String>;

    /// Execute a shell command, returning Ok(true) if exit 0, Ok(false) otherwise
    async fn exec_ok(&self, cmd: &str) -> Result<bool>;

    /// Read a file, `None` if it does not exist
    async fn read_file(&self, path: &str) -> Result<Option<String>>;

    /// Write a file in full, creating parent directories
    async fn write_file(&self, path: &str, content: &str) -> Result<()>;

    /// Like `write_file`, but the file is mode 0600 before any content lands
    async fn write_private(&self, path: &str, content: &str) -> Result<()>;

    async fn path_exists(&self, path: &str) -> Result<bool>;

    /// Whether `program` resolves on PATH
    async fn has_command(&self, program: &str) -> Result<bool> {
        self.exec_ok(&format!("command -v {} >/dev/null 2>&1", quote(program)))
            .await
    }
}

/// Result of a chore whose failure must not stop the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effort {
    Applied,
    AlreadySatisfied,
    Failed(String),
}

/// Run `cmd` unless `probe` says there is nothing to do.
///
/// `probe` exits 0 when the chore is needed. Outcomes are logged at
/// different levels: nothing to do at debug, applied at info, unexpected
/// failures at warn.
pub async fn best_effort<H: Host>(host: &H, label: &str, probe: Option<&str>, cmd: &str) -> Effort {
    if let Some(probe) = probe {
        match host.exec_ok(probe).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("{}: already satisfied", label);
                return Effort::AlreadySatisfied;
            }
            Err(e) => {
                warn!("{}: probe failed: {:#}", label, e);
                return Effort::Failed(format!("{:#}", e));
            }
        }
    }

    match host.exec(cmd).await {
        Ok(_) => {
            info!("{}: done", label);
            Effort::Applied
        }
        Err(e) => {
            warn!("{}: {:#}", label, e);
            Effort::Failed(format!("{:#}", e))
        }
    }
}

/// Single-quote a value for `bash -c`
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
