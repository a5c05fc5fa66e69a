use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::Host;

/// The machine this process runs on.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalHost;

impl LocalHost {
    pub fn new() -> Self {
        Self
    }

    fn command(cmd: &str) -> Command {
        let mut command = Command::new("bash");
        command
            .arg("-c")
            .arg(cmd)
            .env("DEBIAN_FRONTEND", "noninteractive");
        command
    }
}

impl Host for LocalHost {
    async fn exec(&self, cmd: &str) -> Result<String> {
        debug!("exec: {}", cmd);

        let output = Self::command(cmd)
            .output()
            .await
            .with_context(|| format!("Failed to execute command: {}", cmd))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            bail!(
                "Command failed (exit {}): {}\nstdout: {}\nstderr: {}",
                output.status,
                cmd,
                stdout.trim(),
                stderr.trim()
            );
        }

        Ok(stdout)
    }

    async fn exec_ok(&self, cmd: &str) -> Result<bool> {
        debug!("exec_ok: {}", cmd);

        let output = Self::command(cmd)
            .output()
            .await
            .with_context(|| format!("Failed to execute command: {}", cmd))?;

        Ok(output.status.success())
    }

    async fn read_file(&self, path: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path)),
        }
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        debug!("write: {}", path);

        create_parent(path).await?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write {}", path))
    }

    async fn write_private(&self, path: &str, content: &str) -> Result<()> {
        debug!("write (0600): {}", path);

        create_parent(path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .await
            .with_context(|| format!("Failed to open {}", path))?;

        // `mode` only applies on creation; tighten an existing file too
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await
            .with_context(|| format!("Failed to restrict permissions on {}", path))?;

        file.write_all(content.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path))?;
        file.flush()
            .await
            .with_context(|| format!("Failed to write {}", path))
    }

    async fn path_exists(&self, path: &str) -> Result<bool> {
        tokio::fs::try_exists(path)
            .await
            .with_context(|| format!("Failed to stat {}", path))
    }

    async fn has_command(&self, program: &str) -> Result<bool> {
        Ok(which::which(program).is_ok())
    }
}

async fn create_parent(path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}
