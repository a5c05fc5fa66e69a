use anyhow::{Context, Result};
use rand::RngCore;

use crate::error::DeployError;
use crate::host::Host;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Ubuntu,
    Debian,
}

/// Distro facts the Docker apt repository needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub os: HostOs,
    pub codename: String,
}

impl HostOs {
    /// Detect the distro by reading /etc/os-release.
    pub async fn detect<H: Host>(host: &H) -> Result<Release> {
        let content = host
            .read_file("/etc/os-release")
            .await?
            .context("/etc/os-release not found")?;
        Self::from_os_release(&content)
    }

    pub fn from_os_release(content: &str) -> Result<Release> {
        let id = os_release_value(content, "ID").unwrap_or_default();
        let id_like = os_release_value(content, "ID_LIKE").unwrap_or_default();

        let os = match Self::from_id(&id) {
            Some(os) => os,
            // Derivatives (Mint, Pop!_OS, ...) name their parent in ID_LIKE
            None => id_like
                .split_whitespace()
                .find_map(Self::from_id)
                .ok_or_else(|| DeployError::UnsupportedOs(id.clone()))?,
        };

        let codename = os_release_value(content, "UBUNTU_CODENAME")
            .filter(|_| os == HostOs::Ubuntu)
            .or_else(|| os_release_value(content, "VERSION_CODENAME"))
            .filter(|c| !c.is_empty())
            .context("/etc/os-release has no VERSION_CODENAME")?;

        Ok(Release { os, codename })
    }

    fn from_id(id: &str) -> Option<Self> {
        match id {
            "ubuntu" => Some(HostOs::Ubuntu),
            "debian" => Some(HostOs::Debian),
            _ => None,
        }
    }

    /// Path segment of download.docker.com for this distro
    pub fn docker_repo_name(&self) -> &'static str {
        match self {
            HostOs::Ubuntu => "ubuntu",
            HostOs::Debian => "debian",
        }
    }
}

fn os_release_value(content: &str, key: &str) -> Option<String> {
    let prefix = format!("{}=", key);
    content
        .lines()
        .find_map(|line| line.strip_prefix(prefix.as_str()))
        .map(|v| v.trim().trim_matches('"').trim_matches('\'').to_string())
}

/// Abort unless running with an effective uid of 0.
pub async fn require_root<H: Host>(host: &H) -> Result<()> {
    let uid = host.exec("id -u").await.context("Failed to read effective uid")?;
    let uid = uid.trim();
    if uid != "0" {
        return Err(DeployError::NotRoot(uid.to_string()).into());
    }
    Ok(())
}

/// Make sure random defaults can be generated before any prompt is shown.
pub fn ensure_entropy() -> Result<()> {
    let mut probe = [0u8; 16];
    rand::rngs::OsRng
        .try_fill_bytes(&mut probe)
        .map_err(|e| DeployError::NoEntropy(e.to_string()))?;
    Ok(())
}
