use anyhow::{Context, Result};

use crate::host::{quote, Host};
use crate::output;

/// A service to let through, by ufw application profile, or by raw ports
/// when the profile is not registered (nginx not installed yet).
struct Allowance {
    profile: &'static str,
    ports: &'static [&'static str],
}

const ALLOWANCES: &[Allowance] = &[
    // Remote shell first so enabling never cuts off the operator
    Allowance {
        profile: "OpenSSH",
        ports: &["22/tcp"],
    },
    Allowance {
        profile: "Nginx Full",
        ports: &["80/tcp", "443/tcp"],
    },
];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct UfwStatus {
    pub active: bool,
    pub deny_incoming: bool,
    pub allow_outgoing: bool,
    pub allowed: Vec<String>,
}

impl UfwStatus {
    /// Parse `ufw status verbose`
    pub fn parse(output: &str) -> Self {
        let mut status = UfwStatus::default();

        for line in output.lines() {
            let line = line.trim();
            if let Some(state) = line.strip_prefix("Status:") {
                status.active = state.trim() == "active";
            } else if let Some(defaults) = line.strip_prefix("Default:") {
                status.deny_incoming = defaults.contains("deny (incoming)");
                status.allow_outgoing = defaults.contains("allow (outgoing)");
            } else if let Some((target, _)) = line.split_once(" ALLOW") {
                let target = target.trim().trim_end_matches("(v6)").trim();
                if !target.is_empty() && !status.allowed.iter().any(|t| t == target) {
                    status.allowed.push(target.to_string());
                }
            }
        }

        status
    }

    pub fn allows(&self, target: &str) -> bool {
        self.allowed.iter().any(|t| t == target)
    }
}

/// Firewall on, remote shell and web traffic allowed, everything else denied.
pub async fn harden<H: Host>(host: &H) -> Result<()> {
    output::info("Checking firewall...");

    if !host.has_command("ufw").await? {
        let spinner = output::create_spinner("Installing ufw...");
        host.exec("apt-get update -qq && apt-get install -y -qq ufw")
            .await
            .context("Failed to install ufw")?;
        spinner.finish_and_clear();
        output::success("ufw installed");
    }

    let status = UfwStatus::parse(
        &host
            .exec("ufw status verbose")
            .await
            .context("Failed to read firewall status")?,
    );

    for allowance in ALLOWANCES {
        allow(host, &status, allowance).await?;
    }

    if !status.deny_incoming {
        host.exec("ufw default deny incoming")
            .await
            .context("Failed to set default incoming policy")?;
    }
    if !status.allow_outgoing {
        host.exec("ufw default allow outgoing")
            .await
            .context("Failed to set default outgoing policy")?;
    }

    if status.active {
        output::success("Firewall already active");
    } else {
        host.exec("ufw --force enable")
            .await
            .context("Failed to enable ufw")?;
        output::success("Firewall enabled");
    }

    Ok(())
}

async fn allow<H: Host>(host: &H, status: &UfwStatus, allowance: &Allowance) -> Result<()> {
    let by_ports = allowance.ports.iter().all(|p| status.allows(p));
    if status.allows(allowance.profile) || by_ports {
        tracing::debug!("ufw already allows {}", allowance.profile);
        return Ok(());
    }

    let has_profile = host
        .exec_ok(&format!("ufw app info {} >/dev/null 2>&1", quote(allowance.profile)))
        .await?;

    if has_profile {
        host.exec(&format!("ufw allow {}", quote(allowance.profile)))
            .await
            .with_context(|| format!("Failed to allow {}", allowance.profile))?;
    } else {
        for port in allowance.ports {
            if status.allows(port) {
                continue;
            }
            host.exec(&format!("ufw allow {}", port))
                .await
                .with_context(|| format!("Failed to allow {}", port))?;
        }
    }

    output::success(&format!("Allowed {}", allowance.profile));
    Ok(())
}
