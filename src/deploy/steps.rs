use anyhow::Result;

use crate::certbot::{self, CertOutcome};
use crate::compose;
use crate::config::Answers;
use crate::deploy::context::{DeployContext, DerivedSecrets, Settings};
use crate::docker;
use crate::envfile;
use crate::host::Host;
use crate::input::{self, Ask};
use crate::nginx;
use crate::os::{self, HostOs, Release};
use crate::output;
use crate::secrets;
use crate::stack;
use crate::ufw;

pub const TOTAL_STEPS: usize = 12;

pub async fn preflight<H: Host>(host: &H) -> Result<Release> {
    output::step(1, TOTAL_STEPS, "Checking preconditions");

    os::require_root(host).await?;
    os::ensure_entropy()?;
    let release = HostOs::detect(host).await?;

    output::success(&format!("Running as root on {:?} {}", release.os, release.codename));
    Ok(release)
}

pub fn collect_settings<A: Ask>(ask: &mut A, answers: &Answers) -> Result<Settings> {
    output::step(2, TOTAL_STEPS, "Collecting settings");
    input::collect(ask, answers)
}

pub async fn harden_firewall<H: Host>(host: &H) -> Result<()> {
    output::step(3, TOTAL_STEPS, "Configuring firewall");
    ufw::harden(host).await
}

pub async fn install_docker<H: Host>(host: &H, release: &Release) -> Result<()> {
    output::step(4, TOTAL_STEPS, "Installing Docker Engine");
    docker::install(host, release).await
}

pub async fn sync_stack<H: Host>(host: &H, ctx: &DeployContext) -> Result<()> {
    output::step(5, TOTAL_STEPS, "Syncing stack repository");
    stack::sync(host, ctx).await
}

pub async fn teardown_stack<H: Host>(host: &H, ctx: &DeployContext) -> Result<()> {
    output::step(6, TOTAL_STEPS, "Removing previous stack");
    stack::teardown(host, ctx).await
}

pub async fn patch_ports<H: Host>(host: &H, ctx: &DeployContext) -> Result<()> {
    output::step(7, TOTAL_STEPS, "Binding stack to loopback");
    compose::patch_stack(host, ctx).await
}

pub async fn derive_secrets<H: Host>(host: &H, ctx: &DeployContext) -> Result<DerivedSecrets> {
    output::step(8, TOTAL_STEPS, "Generating application key");
    secrets::derive(host, ctx).await
}

pub async fn write_env<H: Host>(
    host: &H,
    ctx: &DeployContext,
    secrets: &DerivedSecrets,
) -> Result<()> {
    output::step(9, TOTAL_STEPS, "Writing environment file");
    envfile::write(host, ctx, secrets).await
}

pub async fn start_stack<H: Host>(host: &H, ctx: &DeployContext) -> Result<()> {
    output::step(10, TOTAL_STEPS, "Starting stack");
    stack::start(host, ctx).await
}

pub async fn configure_nginx<H: Host>(host: &H, ctx: &DeployContext) -> Result<()> {
    output::step(11, TOTAL_STEPS, "Configuring nginx");
    nginx::provision(host, ctx).await
}

pub async fn issue_certificate<H: Host>(host: &H, ctx: &DeployContext) -> CertOutcome {
    output::step(12, TOTAL_STEPS, "Requesting TLS certificate");
    certbot::issue(host, ctx).await
}
