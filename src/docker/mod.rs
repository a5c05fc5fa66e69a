use anyhow::{Context, Result};
use minijinja::Environment;

use crate::host::{best_effort, Host};
use crate::os::Release;
use crate::output;

const DOCKER_LIST_TEMPLATE: &str = include_str!("../../templates/docker.list.j2");

const KEYRING: &str = "/etc/apt/keyrings/docker.asc";
const SOURCES_LIST: &str = "/etc/apt/sources.list.d/docker.list";

/// Distro packages that conflict with Docker's own engine packages
pub const LEGACY_PACKAGES: &[&str] = &[
    "docker.io",
    "docker-doc",
    "docker-compose",
    "docker-compose-v2",
    "podman-docker",
    "containerd",
    "runc",
];

pub const ENGINE_PACKAGES: &[&str] = &[
    "docker-ce",
    "docker-ce-cli",
    "containerd.io",
    "docker-buildx-plugin",
    "docker-compose-plugin",
];

/// Docker Engine from Docker's own repository, with the compose plugin,
/// running and enabled at boot. A working `docker compose` from distro
/// packages (`docker.io`, `docker-compose-v2`) does not count.
pub async fn install<H: Host>(host: &H, release: &Release) -> Result<()> {
    output::info("Checking Docker...");

    let probe = format!("dpkg -s {} >/dev/null 2>&1", ENGINE_PACKAGES.join(" "));
    if host.exec_ok(&probe).await? {
        output::success("Docker Engine already installed from download.docker.com");
    } else {
        remove_legacy(host).await;
        add_repository(host, release).await?;

        let spinner = output::create_spinner("Installing Docker Engine...");
        host.exec(&format!(
            "apt-get update -qq && apt-get install -y -qq {}",
            ENGINE_PACKAGES.join(" ")
        ))
        .await
        .context("Failed to install Docker")?;
        spinner.finish_and_clear();
        output::success("Docker installed");
    }

    best_effort(
        host,
        "enable docker service",
        Some("! systemctl is-enabled --quiet docker || ! systemctl is-active --quiet docker"),
        "systemctl enable --now docker",
    )
    .await;

    Ok(())
}

async fn remove_legacy<H: Host>(host: &H) {
    for package in LEGACY_PACKAGES {
        best_effort(
            host,
            &format!("remove {}", package),
            Some(&format!("dpkg -s {} >/dev/null 2>&1", package)),
            &format!("apt-get remove -y -qq {}", package),
        )
        .await;
    }
}

async fn add_repository<H: Host>(host: &H, release: &Release) -> Result<()> {
    output::info("Adding Docker apt repository...");

    host.exec("apt-get update -qq && apt-get install -y -qq ca-certificates curl")
        .await
        .context("Failed to install ca-certificates and curl")?;

    host.exec(&format!(
        "install -m 0755 -d /etc/apt/keyrings && curl -fsSL https://download.docker.com/linux/{}/gpg -o {} && chmod a+r {}",
        release.os.docker_repo_name(),
        KEYRING,
        KEYRING
    ))
    .await
    .context("Failed to fetch Docker signing key")?;

    let arch = host
        .exec("dpkg --print-architecture")
        .await
        .context("Failed to read dpkg architecture")?;

    let list = render_sources_list(release, arch.trim())?;
    host.write_file(SOURCES_LIST, &list)
        .await
        .context("Failed to write Docker apt source")?;

    Ok(())
}

pub fn render_sources_list(release: &Release, arch: &str) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("docker.list", DOCKER_LIST_TEMPLATE)?;
    let tmpl = env.get_template("docker.list")?;
    let rendered = tmpl
        .render(minijinja::context! {
            arch => arch,
            keyring => KEYRING,
            distro => release.os.docker_repo_name(),
            codename => &release.codename,
        })
        .context("Failed to render docker.list template")?;
    Ok(rendered)
}
