use anyhow::{Context, Result};
use minijinja::Environment;

use crate::config::NginxConfig;
use crate::deploy::context::DeployContext;
use crate::error::DeployError;
use crate::host::{best_effort, quote, Host};
use crate::output;

const SITE_TEMPLATE: &str = include_str!("../../templates/site.conf.j2");
const NGINX_CONF_TEMPLATE: &str = include_str!("../../templates/nginx.conf.j2");

const PACKAGES: &[&str] = &["nginx", "certbot", "python3-certbot-nginx"];

/// A process listening on the public port, as reported by `ss -p`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortHolder {
    pub name: String,
    pub pid: u32,
}

/// nginx in front of the stack: installed, sane main config, one site per
/// domain proxying to the loopback port, validated and running.
pub async fn provision<H: Host>(host: &H, ctx: &DeployContext) -> Result<()> {
    install(host).await?;
    ensure_main_conf(host, &ctx.config.nginx).await?;
    free_public_port(host, ctx).await?;
    write_site(host, ctx).await?;
    check_config(host).await?;
    start_or_reload(host).await?;

    output::success(&format!(
        "nginx serving {} → {}",
        ctx.domain(),
        ctx.settings.deployment.internal_url()
    ));
    Ok(())
}

async fn install<H: Host>(host: &H) -> Result<()> {
    let probe = format!("dpkg -s {} >/dev/null 2>&1", PACKAGES.join(" "));
    if host.exec_ok(&probe).await? {
        output::success("nginx and certbot already installed");
        return Ok(());
    }

    let spinner = output::create_spinner("Installing nginx and certbot...");
    host.exec(&format!(
        "apt-get update -qq && apt-get install -y -qq {}",
        PACKAGES.join(" ")
    ))
    .await
    .context("Failed to install nginx and certbot")?;
    spinner.finish_and_clear();

    output::success("nginx and certbot installed");
    Ok(())
}

/// Whether an active `include` line pulls in the per-site directory
pub fn includes_sites_enabled(conf: &str, sites_enabled: &str) -> bool {
    conf.lines()
        .map(str::trim)
        .filter(|l| !l.starts_with('#'))
        .any(|l| l.starts_with("include") && l.contains(sites_enabled))
}

/// Replace the main config wholesale if it ignores `sites-enabled`.
/// The old file is kept next to it with a timestamp suffix.
async fn ensure_main_conf<H: Host>(host: &H, nginx: &NginxConfig) -> Result<()> {
    let current = host.read_file(&nginx.main_conf).await?;

    if let Some(ref conf) = current {
        if includes_sites_enabled(conf, &nginx.sites_enabled) {
            tracing::debug!("{} already includes {}", nginx.main_conf, nginx.sites_enabled);
            return Ok(());
        }

        let backup = format!(
            "{}.bak-{}",
            nginx.main_conf,
            chrono::Local::now().format("%Y%m%d-%H%M%S")
        );
        host.write_file(&backup, conf)
            .await
            .with_context(|| format!("Failed to back up {}", nginx.main_conf))?;
        output::warning(&format!(
            "{} does not include {}; replaced it (previous copy: {})",
            nginx.main_conf, nginx.sites_enabled, backup
        ));
    }

    host.write_file(&nginx.main_conf, &render_main_conf(nginx)?)
        .await
        .with_context(|| format!("Failed to write {}", nginx.main_conf))?;

    Ok(())
}

pub fn render_main_conf(nginx: &NginxConfig) -> Result<String> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.add_template("nginx.conf", NGINX_CONF_TEMPLATE)?;
    let tmpl = env.get_template("nginx.conf")?;
    let rendered = tmpl
        .render(minijinja::context! {
            sites_enabled => &nginx.sites_enabled,
        })
        .context("Failed to render nginx.conf template")?;
    Ok(rendered)
}

/// Parse `ss -Htlnp` output into the processes holding the socket
pub fn parse_port_holders(ss_output: &str) -> Vec<PortHolder> {
    let mut holders: Vec<PortHolder> = Vec::new();

    for line in ss_output.lines() {
        let Some(users) = line.split("users:(").nth(1) else {
            continue;
        };
        // (("nginx",pid=812,fd=6),("nginx",pid=813,fd=6))
        for entry in users.split("),(") {
            let entry = entry.trim_start_matches('(');
            let mut fields = entry.split(',');
            let name = fields.next().unwrap_or_default().trim_matches('"');
            let pid = fields
                .find_map(|f| f.strip_prefix("pid="))
                .and_then(|p| p.trim_end_matches(')').parse::<u32>().ok());

            if let Some(pid) = pid {
                let holder = PortHolder {
                    name: name.to_string(),
                    pid,
                };
                if !name.is_empty() && !holders.contains(&holder) {
                    holders.push(holder);
                }
            }
        }
    }

    holders
}

/// `ID|Ports` per running container, full IDs to match `docker compose ps -q`
const CONTAINER_PORTS: &str = "docker ps --no-trunc --format '{{.ID}}|{{.Ports}}'";

/// Containers whose published ports include host port 80, on any address.
///
/// Reads `docker ps` lines such as
/// `f3a1…|0.0.0.0:80->80/tcp, :::80->80/tcp`. A binding like
/// `127.0.0.1:9001->80/tcp` publishes container port 80 on host port 9001
/// and does not count.
pub fn containers_on_host_port_80(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| line.split_once('|'))
        .filter(|(_, ports)| {
            ports
                .split(", ")
                .filter_map(|binding| binding.split_once("->"))
                .any(|(host_side, _)| {
                    host_side
                        .rsplit_once(':')
                        .is_some_and(|(_, port)| port == "80")
                })
        })
        .map(|(id, _)| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

/// Stop foreign containers publishing host port 80 so nginx can bind it.
/// Containers of our own stack are never stopped, and non-Docker holders
/// are reported, not killed.
async fn free_public_port<H: Host>(host: &H, ctx: &DeployContext) -> Result<()> {
    let listing = match host.exec("ss -Htlnp 'sport = :80'").await {
        Ok(listing) => listing,
        Err(e) => {
            tracing::warn!("could not list listeners on port 80: {:#}", e);
            return Ok(());
        }
    };

    let holders = parse_port_holders(&listing);

    if holders.iter().any(|h| h.name == "docker-proxy") {
        stop_foreign_containers(host, ctx).await;
    }

    for holder in holders
        .iter()
        .filter(|h| h.name != "nginx" && h.name != "docker-proxy")
    {
        output::warning(&format!(
            "Port 80 is held by {} (pid {}); leaving it running",
            holder.name, holder.pid
        ));
    }

    Ok(())
}

async fn stop_foreign_containers<H: Host>(host: &H, ctx: &DeployContext) {
    let own = match host.exec(&ctx.in_stack("docker compose ps -aq --no-trunc")).await {
        Ok(out) => out,
        Err(e) => {
            tracing::warn!("could not list the stack's own containers: {:#}", e);
            output::warning(
                "Docker holds port 80 but the stack's containers are unknown; stopping nothing",
            );
            return;
        }
    };
    let own: Vec<&str> = own.split_whitespace().collect();

    let listing = match host.exec(CONTAINER_PORTS).await {
        Ok(listing) => listing,
        Err(e) => {
            tracing::warn!("could not list container ports: {:#}", e);
            output::warning("Docker holds port 80 but its containers could not be listed");
            return;
        }
    };

    for id in containers_on_host_port_80(&listing) {
        if own.contains(&id.as_str()) {
            output::warning(&format!(
                "Stack container {} still publishes host port 80; leaving it running",
                id
            ));
            continue;
        }

        best_effort(
            host,
            &format!("stop container {} holding port 80", id),
            None,
            &format!("docker stop {}", quote(&id)),
        )
        .await;
    }
}

pub fn render_site(domain: &str, upstream: &str, acme_root: &str) -> Result<String> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.add_template("site.conf", SITE_TEMPLATE)?;
    let tmpl = env.get_template("site.conf")?;
    let rendered = tmpl
        .render(minijinja::context! {
            domain => domain,
            upstream => upstream,
            acme_root => acme_root,
        })
        .context("Failed to render site template")?;
    Ok(rendered)
}

async fn write_site<H: Host>(host: &H, ctx: &DeployContext) -> Result<()> {
    let nginx = &ctx.config.nginx;
    let domain = ctx.domain();
    let available = ctx.config.site_available(domain);
    let enabled = ctx.config.site_enabled(domain);

    host.exec(&format!("mkdir -p {}", quote(&nginx.acme_root)))
        .await
        .context("Failed to create ACME challenge root")?;

    let site = render_site(
        domain,
        &ctx.settings.deployment.internal_url(),
        &nginx.acme_root,
    )?;
    host.write_file(&available, &site)
        .await
        .with_context(|| format!("Failed to write {}", available))?;

    let default_site = format!("{}/default", nginx.sites_enabled);
    best_effort(
        host,
        "disable default nginx site",
        Some(&format!("test -e {}", quote(&default_site))),
        &format!("rm -f {}", quote(&default_site)),
    )
    .await;

    host.exec(&format!(
        "mkdir -p {} && ln -sfn {} {}",
        quote(&nginx.sites_enabled),
        quote(&available),
        quote(&enabled)
    ))
    .await
    .context("Failed to enable site")?;

    output::success(&format!("Site {} enabled", domain));
    Ok(())
}

async fn check_config<H: Host>(host: &H) -> Result<()> {
    host.exec("nginx -t")
        .await
        .map_err(|e| DeployError::NginxConfigInvalid(format!("{:#}", e)))?;
    Ok(())
}

async fn start_or_reload<H: Host>(host: &H) -> Result<()> {
    if host.exec_ok("systemctl is-active --quiet nginx").await? {
        host.exec("systemctl reload nginx")
            .await
            .context("Failed to reload nginx")?;
    } else {
        best_effort(host, "enable nginx", None, "systemctl enable nginx").await;
        best_effort(host, "restart nginx", None, "systemctl restart nginx").await;
    }

    if !host.exec_ok("systemctl is-active --quiet nginx").await? {
        return Err(DeployError::NginxInactive.into());
    }
    Ok(())
}
