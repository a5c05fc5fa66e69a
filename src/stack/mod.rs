use anyhow::{Context, Result};

use crate::deploy::context::DeployContext;
use crate::host::{best_effort, quote, Effort, Host};
use crate::output;

/// Clone the stack repository, or force the checkout to the remote tip.
///
/// Local edits in the checkout are discarded; upstream is authoritative.
pub async fn sync<H: Host>(host: &H, ctx: &DeployContext) -> Result<()> {
    let stack = &ctx.config.stack;
    let path = quote(&stack.path);
    let branch = quote(&stack.branch);

    if !host.has_command("git").await? {
        host.exec("apt-get update -qq && apt-get install -y -qq git")
            .await
            .context("Failed to install git")?;
    }

    if host.path_exists(&format!("{}/.git", stack.path)).await? {
        output::info(&format!("Updating {} to origin/{}...", stack.path, stack.branch));
        host.exec(&format!(
            "git -C {path} fetch origin {branch} && git -C {path} checkout -f -B {branch} FETCH_HEAD && git -C {path} reset --hard FETCH_HEAD"
        ))
        .await
        .context("Failed to update stack repository")?;
        output::success("Stack repository reset to upstream");
    } else {
        output::info(&format!("Cloning {} ({})...", stack.repository, stack.branch));
        host.exec(&format!(
            "git clone --branch {} {} {}",
            branch,
            quote(&stack.repository),
            path
        ))
        .await
        .context("Failed to clone stack repository")?;
        output::success(&format!("Stack cloned into {}", stack.path));
    }

    Ok(())
}

/// Remove any previous instance of the stack: containers, orphans, named
/// volumes, then dangling networks.
///
/// `down -v` runs whenever the compose file exists. Volumes can outlive
/// their containers, and a database volume from an earlier run would not
/// accept the newly generated passwords.
pub async fn teardown<H: Host>(host: &H, ctx: &DeployContext) -> Result<()> {
    if !host.path_exists(&ctx.config.compose_path()).await? {
        output::info("No compose file yet, nothing to tear down");
        return Ok(());
    }

    let down = best_effort(
        host,
        "remove previous stack",
        None,
        &ctx.in_stack("docker compose down -v --remove-orphans"),
    )
    .await;

    best_effort(host, "prune networks", None, "docker network prune -f").await;

    match down {
        Effort::Applied | Effort::AlreadySatisfied => {
            output::success("Previous stack and its volumes removed")
        }
        Effort::Failed(reason) => output::warning(&format!(
            "Could not fully remove the previous stack, continuing: {}",
            reason.lines().next().unwrap_or_default()
        )),
    }

    Ok(())
}

/// Bring the stack up detached. Reads the env file at container creation.
pub async fn start<H: Host>(host: &H, ctx: &DeployContext) -> Result<()> {
    let spinner = output::create_spinner("Starting containers...");

    host.exec(&ctx.in_stack("docker compose up -d"))
        .await
        .context("Failed to start containers")?;

    spinner.finish_and_clear();
    output::success("Containers started");
    Ok(())
}
