use anyhow::{bail, Context, Result};
use dialoguer::{Input, Select};
use minijinja::Environment;
use std::path::Path;

use crate::config::StackConfig;
use crate::input::{DEFAULT_DOMAIN, DEFAULT_PORT};

const TEMPLATE: &str = include_str!("../../templates/ninja-deploy.toml.j2");

pub fn run(config_path: &Path) -> Result<()> {
    if config_path.exists() {
        bail!("{} already exists", config_path.display());
    }

    let domain: String = Input::new()
        .with_prompt("Domain")
        .default(DEFAULT_DOMAIN.to_string())
        .interact_text()?;

    let schemes = ["https", "http"];
    let scheme_idx = Select::new()
        .with_prompt("Scheme")
        .items(&schemes)
        .default(0)
        .interact()?;

    let admin_email: String = Input::new()
        .with_prompt("Admin email")
        .default(format!("admin@{}", domain))
        .interact_text()?;

    let content = render(&domain, schemes[scheme_idx], &admin_email)?;
    std::fs::write(config_path, content)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    crate::output::success(&format!("Created {}", config_path.display()));
    crate::output::info("Review it, then run: ninja-deploy install");

    Ok(())
}

fn render(domain: &str, scheme: &str, admin_email: &str) -> Result<String> {
    let stack = StackConfig::default();

    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.add_template("ninja-deploy.toml", TEMPLATE)?;
    let tmpl = env.get_template("ninja-deploy.toml")?;
    let content = tmpl.render(minijinja::context! {
        repository => stack.repository,
        branch => stack.branch,
        path => stack.path,
        image => stack.image,
        domain => domain,
        scheme => scheme,
        port => DEFAULT_PORT,
        admin_email => admin_email,
    })?;

    Ok(content)
}
