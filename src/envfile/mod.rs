use anyhow::{Context, Result};
use minijinja::Environment;

use crate::deploy::context::{DeployContext, DerivedSecrets, Settings};
use crate::host::Host;
use crate::output;

const ENV_TEMPLATE: &str = include_str!("../../templates/env.j2");

/// Render the stack's `.env`. Same inputs, same bytes.
pub fn render(settings: &Settings, secrets: &DerivedSecrets) -> Result<String> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.add_template("env", ENV_TEMPLATE)
        .context("Failed to load env template")?;

    let deployment = &settings.deployment;
    let tmpl = env.get_template("env")?;
    let rendered = tmpl
        .render(minijinja::context! {
            app_url => deployment.app_url(),
            app_key => &secrets.app_key,
            debug => deployment.debug,
            require_https => deployment.require_https,
            db_name => &settings.database.name,
            db_user => &settings.database.user,
            db_password => &settings.database.password,
            db_root_password => &settings.database.root_password,
            admin_email => &settings.admin.email,
            admin_password => &settings.admin.password,
        })
        .context("Failed to render env template")?;

    Ok(rendered)
}

/// Overwrite the env file in full; readable by root only, including while
/// it is being written.
pub async fn write<H: Host>(
    host: &H,
    ctx: &DeployContext,
    secrets: &DerivedSecrets,
) -> Result<()> {
    let path = ctx.config.env_path();
    let content = render(&ctx.settings, secrets)?;

    host.write_private(&path, &content)
        .await
        .with_context(|| format!("Failed to write {}", path))?;

    output::success(&format!("Environment written to {}", path));
    Ok(())
}
