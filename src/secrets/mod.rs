use anyhow::{Context, Result};

use crate::deploy::context::{DeployContext, DerivedSecrets};
use crate::error::DeployError;
use crate::host::{quote, Host};
use crate::output;

/// Laravel prints generated keys with this marker.
pub const APP_KEY_PREFIX: &str = "base64:";

/// Run the application image once to mint a fresh encryption key.
pub async fn derive<H: Host>(host: &H, ctx: &DeployContext) -> Result<DerivedSecrets> {
    let image = &ctx.config.stack.image;
    let spinner = output::create_spinner(&format!("Generating application key with {}...", image));

    let result = host
        .exec(&format!(
            "docker run --rm {} php artisan key:generate --show",
            quote(image)
        ))
        .await
        .with_context(|| format!("Failed to run {}", image));

    spinner.finish_and_clear();

    let app_key = extract_app_key(&result?).ok_or_else(|| DeployError::MissingAppKey {
        image: image.clone(),
        prefix: APP_KEY_PREFIX.to_string(),
    })?;

    output::success("Application key generated");
    Ok(DerivedSecrets { app_key })
}

/// The first `base64:...` token in the command output, without line endings.
pub fn extract_app_key(stdout: &str) -> Option<String> {
    let start = stdout.find(APP_KEY_PREFIX)?;
    let key: String = stdout[start..]
        .chars()
        .take_while(|c| !c.is_whitespace())
        .collect();

    (key.len() > APP_KEY_PREFIX.len()).then_some(key)
}
