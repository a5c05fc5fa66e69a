use anyhow::{bail, Result};

use super::DeployerConfig;

pub fn validate(config: &DeployerConfig) -> Result<()> {
    let stack = &config.stack;

    for (key, value) in [
        ("stack.repository", &stack.repository),
        ("stack.branch", &stack.branch),
        ("stack.compose_file", &stack.compose_file),
        ("stack.env_file", &stack.env_file),
        ("stack.image", &stack.image),
    ] {
        if value.trim().is_empty() {
            bail!("{} cannot be empty", key);
        }
    }

    let nginx = &config.nginx;
    for (key, value) in [
        ("stack.path", &stack.path),
        ("nginx.main_conf", &nginx.main_conf),
        ("nginx.sites_available", &nginx.sites_available),
        ("nginx.sites_enabled", &nginx.sites_enabled),
        ("nginx.acme_root", &nginx.acme_root),
    ] {
        if !value.starts_with('/') {
            bail!("{} must be an absolute path, got '{}'", key, value);
        }
    }

    let answers = &config.answers;
    if let Some(ref scheme) = answers.scheme {
        match scheme.as_str() {
            "http" | "https" => {}
            other => bail!(
                "answers.scheme has invalid value '{}'. Supported: http, https",
                other
            ),
        }
    }

    if let Some(port) = answers.port {
        if port == 0 || port == 80 || port == 443 {
            bail!(
                "answers.port {} is not usable: nginx owns 80 and 443, and 0 is not a port",
                port
            );
        }
    }

    if let Some(ref domain) = answers.domain {
        if domain.trim().is_empty() || domain.contains(char::is_whitespace) {
            bail!("answers.domain '{}' is not a valid host name", domain);
        }
    }

    Ok(())
}
