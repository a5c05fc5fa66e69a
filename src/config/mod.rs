use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod validate;

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct DeployerConfig {
    #[serde(default)]
    pub stack: StackConfig,
    #[serde(default)]
    pub nginx: NginxConfig,
    #[serde(default)]
    pub answers: Answers,
}

/// Where the compose stack comes from and where it lives on the host.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StackConfig {
    #[serde(default = "default_repository")]
    pub repository: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default = "default_compose_file")]
    pub compose_file: String,
    #[serde(default = "default_env_file")]
    pub env_file: String,
    #[serde(default = "default_image")]
    pub image: String,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            branch: default_branch(),
            path: default_path(),
            compose_file: default_compose_file(),
            env_file: default_env_file(),
            image: default_image(),
        }
    }
}

fn default_repository() -> String {
    "https://github.com/invoiceninja/dockerfiles.git".to_string()
}

fn default_branch() -> String {
    "debian".to_string()
}

fn default_path() -> String {
    "/opt/invoiceninja".to_string()
}

fn default_compose_file() -> String {
    "docker-compose.yml".to_string()
}

fn default_env_file() -> String {
    ".env".to_string()
}

fn default_image() -> String {
    "invoiceninja/invoiceninja-debian:latest".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NginxConfig {
    #[serde(default = "default_main_conf")]
    pub main_conf: String,
    #[serde(default = "default_sites_available")]
    pub sites_available: String,
    #[serde(default = "default_sites_enabled")]
    pub sites_enabled: String,
    #[serde(default = "default_acme_root")]
    pub acme_root: String,
}

impl Default for NginxConfig {
    fn default() -> Self {
        Self {
            main_conf: default_main_conf(),
            sites_available: default_sites_available(),
            sites_enabled: default_sites_enabled(),
            acme_root: default_acme_root(),
        }
    }
}

fn default_main_conf() -> String {
    "/etc/nginx/nginx.conf".to_string()
}
fn default_sites_available() -> String {
    "/etc/nginx/sites-available".to_string()
}
fn default_sites_enabled() -> String {
    "/etc/nginx/sites-enabled".to_string()
}
fn default_acme_root() -> String {
    "/var/www/certbot".to_string()
}

/// Preset answers. A value present here is used instead of prompting.
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Answers {
    pub domain: Option<String>,
    pub scheme: Option<String>,
    pub port: Option<u16>,
    pub db_name: Option<String>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    pub db_root_password: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub debug: Option<bool>,
    pub require_https: Option<bool>,
}

impl DeployerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        validate::validate(&config)?;

        Ok(config)
    }

    /// Load `path` if it exists, built-in defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn compose_path(&self) -> String {
        format!("{}/{}", self.stack.path, self.stack.compose_file)
    }

    pub fn env_path(&self) -> String {
        format!("{}/{}", self.stack.path, self.stack.env_file)
    }

    pub fn site_available(&self, domain: &str) -> String {
        format!("{}/{}", self.nginx.sites_available, domain)
    }

    pub fn site_enabled(&self, domain: &str) -> String {
        format!("{}/{}", self.nginx.sites_enabled, domain)
    }
}
