use std::fmt;

use crate::config::DeployerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Some(Scheme::Http),
            "https" => Some(Scheme::Https),
            _ => None,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => f.write_str("http"),
            Scheme::Https => f.write_str("https"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentConfig {
    pub domain: String,
    pub scheme: Scheme,
    pub internal_port: u16,
    pub debug: bool,
    pub require_https: bool,
}

impl DeploymentConfig {
    /// Public URL the application advertises, e.g. `https://demo.test/`
    pub fn app_url(&self) -> String {
        format!("{}://{}/", self.scheme, self.domain)
    }

    /// Loopback address nginx proxies to
    pub fn internal_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.internal_port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseCredentials {
    pub name: String,
    pub user: String,
    pub password: String,
    pub root_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

/// Values produced by running the application image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedSecrets {
    pub app_key: String,
}

/// Everything collected from the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub deployment: DeploymentConfig,
    pub database: DatabaseCredentials,
    pub admin: AdminCredentials,
}

pub struct DeployContext {
    pub config: DeployerConfig,
    pub settings: Settings,
}

impl DeployContext {
    pub fn new(config: DeployerConfig, settings: Settings) -> Self {
        Self { config, settings }
    }

    pub fn domain(&self) -> &str {
        &self.settings.deployment.domain
    }

    pub fn internal_port(&self) -> u16 {
        self.settings.deployment.internal_port
    }

    pub fn stack_path(&self) -> &str {
        &self.config.stack.path
    }

    /// Shell prefix that runs a command from the stack checkout
    pub fn in_stack(&self, cmd: &str) -> String {
        format!("cd {} && {}", crate::host::quote(self.stack_path()), cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_follow_scheme_and_port() {
        let deployment = DeploymentConfig {
            domain: "demo.test".to_string(),
            scheme: Scheme::Https,
            internal_port: 9001,
            debug: false,
            require_https: true,
        };

        assert_eq!(deployment.app_url(), "https://demo.test/");
        assert_eq!(deployment.internal_url(), "http://127.0.0.1:9001");
    }

    #[test]
    fn scheme_parse_is_case_insensitive() {
        assert_eq!(Scheme::parse("HTTPS"), Some(Scheme::Https));
        assert_eq!(Scheme::parse(" http "), Some(Scheme::Http));
        assert_eq!(Scheme::parse("gopher"), None);
    }
}
