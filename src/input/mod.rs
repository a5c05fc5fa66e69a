use anyhow::{Context, Result};
use dialoguer::Input;
use rand::RngCore;

use crate::config::Answers;
use crate::deploy::context::{
    AdminCredentials, DatabaseCredentials, DeploymentConfig, Scheme, Settings,
};
use crate::output;

pub const DEFAULT_DOMAIN: &str = "localhost";
pub const DEFAULT_PORT: u16 = 9001;
pub const DEFAULT_DB_NAME: &str = "ninja";
pub const DEFAULT_DB_USER: &str = "ninja";

/// A source of answers. Returning an empty string accepts the default.
pub trait Ask {
    fn ask(&mut self, prompt: &str, default: &str) -> Result<String>;
}

/// Prompts on the controlling terminal.
pub struct Terminal;

impl Ask for Terminal {
    fn ask(&mut self, prompt: &str, default: &str) -> Result<String> {
        Input::<String>::new()
            .with_prompt(prompt)
            .default(default.to_string())
            .allow_empty(true)
            .interact_text()
            .with_context(|| format!("Failed to read answer for '{}'", prompt))
    }
}

/// Accepts every default (`install --yes`).
pub struct Defaults;

impl Ask for Defaults {
    fn ask(&mut self, _prompt: &str, _default: &str) -> Result<String> {
        Ok(String::new())
    }
}

/// Blank input means the default.
pub fn resolve(answer: &str, default: &str) -> String {
    let answer = answer.trim();
    if answer.is_empty() {
        default.to_string()
    } else {
        answer.to_string()
    }
}

/// Keep only `[A-Za-z0-9._-]`, in order. Anything else would need quoting
/// in the env file or a shell.
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

/// `bytes` random bytes from the OS RNG, hex encoded
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Strip an accidental scheme or path from a domain answer
fn normalize_domain(value: &str) -> String {
    let value = value
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    value
        .split('/')
        .next()
        .unwrap_or(value)
        .to_ascii_lowercase()
}

/// A bare host name: `[A-Za-z0-9.-]`, not starting or ending with `.` or `-`.
/// Ends up in `server_name`, the site file name and `certbot -d`.
pub fn valid_domain(domain: &str) -> bool {
    !domain.is_empty()
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        && !domain.starts_with(['.', '-'])
        && !domain.ends_with(['.', '-'])
}

/// Loose address check, enough to keep the `.env` line intact.
fn valid_email(email: &str) -> bool {
    let Some((local, host)) = email.split_once('@') else {
        return false;
    };
    let breaks_env_line = |c: char| {
        c.is_whitespace() || c.is_control() || matches!(c, '#' | '"' | '\'' | '`' | '$' | '\\')
    };
    !local.is_empty() && valid_domain(host) && !email.chars().any(breaks_env_line)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "1" | "on" => Some(true),
        "n" | "no" | "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

struct Collector<'a, A: Ask> {
    ask: &'a mut A,
}

impl<A: Ask> Collector<'_, A> {
    fn text(&mut self, preset: Option<String>, prompt: &str, default: &str) -> Result<String> {
        let raw = match preset {
            Some(value) => value,
            None => self.ask.ask(prompt, default)?,
        };
        Ok(resolve(&raw, default))
    }

    fn secret(&mut self, preset: Option<String>, prompt: &str, default: &str) -> Result<String> {
        let value = sanitize(&self.text(preset, prompt, default)?);
        if value.is_empty() {
            output::warning(&format!(
                "{}: nothing usable left after sanitizing, using default",
                prompt
            ));
            return Ok(sanitize(default));
        }
        Ok(value)
    }

    fn port(&mut self, preset: Option<u16>, prompt: &str, default: u16) -> Result<u16> {
        let raw = self.text(preset.map(|p| p.to_string()), prompt, &default.to_string())?;
        match raw.parse::<u16>() {
            Ok(port) if port != 0 && port != 80 && port != 443 => Ok(port),
            _ => {
                output::warning(&format!(
                    "'{}' is not a usable internal port, using {}",
                    raw, default
                ));
                Ok(default)
            }
        }
    }

    fn flag(&mut self, preset: Option<bool>, prompt: &str, default: bool) -> Result<bool> {
        if let Some(value) = preset {
            return Ok(value);
        }
        let raw = self.text(None, prompt, yes_no(default))?;
        Ok(parse_bool(&raw).unwrap_or_else(|| {
            output::warning(&format!("'{}' is not yes/no, using {}", raw, yes_no(default)));
            default
        }))
    }
}

/// Gather every setting, one prompt per value unless preset in `answers`.
pub fn collect<A: Ask>(ask: &mut A, answers: &Answers) -> Result<Settings> {
    let mut c = Collector { ask };

    let domain_raw = c.text(answers.domain.clone(), "Domain", DEFAULT_DOMAIN)?;
    let domain = normalize_domain(&domain_raw);
    let domain = if valid_domain(&domain) {
        domain
    } else {
        output::warning(&format!(
            "'{}' is not a usable domain, using {}",
            domain_raw, DEFAULT_DOMAIN
        ));
        DEFAULT_DOMAIN.to_string()
    };

    let scheme_raw = c.text(answers.scheme.clone(), "Scheme (http/https)", "https")?;
    let scheme = Scheme::parse(&scheme_raw).unwrap_or_else(|| {
        output::warning(&format!("'{}' is not http or https, using https", scheme_raw));
        Scheme::Https
    });

    let internal_port = c.port(answers.port, "Internal port", DEFAULT_PORT)?;

    let database = DatabaseCredentials {
        name: c.secret(answers.db_name.clone(), "Database name", DEFAULT_DB_NAME)?,
        user: c.secret(answers.db_user.clone(), "Database user", DEFAULT_DB_USER)?,
        password: c.secret(answers.db_password.clone(), "Database password", &random_hex(16))?,
        root_password: c.secret(
            answers.db_root_password.clone(),
            "Database root password",
            &random_hex(16),
        )?,
    };

    let default_email = format!("admin@{}", domain);
    let email = c.text(answers.admin_email.clone(), "Admin email", &default_email)?;
    let email = if valid_email(&email) {
        email
    } else {
        output::warning(&format!(
            "'{}' is not a usable email address, using {}",
            email, default_email
        ));
        default_email
    };

    let admin = AdminCredentials {
        email,
        password: c.secret(answers.admin_password.clone(), "Admin password", &random_hex(16))?,
    };

    let debug = c.flag(answers.debug, "Enable debug mode", false)?;
    let require_https = c.flag(
        answers.require_https,
        "Require HTTPS",
        scheme == Scheme::Https,
    )?;

    Ok(Settings {
        deployment: DeploymentConfig {
            domain,
            scheme,
            internal_port,
            debug,
            require_https,
        },
        database,
        admin,
    })
}

#[cfg(test)]
pub mod testing {
    use std::collections::VecDeque;

    use super::*;

    /// Replays canned answers, then accepts defaults.
    pub struct Scripted {
        answers: VecDeque<String>,
        pub prompts: Vec<String>,
    }

    impl Scripted {
        pub fn new(answers: &[&str]) -> Self {
            Self {
                answers: answers.iter().map(|a| a.to_string()).collect(),
                prompts: Vec::new(),
            }
        }
    }

    impl Ask for Scripted {
        fn ask(&mut self, prompt: &str, _default: &str) -> Result<String> {
            self.prompts.push(prompt.to_string());
            Ok(self.answers.pop_front().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Scripted;
    use super::*;

    #[test]
    fn sanitize_keeps_only_allowed_characters_in_order() {
        assert_eq!(sanitize("p@ss w0rd!$`'\"_.-x"), "pssw0rd_.-x");
        assert_eq!(sanitize("already-safe_1.2"), "already-safe_1.2");
        assert_eq!(sanitize("ünïcødé"), "ncd");
    }

    #[test]
    fn blank_answer_resolves_to_default() {
        assert_eq!(resolve("", "ninja"), "ninja");
        assert_eq!(resolve("   ", "ninja"), "ninja");
        assert_eq!(resolve(" custom ", "ninja"), "custom");
    }

    #[test]
    fn random_hex_is_32_hex_chars_for_16_bytes() {
        let value = random_hex(16);
        assert_eq!(value.len(), 32);
        assert!(value.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(value, random_hex(16));
    }

    #[test]
    fn all_defaults() {
        let mut ask = Scripted::new(&[]);
        let settings = collect(&mut ask, &Answers::default()).unwrap();

        assert_eq!(settings.deployment.domain, DEFAULT_DOMAIN);
        assert_eq!(settings.deployment.scheme, Scheme::Https);
        assert_eq!(settings.deployment.internal_port, 9001);
        assert!(!settings.deployment.debug);
        assert!(settings.deployment.require_https);
        assert_eq!(settings.database.name, "ninja");
        assert_eq!(settings.database.user, "ninja");
        assert_eq!(settings.database.password.len(), 32);
        assert_eq!(settings.database.root_password.len(), 32);
        assert_eq!(settings.admin.password.len(), 32);
        assert_eq!(ask.prompts.len(), 11);
    }

    #[test]
    fn admin_email_defaults_to_admin_at_domain() {
        let mut ask = Scripted::new(&["invoice.example.com"]);
        let settings = collect(&mut ask, &Answers::default()).unwrap();

        assert_eq!(settings.admin.email, "admin@invoice.example.com");
    }

    #[test]
    fn secrets_are_sanitized() {
        let mut ask = Scripted::new(&[
            "demo.test",
            "",
            "",
            "my db",
            "us$er",
            "pa'ss;word",
            "",
            "",
            "s3cr3t!!",
        ]);
        let settings = collect(&mut ask, &Answers::default()).unwrap();

        assert_eq!(settings.database.name, "mydb");
        assert_eq!(settings.database.user, "user");
        assert_eq!(settings.database.password, "password");
        assert_eq!(settings.admin.password, "s3cr3t");
    }

    #[test]
    fn secret_that_sanitizes_to_nothing_uses_default() {
        let mut ask = Scripted::new(&["demo.test", "", "", "$$$"]);
        let settings = collect(&mut ask, &Answers::default()).unwrap();

        assert_eq!(settings.database.name, "ninja");
    }

    #[test]
    fn bad_port_and_scheme_fall_back() {
        let mut ask = Scripted::new(&["demo.test", "gopher", "eighty"]);
        let settings = collect(&mut ask, &Answers::default()).unwrap();

        assert_eq!(settings.deployment.scheme, Scheme::Https);
        assert_eq!(settings.deployment.internal_port, 9001);
    }

    #[test]
    fn http_scheme_defaults_require_https_off() {
        let mut ask = Scripted::new(&["demo.test", "http"]);
        let settings = collect(&mut ask, &Answers::default()).unwrap();

        assert!(!settings.deployment.require_https);
        assert_eq!(settings.deployment.app_url(), "http://demo.test/");
    }

    #[test]
    fn unusable_domain_falls_back_to_default() {
        for answer in ["demo test", "a;b", "demo.test:8080", "-demo.test", "..."] {
            let mut ask = Scripted::new(&[answer]);
            let settings = collect(&mut ask, &Answers::default()).unwrap();

            assert_eq!(settings.deployment.domain, DEFAULT_DOMAIN, "{}", answer);
            assert_eq!(settings.admin.email, "admin@localhost");
        }
    }

    #[test]
    fn valid_domains_pass() {
        assert!(valid_domain("invoice.example.com"));
        assert!(valid_domain("localhost"));
        assert!(valid_domain("my-host.example"));
        assert!(!valid_domain(""));
        assert!(!valid_domain("demo.test."));
    }

    #[test]
    fn unusable_admin_email_falls_back_to_admin_at_domain() {
        for answer in [
            "ops team@demo.test",
            "ops@demo.test #x",
            "no-at-sign",
            "ops@",
            "o'ps@demo.test",
        ] {
            let mut ask = Scripted::new(&["demo.test", "", "", "", "", "", "", answer]);
            let settings = collect(&mut ask, &Answers::default()).unwrap();

            assert_eq!(settings.admin.email, "admin@demo.test", "{}", answer);
        }
    }

    #[test]
    fn custom_admin_email_is_kept() {
        let mut ask =
            Scripted::new(&["demo.test", "", "", "", "", "", "", "billing+ops@demo.test"]);
        let settings = collect(&mut ask, &Answers::default()).unwrap();

        assert_eq!(settings.admin.email, "billing+ops@demo.test");
    }

    #[test]
    fn presets_skip_prompts() {
        let answers = Answers {
            domain: Some("https://Invoice.Example.com/".to_string()),
            port: Some(9100),
            debug: Some(true),
            ..Default::default()
        };
        let mut ask = Scripted::new(&[]);
        let settings = collect(&mut ask, &answers).unwrap();

        assert_eq!(settings.deployment.domain, "invoice.example.com");
        assert_eq!(settings.deployment.internal_port, 9100);
        assert!(settings.deployment.debug);
        assert!(!ask.prompts.iter().any(|p| p == "Domain"));
        assert!(!ask.prompts.iter().any(|p| p == "Internal port"));
        assert_eq!(ask.prompts.len(), 8);
    }
}
