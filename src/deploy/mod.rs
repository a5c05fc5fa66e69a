pub mod context;
pub mod steps;

use anyhow::Result;

use crate::certbot::CertOutcome;
use crate::config::DeployerConfig;
use crate::host::Host;
use crate::input::Ask;
use crate::output;

use context::{DeployContext, Settings};

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct Report {
    pub settings: Settings,
    pub certificate: CertOutcome,
}

/// Provision the host top to bottom. Each stage relies on the previous
/// stage's effects; the first fatal error stops the run.
pub async fn run<H: Host, A: Ask>(host: &H, ask: &mut A, config: DeployerConfig) -> Result<Report> {
    output::banner("Installing Invoice Ninja");

    let release = steps::preflight(host).await?;
    let settings = steps::collect_settings(ask, &config.answers)?;
    let ctx = DeployContext::new(config, settings);

    steps::harden_firewall(host).await?;
    steps::install_docker(host, &release).await?;
    steps::sync_stack(host, &ctx).await?;
    steps::teardown_stack(host, &ctx).await?;
    steps::patch_ports(host, &ctx).await?;
    let secrets = steps::derive_secrets(host, &ctx).await?;
    steps::write_env(host, &ctx, &secrets).await?;
    steps::start_stack(host, &ctx).await?;
    steps::configure_nginx(host, &ctx).await?;
    let certificate = steps::issue_certificate(host, &ctx).await;

    Ok(Report {
        settings: ctx.settings,
        certificate,
    })
}

/// Where to reach the application and the credentials it was set up with.
pub fn print_summary(report: &Report) {
    let settings = &report.settings;
    let certificate = report.certificate;
    let url = match certificate {
        CertOutcome::Failed => format!("http://{}/", settings.deployment.domain),
        _ => settings.deployment.app_url(),
    };

    output::banner("Invoice Ninja is up");
    output::field("URL", &url);
    output::field("Internal URL", &settings.deployment.internal_url());
    output::field("Database", &settings.database.name);
    output::field("DB user", &settings.database.user);
    output::field("DB password", &settings.database.password);
    output::field("DB root password", &settings.database.root_password);
    output::field("Admin email", &settings.admin.email);
    output::field("Admin password", &settings.admin.password);

    if certificate == CertOutcome::Failed {
        println!();
        output::warning("No TLS certificate yet. Fix DNS, then run: certbot --nginx");
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeployError;
    use crate::host::fake::{FakeHost, Reply};
    use crate::input::testing::Scripted;

    const COMPOSE: &str = "services:\n  server:\n    image: nginx\n    ports:\n      - \"80:80\"\n  app:\n    image: invoiceninja/invoiceninja-debian\n";
    const NGINX_CONF: &str = "http {\n    include /etc/nginx/sites-enabled/*;\n}\n";
    const ENV: &str = "/opt/invoiceninja/.env";

    fn host() -> FakeHost {
        FakeHost::new()
            .stdout("id -u", "0\n")
            .stdout("key:generate", "base64:c2VjcmV0a2V5c2VjcmV0a2V5c2VjcmV0a2V5MTI=\n")
            .file("/etc/os-release", "ID=ubuntu\nVERSION_CODENAME=noble\n")
            .file("/opt/invoiceninja/docker-compose.yml", COMPOSE)
            .file("/etc/nginx/nginx.conf", NGINX_CONF)
    }

    fn position(host: &FakeHost, needle: &str) -> usize {
        host.commands()
            .iter()
            .position(|c| c.contains(needle))
            .unwrap_or_else(|| panic!("{} never ran", needle))
    }

    #[tokio::test]
    async fn defaults_end_to_end() {
        let host = host();
        let mut ask = Scripted::new(&["demo.test"]);

        let report = run(&host, &mut ask, DeployerConfig::default()).await.unwrap();

        let env = host.content(ENV).unwrap();
        assert!(env.contains("APP_URL=https://demo.test/\n"));
        assert!(env.contains("DB_DATABASE=ninja\n"));
        assert!(env.contains("APP_KEY=base64:c2VjcmV0a2V5c2VjcmV0a2V5c2VjcmV0a2V5MTI=\n"));

        let site = host.content("/etc/nginx/sites-available/demo.test").unwrap();
        assert!(site.contains("proxy_pass http://127.0.0.1:9001;"));

        let compose = host.content("/opt/invoiceninja/docker-compose.yml").unwrap();
        assert!(compose.contains("- \"127.0.0.1:9001:80\""));

        assert_eq!(report.certificate, CertOutcome::Issued);
        assert_eq!(report.settings.admin.email, "admin@demo.test");
        print_summary(&report);
    }

    #[tokio::test]
    async fn stages_run_in_dependency_order() {
        let host = host();
        let mut ask = Scripted::new(&["demo.test"]);

        run(&host, &mut ask, DeployerConfig::default()).await.unwrap();

        let order = [
            "ufw --force enable",
            "systemctl enable --now docker",
            "git clone",
            "write /opt/invoiceninja/docker-compose.yml",
            "key:generate",
            "write /opt/invoiceninja/.env",
            "docker compose up -d",
            "nginx -t",
            "certbot --nginx",
        ];
        let positions: Vec<usize> = order.iter().map(|n| position(&host, n)).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", positions);
    }

    #[tokio::test]
    async fn missing_app_key_aborts_before_env_file() {
        let host = host().stdout("key:generate", "Could not open input file: artisan\n");
        let mut ask = Scripted::new(&["demo.test"]);

        let err = run(&host, &mut ask, DeployerConfig::default()).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DeployError>(),
            Some(DeployError::MissingAppKey { .. })
        ));
        assert!(host.content(ENV).is_none());
        assert!(!host.ran("docker compose up"));
    }

    #[tokio::test]
    async fn certificate_failure_still_completes() {
        let host = host().reply("certbot --nginx", Reply::Fail);
        let mut ask = Scripted::new(&["demo.test"]);

        let report = run(&host, &mut ask, DeployerConfig::default()).await.unwrap();

        assert_eq!(report.certificate, CertOutcome::Failed);
        assert!(host.content("/etc/nginx/sites-available/demo.test").is_some());
        assert!(host.ran("ln -sfn '/etc/nginx/sites-available/demo.test'"));
    }

    #[tokio::test]
    async fn non_root_stops_before_prompting() {
        let host = host().stdout("id -u", "1000\n");
        let mut ask = Scripted::new(&["demo.test"]);

        let err = run(&host, &mut ask, DeployerConfig::default()).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DeployError>(),
            Some(DeployError::NotRoot(_))
        ));
        assert!(ask.prompts.is_empty());
        assert!(!host.ran("ufw"));
    }
}
