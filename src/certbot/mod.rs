use crate::deploy::context::{DeployContext, Scheme};
use crate::host::{quote, Host};
use crate::output;

pub const CERTBOT_LOG: &str = "/var/log/letsencrypt/letsencrypt.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertOutcome {
    Issued,
    /// Plain HTTP was requested
    Skipped,
    /// Site stays reachable over plain HTTP
    Failed,
}

/// Obtain a certificate and let certbot rewrite the site to redirect HTTP
/// to HTTPS. Never fails the run.
pub async fn issue<H: Host>(host: &H, ctx: &DeployContext) -> CertOutcome {
    if ctx.settings.deployment.scheme == Scheme::Http {
        output::info("Scheme is http, skipping certificate");
        return CertOutcome::Skipped;
    }

    let domain = ctx.domain();
    let spinner = output::create_spinner(&format!("Requesting certificate for {}...", domain));

    let result = host
        .exec(&format!(
            "certbot --nginx -d {} --non-interactive --agree-tos -m {} --redirect",
            quote(domain),
            quote(&ctx.settings.admin.email)
        ))
        .await;

    spinner.finish_and_clear();

    match result {
        Ok(_) => {
            output::success(&format!("Certificate installed for {}", domain));
            CertOutcome::Issued
        }
        Err(e) => {
            tracing::warn!("certbot failed: {:#}", e);
            output::warning(&format!(
                "Certificate issuance failed; {} is served over plain HTTP. See {}",
                domain, CERTBOT_LOG
            ));
            CertOutcome::Failed
        }
    }
}
