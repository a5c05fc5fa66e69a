use anyhow::Result;

use crate::config::DeployerConfig;
use crate::nginx;

pub fn run(config: &DeployerConfig, domain: &str, port: u16) -> Result<()> {
    let site = nginx::render_site(
        domain,
        &format!("http://127.0.0.1:{}", port),
        &config.nginx.acme_root,
    )?;
    print!("{}", site);
    Ok(())
}
