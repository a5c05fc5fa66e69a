use anyhow::Result;

use crate::config::DeployerConfig;
use crate::deploy;
use crate::host::LocalHost;
use crate::input::{Defaults, Terminal};

pub async fn run(config: DeployerConfig, yes: bool) -> Result<()> {
    let host = LocalHost::new();

    let report = if yes {
        deploy::run(&host, &mut Defaults, config).await?
    } else {
        deploy::run(&host, &mut Terminal, config).await?
    };

    deploy::print_summary(&report);
    Ok(())
}
