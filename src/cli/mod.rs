use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod init;
pub mod install;
pub mod patch;
pub mod site;

#[derive(Parser)]
#[command(
    name = "ninja-deploy",
    version,
    about = "Install Invoice Ninja on this host behind nginx with Let's Encrypt"
)]
pub struct Cli {
    /// Path to ninja-deploy.toml
    #[arg(short, long, default_value = "ninja-deploy.toml")]
    pub config: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Provision this host: firewall, Docker, stack, nginx, certificate
    Install {
        /// Accept every default without prompting
        #[arg(short, long)]
        yes: bool,
    },

    /// Scaffold ninja-deploy.toml in the current directory
    Init,

    /// Bind a compose file's public port 80 to loopback
    PatchCompose {
        /// Compose file to patch
        #[arg(short, long)]
        file: PathBuf,
        /// Loopback port to publish on
        #[arg(short, long, default_value_t = crate::input::DEFAULT_PORT)]
        port: u16,
        /// Print the patched file instead of writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the nginx site definition for a domain
    RenderSite {
        /// Domain the site answers for
        #[arg(short, long)]
        domain: String,
        /// Loopback port the stack listens on
        #[arg(short, long, default_value_t = crate::input::DEFAULT_PORT)]
        port: u16,
    },
}
