use thiserror::Error;

/// Conditions that stop the run outright. Host changes already applied
/// are left in place; rerunning the installer converges them.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("ninja-deploy must run as root (effective uid is {0})")]
    NotRoot(String),

    #[error("unsupported OS '{0}'. Supported: ubuntu, debian")]
    UnsupportedOs(String),

    #[error("the OS random number generator is unavailable: {0}")]
    NoEntropy(String),

    #[error("no '{prefix}' application key in the output of {image}")]
    MissingAppKey { image: String, prefix: String },

    #[error("nginx configuration test failed:\n{0}")]
    NginxConfigInvalid(String),

    #[error("nginx is not active after (re)start")]
    NginxInactive,
}
