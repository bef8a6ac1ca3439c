pub mod config;
pub mod error;
pub mod session;

pub use config::{ApiConfig, Config, FeedConfig, MapConfig, SearchConfig};
pub use error::{AppError, FeedError, NetworkError, ReqwestErrorExt};
pub use session::SessionToken;

use anyhow::Result;

/// Initialize the core application
pub fn init() -> Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Parkscope core initialized");
    Ok(())
}
