/// HerdWatch - livestock image analysis service
///
/// Accepts image uploads from authenticated owners, has an external
/// classifier diagnose them, and serves per-owner dashboard statistics.

mod api;
mod auth;
mod classifier;
mod config;
mod context;
mod db;
mod error;
mod file_store;
mod metrics;
mod records;
mod server;
mod stats;
mod upload;

#[cfg(test)]
mod test_support;

use config::{LogFormat, ServerConfig};
use context::AppContext;
use error::HerdResult;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> HerdResult<()> {
    // Load configuration
    let config = ServerConfig::from_env()?;

    // Initialize logging
    init_tracing(&config);

    // Print banner
    print_banner();

    // Create application context
    let ctx = AppContext::new(config).await?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}

fn init_tracing(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| "herdwatch=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn print_banner() {
    println!(
        r#"
    __  __              ___       __      __       __
   / / / /__  _________/ / |     / /___ _/ /______/ /_
  / /_/ / _ \/ ___/ __  /| | /| / / __ `/ __/ ___/ __ \
 / __  /  __/ /  / /_/ / | |/ |/ / /_/ / /_/ /__/ / / /
/_/ /_/\___/_/   \__,_/  |__/|__/\__,_/\__/\___/_/ /_/

        Livestock Image Analysis Service v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
