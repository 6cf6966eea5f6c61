//!
//! psicogate binary
//! ----------------
//! Command-line entry point: environment configuration with flag overrides,
//! logging setup, then the HTTP server.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use psicogate::config::GatewayConfig;

const USAGE: &str = "psicogate\n\nUSAGE:\n  psicogate [--http-port N] [--backend-url URL] [--static-dir PATH]\n\nOPTIONS:\n  --http-port N       HTTP port (env: PSICOGATE_HTTP_PORT, default 3000)\n  --backend-url URL   Backend base URL (env: BACKEND_URL or NEXT_PUBLIC_BACKEND_URL)\n  --static-dir PATH   Dashboard assets to serve (env: PSICOGATE_STATIC_DIR)\n  --help              Print this message\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(target: "psicogate", "psicogate {} starting: RUST_LOG='{}'", env!("CARGO_PKG_VERSION"), rust_log);

    let mut config = GatewayConfig::from_env().context("While loading configuration from the environment")?;
    config.apply_args(&args).context("While applying command-line overrides")?;

    psicogate::server::run(config).await
}
