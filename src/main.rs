use challenge_gateway::config::GatewayConfig;
use challenge_gateway::server::{self, Adapters, SessionStorage};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration
    #[arg(long)]
    listen_addr: Option<SocketAddr>,

    /// Path to persistent session database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Validate configuration and storage, print a summary and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("challenge_gateway=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = GatewayConfig::load(cli.config.as_deref()).into_diagnostic()?;
    if let Some(addr) = cli.listen_addr {
        config.listen_addr = addr;
    }
    if let Some(db_path) = cli.db_path {
        config.session_db_path = Some(db_path);
    }
    config.validate().into_diagnostic()?;

    let (sessions, storage) =
        server::open_session_store(config.session_db_path.as_deref()).into_diagnostic()?;
    if let SessionStorage::InMemoryFallback(_) = storage {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }

    let adapters = Adapters::http(&config, sessions).into_diagnostic()?;
    let state = server::build_state(&config, adapters).into_diagnostic()?;

    if cli.check {
        let toggles = config.toggles();
        println!("configuration ok");
        println!("listen_addr: {}", config.listen_addr);
        println!("public_base_url: {}", config.public_base_url);
        println!("session storage: {storage}");
        println!(
            "handlers: prefer_v2={} legacy_enabled={}",
            toggles.prefer_v2, toggles.legacy_enabled
        );
        println!("csp proxy: {}", state.actions.csp_proxy_enabled());
        println!("upstream timeout: {}ms", config.upstream.timeout_ms);
        return Ok(());
    }

    server::serve(config.listen_addr, state).await.into_diagnostic()?;
    Ok(())
}
