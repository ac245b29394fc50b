use accord_service::{build_router, ServiceConfig, ServiceState, StorageBackend};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StorageMode {
    File,
    Memory,
}

#[derive(Debug, Parser)]
#[command(name = "accordd", version, about = "Accord contract-completion REST service")]
struct Cli {
    /// TOML configuration file; missing file means defaults.
    #[arg(long, default_value = "accord/accord.toml", env = "ACCORD_CONFIG")]
    config: PathBuf,
    /// REST socket address to bind, e.g. 127.0.0.1:8094
    #[arg(long, env = "ACCORD_BIND")]
    listen: Option<SocketAddr>,
    #[arg(long, value_enum, env = "ACCORD_STORAGE")]
    storage: Option<StorageMode>,
    /// Directory holding sessions, documents and profiles for the file backend.
    #[arg(long, env = "ACCORD_DATA_DIR")]
    data_dir: Option<PathBuf>,
    /// Base url of the knowledge retrieval service.
    #[arg(long, env = "ACCORD_EXTRACTION_URL")]
    extraction_url: Option<String>,
    /// Base url of the compliance-policy service.
    #[arg(long, env = "ACCORD_COMPLIANCE_URL")]
    compliance_url: Option<String>,
    /// JSON employment records used when no retrieval service is configured.
    #[arg(long, env = "ACCORD_FIXTURES")]
    fixtures: Option<PathBuf>,
}

impl Cli {
    fn apply(self, mut config: ServiceConfig) -> ServiceConfig {
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(storage) = self.storage {
            config.storage = match storage {
                StorageMode::File => StorageBackend::File,
                StorageMode::Memory => StorageBackend::Memory,
            };
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if self.extraction_url.is_some() {
            config.extraction_url = self.extraction_url;
        }
        if self.compliance_url.is_some() {
            config.compliance_url = self.compliance_url;
        }
        if self.fixtures.is_some() {
            config.fixtures_path = self.fixtures;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "accord_service=info,accord_core=info,info".to_string()
        }))
        .init();

    let cli = Cli::parse();
    let config = ServiceConfig::load(&cli.config)?;
    let config = cli.apply(config);
    let listen = config.listen;

    let state = ServiceState::bootstrap(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!("accord-service REST listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
