use std::{net::SocketAddr, sync::Arc};

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clouddns_webhook::{
    backend::DnsBackend,
    config::{BackendKind, Config},
    google::GoogleCloudDns,
    handlers::{self, AppState},
    inmemory::InMemoryDns,
    provider::CloudDnsProvider,
};

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(e) => {
            let default = "server=debug,clouddns_webhook=debug,tower_http=debug";
            eprintln!("[tracing] RUST_LOG not set or invalid ({e}), defaulting to: {default}");
            EnvFilter::new(default)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(false)
                .with_ansi(true),
        )
        .init();

    let cfg = Config::from_env()?;
    let settings = cfg.provider_settings()?;

    info!("Backend      : {:?}", cfg.provider);
    info!(
        "Domain filter: {}",
        if cfg.domain_filter.is_empty() { "(all zones)" } else { &cfg.domain_filter }
    );
    info!("Batch size   : {} every {}ms", settings.batch_size, settings.batch_interval.as_millis());
    info!("Dry run      : {}", settings.dry_run);

    let backend: Arc<dyn DnsBackend> = match cfg.provider {
        BackendKind::Google => {
            let google = GoogleCloudDns::connect(cfg.google_settings()).await?;
            info!("Project      : {}", google.project());
            Arc::new(google)
        }
        BackendKind::InMemory => Arc::new(InMemoryDns::from_domains(cfg.inmemory_zone_list())),
    };

    let provider = CloudDnsProvider::new(backend, settings).await?;
    let state = AppState {
        provider: Arc::new(provider),
        apply_timeout: cfg.apply_timeout(),
    };

    let app = handlers::app(state, &cfg.webhook_prefix);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    info!("Listening on {addr} (prefix '{}')", cfg.webhook_prefix);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
