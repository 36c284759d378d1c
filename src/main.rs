use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use fin_assist::api::{self, AppState, SourcePaths};
use fin_assist::config::AppConfig;
use fin_assist::llm::create_provider;
use fin_assist::service::{AiService, DataService};
use fin_assist::store::{Database, LibSqlBackend};
use fin_assist::telemetry::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let config = AppConfig::from_env()?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        db = %config.db_path.display(),
        bind = %config.bind,
        "Starting fin-assist"
    );

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );

    // ── LLM ──────────────────────────────────────────────────────────────
    let llm = match &config.llm {
        Some(llm_config) => Some(create_provider(llm_config)?),
        None => {
            tracing::warn!("OPENAI_API_KEY not set; AI endpoints are disabled");
            None
        }
    };

    let data = DataService::new(Arc::clone(&db));
    let ai = AiService::new(Arc::clone(&db), llm);

    if config.load_on_startup {
        match data
            .load_from_sources(&config.quickbooks_file, &config.rootfi_file)
            .await
        {
            Ok(report) => tracing::info!(
                total = report.total_records,
                "Loaded data files on startup"
            ),
            Err(e) => tracing::warn!(error = %e, "Startup data load failed"),
        }
    }

    // ── HTTP server ──────────────────────────────────────────────────────
    let state = AppState {
        data,
        ai,
        sources: SourcePaths {
            quickbooks: config.quickbooks_file.clone(),
            rootfi: config.rootfi_file.clone(),
        },
    };
    let app = api::router(state);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    tracing::info!(addr = %config.bind, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
