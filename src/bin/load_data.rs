//! One-shot loader: parse both data files into the database and exit.

use std::sync::Arc;

use anyhow::Context;

use fin_assist::config::AppConfig;
use fin_assist::service::DataService;
use fin_assist::store::LibSqlBackend;
use fin_assist::telemetry::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = AppConfig::from_env()?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    let db = LibSqlBackend::new_local(&config.db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;
    let data = DataService::new(Arc::new(db));

    let report = data
        .load_from_sources(&config.quickbooks_file, &config.rootfi_file)
        .await
        .context("Failed to load financial data")?;

    println!("Loaded financial data into {}", config.db_path.display());
    println!("  QuickBooks records: {}", report.quickbooks_records);
    println!("  Rootfi records:     {}", report.rootfi_records);
    println!("  Total new records:  {}", report.total_records);
    Ok(())
}
