use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use analysis_workbench_service::Workbench;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "analysis_workbench_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Analysis Workbench Service v0.1.0");

    let database_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| "db.sqlite".to_string());
    let uploads_dir =
        std::env::var("UPLOADS_DIR").unwrap_or_else(|_| "data/uploads".to_string());

    info!("Configuration loaded:");
    info!("  Database path: {}", database_path);
    info!("  Uploads dir: {}", uploads_dir);

    let workbench = Workbench::new(&database_path, &uploads_dir)?;

    let datasets = workbench.store().list_datasets()?;
    info!("Catalog ready with {} dataset(s)", datasets.len());
    for dataset in &datasets {
        info!(
            "  {} — {} ({} rows x {} cols, {})",
            dataset.id, dataset.name, dataset.num_rows, dataset.num_cols, dataset.status
        );
    }

    Ok(())
}
