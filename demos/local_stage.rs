use std::error::Error;
use tracing::info;

use warehouse_stage::{with_stage, StageConfig, StageError, StageFactory};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let dir = std::env::temp_dir().join("warehouse-stage-demo");
    std::fs::create_dir_all(&dir)?;

    let config = StageConfig::local()
        .with_option("path", dir.to_string_lossy())
        .with_prefix("snowflake");
    let stage = StageFactory::from_config(config).await?;

    with_stage(stage, |stage| async move {
        stage
            .upload_bytes("report.csv", b"a,b,c\n1,2,3\n")
            .await?;

        for name in stage.list_bucket("report").await? {
            info!("Staged name={} uri={}", name, stage.uri_for(&name));
        }

        let bytes = stage.get_object("report.csv").await?;
        info!("Read back size={}", bytes.len());

        stage.delete_object("report.csv").await?;
        match stage.get_object("report.csv").await {
            Err(e) if e.is_not_found() => info!("Deleted report.csv"),
            other => info!("Unexpected result after delete: {:?}", other),
        }
        Ok::<_, StageError>(())
    })
    .await?;

    Ok(())
}
