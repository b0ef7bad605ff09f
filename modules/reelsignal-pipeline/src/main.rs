use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use reelsignal_common::types::PipelineStatus;
use reelsignal_common::PipelineConfig;
use reelsignal_pipeline::Pipeline;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("reelsignal=info")),
        )
        .init();

    let config = PipelineConfig::from_env();
    info!(video = %config.video_ref, title = %config.title, regions = config.regions.len(), "Starting campaign run");

    let pipeline = Pipeline::new(config)?;

    let mut progress = pipeline.subscribe();
    let reporter = tokio::spawn(async move {
        while let Ok(event) = progress.recv().await {
            info!(stage = %event.stage, "Pipeline progress");
        }
    });

    let campaign = pipeline.run().await?;
    reporter.abort();

    println!("{}", serde_json::to_string_pretty(&campaign)?);

    if let PipelineStatus::Failed { reason } = &campaign.pipeline_status {
        anyhow::bail!("campaign run failed: {reason}");
    }
    Ok(())
}
