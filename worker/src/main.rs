use anyhow::Result;
use common::wordcount::wordcount_app;
use tracing_subscriber::EnvFilter;

use worker::{HttpCoordinator, Worker, WorkerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("worker=debug,reqwest=info")),
        )
        .init();

    let config = WorkerConfig::from_env()?;
    let api = HttpCoordinator::new(config.master_url.clone());

    let summary = Worker::new(config, api, wordcount_app()).run().await?;
    println!(
        "maps={} reduces={} descartadas={} fallidas={}",
        summary.maps_accepted, summary.reduces_accepted, summary.discarded, summary.failed
    );
    Ok(())
}
