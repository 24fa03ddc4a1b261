//! Fetch the SIDRA table and land it as a bronze JSON file.

use anyhow::{Context, Result};
use sidra_pipeline::app::stages::{bootstrap, run_stage, Stage};

#[tokio::main]
async fn main() -> Result<()> {
    let runtime = bootstrap().context("Failed to start pipeline")?;
    run_stage(&runtime, Stage::Ingest)
        .await
        .context("ingest-bronze failed")?;
    Ok(())
}
