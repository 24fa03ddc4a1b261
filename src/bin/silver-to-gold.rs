//! Aggregate the latest silver table into gold tables and CSV samples.

use anyhow::{Context, Result};
use sidra_pipeline::app::stages::{bootstrap, run_stage, Stage};

#[tokio::main]
async fn main() -> Result<()> {
    let runtime = bootstrap().context("Failed to start pipeline")?;
    run_stage(&runtime, Stage::Aggregate)
        .await
        .context("silver-to-gold failed")?;
    Ok(())
}
