//! Normalize the latest bronze file into a silver parquet table.

use anyhow::{Context, Result};
use sidra_pipeline::app::stages::{bootstrap, run_stage, Stage};

#[tokio::main]
async fn main() -> Result<()> {
    let runtime = bootstrap().context("Failed to start pipeline")?;
    run_stage(&runtime, Stage::Normalize)
        .await
        .context("bronze-to-silver failed")?;
    Ok(())
}
