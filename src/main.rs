use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sidra_pipeline::app::stages::{bootstrap, run_all, run_stage, Stage};

#[derive(Parser)]
#[command(name = "sidra-pipeline")]
#[command(about = "Bronze, silver and gold pipeline for IBGE SIDRA table 6579")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the source and write a new bronze file
    Ingest,
    /// Normalize the latest bronze file into silver
    Normalize,
    /// Aggregate the latest silver table into gold
    Aggregate,
    /// Run ingest, normalize and aggregate in order
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let runtime = bootstrap().context("Failed to start pipeline")?;

    match cli.command {
        Commands::Ingest => run_stage(&runtime, Stage::Ingest).await?,
        Commands::Normalize => run_stage(&runtime, Stage::Normalize).await?,
        Commands::Aggregate => run_stage(&runtime, Stage::Aggregate).await?,
        Commands::Run => {
            println!("🔄 Running full pipeline...");
            run_all(&runtime).await?;
            println!("\n✅ Pipeline complete");
        }
    }
    Ok(())
}
