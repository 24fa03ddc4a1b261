use crate::common::error::Result;
use crate::config::{PipelineConfig, ProjectLayout};
use crate::infra::bronze_store::read_bronze;
use crate::infra::parquet_io::write_table;
use crate::observability::metrics;
use crate::pipeline::ingestion::batch::BatchId;
use crate::pipeline::processing::normalize::build_silver_table;
use crate::pipeline::storage::{latest_artifact, ArtifactPattern};
use std::path::PathBuf;
use tracing::{info, instrument, warn};

const SUMMARY_COLUMNS: usize = 12;

#[derive(Debug, Clone)]
pub struct NormalizeReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub batch_id: BatchId,
    pub rows: usize,
    pub columns: Vec<String>,
}

impl NormalizeReport {
    pub fn print_summary(&self) {
        println!("\n🧹 Silver written: {}", self.output.display());
        println!("   Rows: {} | Columns: {}", self.rows, self.columns.len());
        let sample: Vec<&str> = self
            .columns
            .iter()
            .take(SUMMARY_COLUMNS)
            .map(String::as_str)
            .collect();
        println!("   Column sample: {:?}", sample);
    }
}

/// Turn the latest bronze file into a typed silver parquet table.
pub struct NormalizeUseCase {
    pub layout: ProjectLayout,
    pub config: PipelineConfig,
}

impl NormalizeUseCase {
    pub fn new(layout: ProjectLayout, config: PipelineConfig) -> Self {
        Self { layout, config }
    }

    #[instrument(skip(self), fields(dataset = %self.config.source.dataset))]
    pub fn run(&self) -> Result<NormalizeReport> {
        let dataset = &self.config.source.dataset;
        let (input, file_batch) =
            latest_artifact(&self.layout.bronze_dir(), &ArtifactPattern::bronze(dataset))?;
        info!("Normalizing {}", input.display());

        let envelope = read_bronze(&input)?;
        let meta = &envelope.meta;
        if meta.record_count != envelope.data.len() {
            warn!(
                "meta.record_count is {} but the file holds {} records",
                meta.record_count,
                envelope.data.len()
            );
        }
        if meta.batch_id != file_batch {
            warn!(
                "Bronze file name says batch {} but meta says {}; using meta",
                file_batch, meta.batch_id
            );
        }

        let table = build_silver_table(&envelope)?;
        let output = self
            .layout
            .silver_dir()
            .join(ArtifactPattern::silver(dataset).file_name(&meta.batch_id));
        write_table(&output, &table)?;
        metrics::normalize::rows(table.num_rows());

        info!(
            rows = table.num_rows(),
            columns = table.num_columns(),
            "Silver table written to {}",
            output.display()
        );
        Ok(NormalizeReport {
            input,
            output,
            batch_id: meta.batch_id.clone(),
            rows: table.num_rows(),
            columns: table.column_names(),
        })
    }
}
