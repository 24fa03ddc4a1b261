use crate::common::constants::{LOCALITY_SAMPLE_FILE, NATIONWIDE_SAMPLE_FILE};
use crate::common::error::Result;
use crate::config::{PipelineConfig, ProjectLayout};
use crate::infra::csv_sample::write_head_csv;
use crate::infra::parquet_io::{read_table, write_table};
use crate::observability::metrics;
use crate::pipeline::ingestion::batch::BatchId;
use crate::pipeline::processing::aggregate::{aggregate, resolve_batch_id, AggregateStats};
use crate::pipeline::processing::table::Table;
use crate::pipeline::storage::{latest_artifact, ArtifactPattern};
use std::path::PathBuf;
use tracing::{debug, info, instrument};

const PREVIEW_ROWS: usize = 10;

#[derive(Debug, Clone)]
pub struct AggregateReport {
    pub input: PathBuf,
    pub input_rows: usize,
    pub input_columns: usize,
    pub batch_id: BatchId,
    pub locality_path: PathBuf,
    pub nationwide_path: PathBuf,
    pub locality_sample: PathBuf,
    pub nationwide_sample: PathBuf,
    pub locality_rows: usize,
    pub nationwide_rows: usize,
    pub stats: AggregateStats,
    pub locality_preview: Table,
    pub nationwide_preview: Table,
}

impl AggregateReport {
    pub fn print_summary(&self) {
        let input_name = self
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("\n🏅 Gold built from {}", input_name);
        println!("   Silver rows: {} | Columns: {}", self.input_rows, self.input_columns);
        println!("   Locality table: {} ({} rows)", self.locality_path.display(), self.locality_rows);
        println!("   Nationwide table: {} ({} rows)", self.nationwide_path.display(), self.nationwide_rows);
        println!("   Samples: {}, {}", self.locality_sample.display(), self.nationwide_sample.display());
        println!("\nLocality preview:\n{}", self.locality_preview);
        println!("Nationwide:\n{}", self.nationwide_preview);
    }
}

/// Sum the latest silver table into the two gold tables plus CSV samples.
pub struct AggregateUseCase {
    pub layout: ProjectLayout,
    pub config: PipelineConfig,
}

impl AggregateUseCase {
    pub fn new(layout: ProjectLayout, config: PipelineConfig) -> Self {
        Self { layout, config }
    }

    #[instrument(skip(self), fields(dataset = %self.config.source.dataset))]
    pub fn run(&self) -> Result<AggregateReport> {
        let dataset = &self.config.source.dataset;
        let (input, file_batch) =
            latest_artifact(&self.layout.silver_dir(), &ArtifactPattern::silver(dataset))?;
        info!("Aggregating {}", input.display());

        let silver = read_table(&input)?;
        let gold = aggregate(&silver, &self.config.dimensions)?;
        let batch_id = resolve_batch_id(&silver, &file_batch);

        let stats = &gold.stats;
        if stats.values_coerced_to_missing > 0 {
            debug!(
                "{} non-numeric values in '{}' treated as missing",
                stats.values_coerced_to_missing, self.config.dimensions.value
            );
        }
        metrics::aggregate::sentinel_dropped(stats.sentinel_rows_dropped);
        metrics::aggregate::coerced_to_missing(stats.values_coerced_to_missing);

        let locality = gold.locality_table()?;
        let nationwide = gold.nationwide_table()?;

        let gold_dir = self.layout.gold_dir();
        let locality_path = gold_dir.join(ArtifactPattern::gold_locality(dataset).file_name(&batch_id));
        let nationwide_path =
            gold_dir.join(ArtifactPattern::gold_nationwide(dataset).file_name(&batch_id));
        write_table(&locality_path, &locality)?;
        write_table(&nationwide_path, &nationwide)?;
        metrics::aggregate::gold_rows("locality", locality.num_rows());
        metrics::aggregate::gold_rows("nationwide", nationwide.num_rows());

        let docs = self.layout.docs_dir();
        let locality_sample = docs.join(LOCALITY_SAMPLE_FILE);
        let nationwide_sample = docs.join(NATIONWIDE_SAMPLE_FILE);
        write_head_csv(&locality_sample, &locality, self.config.samples.locality_rows)?;
        write_head_csv(&nationwide_sample, &nationwide, self.config.samples.nationwide_rows)?;

        info!(
            batch_id = %batch_id,
            locality_rows = locality.num_rows(),
            nationwide_rows = nationwide.num_rows(),
            "Gold tables written to {}",
            gold_dir.display()
        );
        Ok(AggregateReport {
            input,
            input_rows: silver.num_rows(),
            input_columns: silver.num_columns(),
            batch_id,
            locality_path,
            nationwide_path,
            locality_sample,
            nationwide_sample,
            locality_rows: locality.num_rows(),
            nationwide_rows: nationwide.num_rows(),
            stats: gold.stats.clone(),
            locality_preview: locality.head(PREVIEW_ROWS),
            nationwide_preview: nationwide,
        })
    }
}
