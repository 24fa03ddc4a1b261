use crate::app::ports::HttpClientPort;
use crate::common::error::{PipelineError, Result};
use crate::config::{PipelineConfig, ProjectLayout};
use crate::infra::bronze_store::write_bronze;
use crate::observability::metrics;
use crate::pipeline::ingestion::batch::BatchId;
use crate::pipeline::ingestion::envelope::{decode_records, sha256_hex, BronzeEnvelope, RawRecord};
use crate::pipeline::storage::ArtifactPattern;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub batch_id: BatchId,
    pub path: PathBuf,
    pub record_count: usize,
    pub payload_bytes: usize,
    pub attempts: u32,
}

impl IngestReport {
    pub fn print_summary(&self) {
        println!("\n📥 Bronze written: {}", self.path.display());
        println!("   Records: {}", self.record_count);
        println!("   Batch: {}", self.batch_id);
        if self.attempts > 1 {
            println!("   Attempts: {}", self.attempts);
        }
    }
}

/// Fetch the source once (with retries) and land the payload as a bronze file.
pub struct IngestUseCase<H: HttpClientPort + ?Sized> {
    pub http: Box<H>,
    pub layout: ProjectLayout,
    pub config: PipelineConfig,
}

impl<H: HttpClientPort + ?Sized> IngestUseCase<H> {
    pub fn new(http: Box<H>, layout: ProjectLayout, config: PipelineConfig) -> Self {
        Self { http, layout, config }
    }

    pub async fn ingest(&self) -> Result<IngestReport> {
        self.ingest_at(Utc::now()).await
    }

    /// Same as [`IngestUseCase::ingest`] with an explicit ingestion time,
    /// which also fixes the batch id.
    #[instrument(skip(self), fields(dataset = %self.config.source.dataset))]
    pub async fn ingest_at(&self, now: DateTime<Utc>) -> Result<IngestReport> {
        let source = &self.config.source;
        let batch_id = BatchId::from_timestamp(now);
        let path = self
            .layout
            .bronze_dir()
            .join(ArtifactPattern::bronze(&source.dataset).file_name(&batch_id));

        // checked before fetching so a clash costs no request
        if path.exists() {
            return Err(PipelineError::AlreadyExists(path));
        }

        let url = source.url.as_str();
        let http = &*self.http;
        let attempts = AtomicU32::new(0);
        let (records, payload) = self
            .config
            .retry
            .policy()
            .run(|attempt| {
                attempts.store(attempt, Ordering::Relaxed);
                fetch_once(http, url)
            })
            .await
            .map_err(|e| PipelineError::FetchExhausted {
                url: url.to_string(),
                attempts: e.attempts,
                last_error: e.last_error,
            })?;

        metrics::fetch::payload(payload.len(), records.len());
        let envelope = BronzeEnvelope::wrap(
            records,
            &source.source_name,
            url,
            now,
            Some(sha256_hex(&payload)),
        );
        write_bronze(&path, &envelope)?;

        info!(
            records = envelope.meta.record_count,
            batch_id = %batch_id,
            "Bronze file written to {}",
            path.display()
        );
        Ok(IngestReport {
            batch_id,
            path,
            record_count: envelope.meta.record_count,
            payload_bytes: payload.len(),
            attempts: attempts.load(Ordering::Relaxed),
        })
    }
}

/// One GET. Transport errors, non-2xx statuses and undecodable bodies all fail the attempt.
async fn fetch_once<H: HttpClientPort + ?Sized>(
    http: &H,
    url: &str,
) -> std::result::Result<(Vec<RawRecord>, Vec<u8>), String> {
    metrics::fetch::attempt();
    let outcome: std::result::Result<(Vec<RawRecord>, Vec<u8>), String> = async {
        let resp = http.get(url).await?;
        if !resp.is_success() {
            return Err(format!("HTTP status {}", resp.status));
        }
        debug!(
            content_type = %resp.content_type,
            content_length = resp.content_length,
            "Fetched {} bytes",
            resp.bytes.len()
        );
        let records = decode_records(&resp.bytes).map_err(|e| e.to_string())?;
        Ok((records, resp.bytes))
    }
    .await;
    if outcome.is_err() {
        metrics::fetch::failure();
    }
    outcome
}
