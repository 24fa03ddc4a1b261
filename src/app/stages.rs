use crate::app::aggregate_use_case::AggregateUseCase;
use crate::app::ingest_use_case::IngestUseCase;
use crate::app::normalize_use_case::NormalizeUseCase;
use crate::common::error::Result;
use crate::config::{PipelineConfig, ProjectLayout};
use crate::infra::ReqwestHttp;
use crate::observability::{init_logging, init_metrics, metrics, push_to_gateway};
use metrics_exporter_prometheus::PrometheusHandle;
use std::fmt;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use tracing_appender::non_blocking::WorkerGuard;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Normalize,
    Aggregate,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Ingest, Stage::Normalize, Stage::Aggregate];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Normalize => "normalize",
            Stage::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide state shared by every stage of one invocation.
pub struct Runtime {
    pub layout: ProjectLayout,
    pub config: PipelineConfig,
    metrics: Option<PrometheusHandle>,
    _log_guard: WorkerGuard,
}

/// Load `.env`, resolve the project root, start logging and metrics, read `pipeline.toml`.
pub fn bootstrap() -> Result<Runtime> {
    dotenv::dotenv().ok();
    let layout = ProjectLayout::resolve()?;
    let log_guard = init_logging(&layout.logs_dir());
    let metrics = init_metrics();
    let config = PipelineConfig::load(&layout)?;
    info!(root = %layout.root().display(), "Pipeline configured");
    Ok(Runtime {
        layout,
        config,
        metrics,
        _log_guard: log_guard,
    })
}

/// Run one stage inside its own span and print its summary.
pub async fn run_stage(runtime: &Runtime, stage: Stage) -> Result<()> {
    let run_id = Uuid::new_v4();
    let span = info_span!("stage", stage = stage.as_str(), run_id = %run_id);
    let started = Instant::now();

    let outcome: Result<()> = async {
        info!("Starting stage");
        let layout = runtime.layout.clone();
        let config = runtime.config.clone();
        match stage {
            Stage::Ingest => {
                let http = ReqwestHttp::new(config.source.timeout())?;
                let use_case = IngestUseCase::new(Box::new(http), layout, config);
                use_case.ingest().await?.print_summary();
            }
            Stage::Normalize => NormalizeUseCase::new(layout, config).run()?.print_summary(),
            Stage::Aggregate => AggregateUseCase::new(layout, config).run()?.print_summary(),
        }
        Ok(())
    }
    .instrument(span.clone())
    .await;

    let elapsed = started.elapsed().as_secs_f64();
    metrics::stage::duration(stage.as_str(), elapsed);
    span.in_scope(|| match &outcome {
        Ok(()) => info!(elapsed_secs = elapsed, "Stage finished"),
        Err(e) => {
            metrics::stage::failure(stage.as_str());
            error!(elapsed_secs = elapsed, "Stage failed: {}", e);
        }
    });
    let pushed = push_to_gateway(runtime.metrics.as_ref(), stage.as_str())
        .instrument(span.clone())
        .await;
    if let Err(e) = pushed {
        span.in_scope(|| warn!("Failed to push metrics to Pushgateway: {}", e));
    }
    outcome
}

/// Ingest, normalize and aggregate in order, stopping at the first failure.
pub async fn run_all(runtime: &Runtime) -> Result<()> {
    for stage in Stage::ALL {
        run_stage(runtime, stage).await?;
    }
    Ok(())
}
