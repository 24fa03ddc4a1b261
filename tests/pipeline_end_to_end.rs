use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sidra_pipeline::app::aggregate_use_case::AggregateUseCase;
use sidra_pipeline::app::ingest_use_case::IngestUseCase;
use sidra_pipeline::app::normalize_use_case::NormalizeUseCase;
use sidra_pipeline::app::ports::{HttpClientPort, HttpGetResult};
use sidra_pipeline::config::{PipelineConfig, ProjectLayout, RetryConfig};
use sidra_pipeline::infra::bronze_store::read_bronze;
use sidra_pipeline::infra::parquet_io::read_table;
use sidra_pipeline::pipeline::processing::table::ColumnData;
use sidra_pipeline::PipelineError;
use std::fs;
use tempfile::tempdir;

const SIDRA_BODY: &str = r#"[
    {"D1N":"2020","D3N":"Acre","V":"100"},
    {"D1N":"2020","D3N":"Bahia","V":"200"},
    {"D1N":"2020","D3N":"Variável","V":"0"}
]"#;

struct FixedHttp(&'static str);

#[async_trait]
impl HttpClientPort for FixedHttp {
    async fn get(&self, _url: &str) -> Result<HttpGetResult, String> {
        Ok(HttpGetResult {
            status: 200,
            bytes: self.0.as_bytes().to_vec(),
            content_type: "application/json; charset=utf-8".to_string(),
            content_length: self.0.len() as u64,
        })
    }
}

fn test_config() -> PipelineConfig {
    PipelineConfig {
        retry: RetryConfig {
            max_attempts: 2,
            backoff_base_ms: 0,
            backoff_cap_ms: 0,
        },
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn bronze_to_gold_for_sidra_sample() -> Result<()> {
    let root = tempdir()?;
    let layout = ProjectLayout::new(root.path());
    let config = test_config();
    let ingested_at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();

    let ingest = IngestUseCase::new(Box::new(FixedHttp(SIDRA_BODY)), layout.clone(), config.clone());
    let bronze = ingest.ingest_at(ingested_at).await?;
    assert_eq!(bronze.record_count, 3);
    let meta = read_bronze(&bronze.path)?.meta;
    assert_eq!(meta.batch_id.as_str(), "20250314T092653Z");

    let silver = NormalizeUseCase::new(layout.clone(), config.clone()).run()?;
    assert_eq!(silver.rows, 3);
    assert_eq!(
        silver.columns,
        vec!["d1n", "d3n", "v", "batch_id", "ingested_at", "source_url"]
    );
    let silver_table = read_table(&silver.output)?;
    assert_eq!(
        silver_table.column("v").unwrap().data,
        ColumnData::Int64(vec![Some(100), Some(200), Some(0)])
    );

    let gold = AggregateUseCase::new(layout.clone(), config).run()?;
    assert_eq!(gold.batch_id, meta.batch_id);
    assert!(gold
        .locality_path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .contains(meta.batch_id.as_str()));

    let locality = read_table(&gold.locality_path)?;
    assert_eq!(locality.num_rows(), 2);
    assert_eq!(
        locality.column("locality").unwrap().data,
        ColumnData::Utf8(vec![Some("Acre".into()), Some("Bahia".into())])
    );
    assert_eq!(
        locality.column("value_total").unwrap().data,
        ColumnData::Float64(vec![Some(100.0), Some(200.0)])
    );

    let nationwide = read_table(&gold.nationwide_path)?;
    assert_eq!(nationwide.num_rows(), 1);
    assert_eq!(
        nationwide.column("period").unwrap().data,
        ColumnData::Int64(vec![Some(2020)])
    );
    assert_eq!(
        nationwide.column("value_total").unwrap().data,
        ColumnData::Float64(vec![Some(300.0)])
    );

    assert!(layout.docs_dir().join("gold_locality_sample.csv").is_file());
    assert!(layout.docs_dir().join("gold_nationwide_sample.csv").is_file());
    Ok(())
}

#[tokio::test]
async fn rerunning_aggregate_is_byte_identical() -> Result<()> {
    let root = tempdir()?;
    let layout = ProjectLayout::new(root.path());
    let config = test_config();
    let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();

    IngestUseCase::new(Box::new(FixedHttp(SIDRA_BODY)), layout.clone(), config.clone())
        .ingest_at(at)
        .await?;
    NormalizeUseCase::new(layout.clone(), config.clone()).run()?;

    let aggregate = AggregateUseCase::new(layout.clone(), config);
    let first = aggregate.run()?;
    let snapshot = [
        fs::read(&first.locality_path)?,
        fs::read(&first.nationwide_path)?,
        fs::read(&first.locality_sample)?,
        fs::read(&first.nationwide_sample)?,
    ];

    let second = aggregate.run()?;
    assert_eq!(first.locality_path, second.locality_path);
    assert_eq!(fs::read(&second.locality_path)?, snapshot[0]);
    assert_eq!(fs::read(&second.nationwide_path)?, snapshot[1]);
    assert_eq!(fs::read(&second.locality_sample)?, snapshot[2]);
    assert_eq!(fs::read(&second.nationwide_sample)?, snapshot[3]);
    Ok(())
}

#[tokio::test]
async fn later_batches_supersede_earlier_ones() -> Result<()> {
    let root = tempdir()?;
    let layout = ProjectLayout::new(root.path());
    let config = test_config();

    let older = r#"[{"D1N":"2019","D3N":"Acre","V":"1"}]"#;
    IngestUseCase::new(Box::new(FixedHttp(older)), layout.clone(), config.clone())
        .ingest_at(Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap())
        .await?;
    IngestUseCase::new(Box::new(FixedHttp(SIDRA_BODY)), layout.clone(), config.clone())
        .ingest_at(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        .await?;

    let silver = NormalizeUseCase::new(layout.clone(), config.clone()).run()?;
    assert_eq!(silver.batch_id.as_str(), "20250101T000000Z");
    assert_eq!(silver.rows, 3);

    let gold = AggregateUseCase::new(layout, config).run()?;
    assert_eq!(gold.nationwide_rows, 1);
    Ok(())
}

#[test]
fn stages_without_input_report_no_input() {
    let root = tempdir().unwrap();
    let layout = ProjectLayout::new(root.path());

    let normalize = NormalizeUseCase::new(layout.clone(), PipelineConfig::default()).run();
    assert!(matches!(normalize, Err(PipelineError::NoInput { .. })));

    let aggregate = AggregateUseCase::new(layout, PipelineConfig::default()).run();
    assert!(matches!(aggregate, Err(PipelineError::NoInput { .. })));
}

#[tokio::test]
async fn unreachable_source_leaves_no_bronze() -> Result<()> {
    struct DownHttp;

    #[async_trait]
    impl HttpClientPort for DownHttp {
        async fn get(&self, _url: &str) -> Result<HttpGetResult, String> {
            Err("connection refused".to_string())
        }
    }

    let root = tempdir()?;
    let layout = ProjectLayout::new(root.path());
    let err = IngestUseCase::new(Box::new(DownHttp), layout.clone(), test_config())
        .ingest_at(Utc::now())
        .await
        .unwrap_err();

    match err {
        PipelineError::FetchExhausted { attempts, last_error, url } => {
            assert_eq!(attempts, 2);
            assert_eq!(last_error, "connection refused");
            assert!(url.starts_with("https://apisidra.ibge.gov.br/"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!layout.bronze_dir().exists());
    Ok(())
}
