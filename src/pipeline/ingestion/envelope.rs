use crate::common::error::{PipelineError, Result};
use crate::pipeline::ingestion::batch::BatchId;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// One flat record as returned by the API. Key order is preserved.
pub type RawRecord = Map<String, Value>;

/// Ingestion metadata stored next to the raw records in every bronze file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BronzeMeta {
    pub source: String,
    pub source_url: String,
    pub ingested_at_utc: String,
    pub batch_id: BatchId,
    pub record_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_sha256: Option<String>,
}

/// The bronze file layout: `{"meta": {...}, "data": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BronzeEnvelope {
    pub meta: BronzeMeta,
    pub data: Vec<RawRecord>,
}

impl BronzeEnvelope {
    pub fn wrap(
        records: Vec<RawRecord>,
        source: &str,
        source_url: &str,
        ingested_at: DateTime<Utc>,
        payload_sha256: Option<String>,
    ) -> Self {
        Self {
            meta: BronzeMeta {
                source: source.to_string(),
                source_url: source_url.to_string(),
                ingested_at_utc: ingested_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                batch_id: BatchId::from_timestamp(ingested_at),
                record_count: records.len(),
                payload_sha256,
            },
            data: records,
        }
    }
}

/// Decode an API body into records. Anything other than an array of objects is rejected.
pub fn decode_records(bytes: &[u8]) -> Result<Vec<RawRecord>> {
    let value: Value = serde_json::from_slice(bytes)?;
    let Value::Array(items) = value else {
        return Err(PipelineError::InvalidPayload(format!(
            "expected a JSON array of records, got {}",
            json_kind(&value)
        )));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(record) => Ok(record),
            other => Err(PipelineError::InvalidPayload(format!(
                "record {} is {}, expected an object",
                i,
                json_kind(&other)
            ))),
        })
        .collect()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
