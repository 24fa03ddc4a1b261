use crate::common::error::{PipelineError, Result};
use crate::pipeline::ingestion::envelope::BronzeEnvelope;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write `envelope` to `path` once.
///
/// The JSON goes to a `.tmp` sibling first and is renamed into place, so a
/// reader never sees a half-written bronze file. An existing target is
/// [`PipelineError::AlreadyExists`].
pub fn write_bronze(path: &Path, envelope: &BronzeEnvelope) -> Result<u64> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if path.exists() {
        return Err(PipelineError::AlreadyExists(path.to_path_buf()));
    }

    let bytes = serde_json::to_vec_pretty(envelope)?;
    let tmp = tmp_sibling(path);
    fs::write(&tmp, &bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(bytes.len() as u64)
}

pub fn read_bronze(path: &Path) -> Result<BronzeEnvelope> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ingestion::envelope::decode_records;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn envelope() -> BronzeEnvelope {
        let records = decode_records(br#"[{"D1N":"2020","V":"1"}]"#).unwrap();
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        BronzeEnvelope::wrap(records, "IBGE SIDRA API", "http://example.test/t", at, None)
    }

    #[test]
    fn writes_then_reads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bronze").join("sidra_6579_20250101T120000Z.json");

        write_bronze(&path, &envelope()).unwrap();
        let back = read_bronze(&path).unwrap();

        assert_eq!(back.meta.record_count, 1);
        assert_eq!(back.meta.batch_id.as_str(), "20250101T120000Z");
        assert!(!tmp_sibling(&path).exists());
    }

    #[test]
    fn refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sidra_6579_20250101T120000Z.json");
        write_bronze(&path, &envelope()).unwrap();
        let before = fs::read(&path).unwrap();

        let err = write_bronze(&path, &envelope()).unwrap_err();
        assert!(matches!(err, PipelineError::AlreadyExists(_)));
        assert_eq!(fs::read(&path).unwrap(), before);
    }
}
