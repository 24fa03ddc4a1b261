// Artifact naming and "latest file in a directory" discovery

use crate::common::error::{PipelineError, Result};
use crate::pipeline::ingestion::batch::BatchId;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Filename convention for one artifact kind: `<prefix><batch_id>.<extension>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPattern {
    prefix: String,
    extension: &'static str,
}

impl ArtifactPattern {
    pub fn bronze(dataset: &str) -> Self {
        Self { prefix: format!("{}_", dataset), extension: "json" }
    }

    pub fn silver(dataset: &str) -> Self {
        Self { prefix: format!("{}_silver_", dataset), extension: "parquet" }
    }

    pub fn gold_locality(dataset: &str) -> Self {
        Self { prefix: format!("{}_gold_locality_", dataset), extension: "parquet" }
    }

    pub fn gold_nationwide(dataset: &str) -> Self {
        Self { prefix: format!("{}_gold_nationwide_", dataset), extension: "parquet" }
    }

    pub fn file_name(&self, batch: &BatchId) -> String {
        format!("{}{}.{}", self.prefix, batch, self.extension)
    }

    /// The batch id embedded in `file_name`, if it follows this pattern.
    pub fn batch_of(&self, file_name: &str) -> Option<BatchId> {
        let stem = file_name
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.extension)?
            .strip_suffix('.')?;
        BatchId::parse(stem)
    }

    pub fn describe(&self) -> String {
        format!("{}<batch_id>.{}", self.prefix, self.extension)
    }
}

/// The newest artifact of `pattern` in `dir`, by batch id.
///
/// Files that do not follow the pattern are ignored. A missing directory and
/// a directory without matches are both reported as [`PipelineError::NoInput`].
pub fn latest_artifact(dir: &Path, pattern: &ArtifactPattern) -> Result<(PathBuf, BatchId)> {
    let no_input = || PipelineError::NoInput {
        dir: dir.to_path_buf(),
        pattern: pattern.describe(),
    };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(no_input()),
        Err(e) => return Err(e.into()),
    };

    let mut latest: Option<(PathBuf, BatchId)> = None;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(batch) = name.to_str().and_then(|n| pattern.batch_of(n)) else {
            continue;
        };
        if latest.as_ref().map_or(true, |(_, best)| batch > *best) {
            latest = Some((entry.path(), batch));
        }
    }

    let (path, batch) = latest.ok_or_else(no_input)?;
    debug!("Latest artifact in {}: {}", dir.display(), path.display());
    Ok((path, batch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_name_round_trips_batch() {
        let pattern = ArtifactPattern::silver("sidra_6579");
        let batch = BatchId::parse("20250101T120000Z").unwrap();
        let name = pattern.file_name(&batch);
        assert_eq!(name, "sidra_6579_silver_20250101T120000Z.parquet");
        assert_eq!(pattern.batch_of(&name), Some(batch));
    }

    #[test]
    fn bronze_pattern_ignores_other_stages() {
        let bronze = ArtifactPattern::bronze("sidra_6579");
        assert!(bronze.batch_of("sidra_6579_silver_20250101T120000Z.parquet").is_none());
        assert!(bronze.batch_of("sidra_6579_20250101T120000Z.json.tmp").is_none());
        assert!(bronze.batch_of("sidra_6579_20250101T120000Zjson").is_none());
        assert!(bronze.batch_of("sidra_6579_20250101T120000Z.json").is_some());
    }

    #[test]
    fn picks_latest_batch_and_ignores_strays() {
        let dir = tempdir().unwrap();
        let pattern = ArtifactPattern::bronze("sidra_6579");
        for name in [
            "sidra_6579_20240101T000000Z.json",
            "sidra_6579_20250101T120000Z.json",
            "sidra_6579_20241231T235959Z.json",
            "sidra_6579_99999999T999999Z.json",
            "zz_notes.json",
            "sidra_6579_20990101T000000Z.json.tmp",
        ] {
            fs::write(dir.path().join(name), b"{}").unwrap();
        }
        fs::create_dir(dir.path().join("sidra_6579_20980101T000000Z.json")).unwrap();

        let (path, batch) = latest_artifact(dir.path(), &pattern).unwrap();
        assert_eq!(batch.as_str(), "20250101T120000Z");
        assert!(path.ends_with("sidra_6579_20250101T120000Z.json"));
    }

    #[test]
    fn empty_or_missing_directory_is_no_input() {
        let dir = tempdir().unwrap();
        let pattern = ArtifactPattern::silver("sidra_6579");

        assert!(matches!(
            latest_artifact(dir.path(), &pattern),
            Err(PipelineError::NoInput { .. })
        ));
        assert!(matches!(
            latest_artifact(&dir.path().join("absent"), &pattern),
            Err(PipelineError::NoInput { .. })
        ));
    }
}
