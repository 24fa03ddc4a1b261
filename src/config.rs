use crate::common::constants::{
    CONFIG_FILE, DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_CAP_MS, DEFAULT_DATASET,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_SOURCE_NAME, DEFAULT_TIMEOUT_SECS, LOCALITY_SAMPLE_ROWS,
    NATIONWIDE_SAMPLE_ROWS, PROJECT_ROOT_ENV, ROOT_MARKER_DIR, ROOT_MARKER_FILE, SIDRA_6579_URL,
};
use crate::common::error::{PipelineError, Result};
use crate::pipeline::ingestion::retry::RetryPolicy;
use crate::pipeline::processing::aggregate::DimensionColumns;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Where every artifact of one project lives. Resolved once per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the root from `PROJECT_ROOT`, the executable location, or the working directory.
    pub fn resolve() -> Result<Self> {
        let env_root = std::env::var_os(PROJECT_ROOT_ENV).map(PathBuf::from);
        let exe = std::env::current_exe().ok();
        let cwd = std::env::current_dir()?;
        let root = resolve_project_root(env_root, exe.as_deref(), &cwd);
        debug!("Project root: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bronze_dir(&self) -> PathBuf {
        self.root.join("data").join("bronze")
    }

    pub fn silver_dir(&self) -> PathBuf {
        self.root.join("data").join("silver")
    }

    pub fn gold_dir(&self) -> PathBuf {
        self.root.join("data").join("gold")
    }

    pub fn docs_dir(&self) -> PathBuf {
        self.root.join("docs")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }
}

fn is_project_root(dir: &Path) -> bool {
    dir.join(ROOT_MARKER_DIR).is_dir() && dir.join(ROOT_MARKER_FILE).is_file()
}

/// Pick the project root.
///
/// In order: a non-empty `env_root`; the parent of a `target/` directory the
/// executable was built into, if that parent looks like a project; the
/// nearest ancestor of `cwd` holding both `src/` and `Cargo.toml`; `cwd`.
pub fn resolve_project_root(env_root: Option<PathBuf>, exe: Option<&Path>, cwd: &Path) -> PathBuf {
    if let Some(root) = env_root.filter(|p| !p.as_os_str().is_empty()) {
        return root;
    }

    if let Some(exe) = exe {
        let from_target = exe
            .ancestors()
            .find(|dir| dir.file_name().map_or(false, |n| n == "target"))
            .and_then(Path::parent)
            .filter(|dir| is_project_root(dir));
        if let Some(root) = from_target {
            return root.to_path_buf();
        }
    }

    cwd.ancestors()
        .find(|dir| is_project_root(dir))
        .unwrap_or(cwd)
        .to_path_buf()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    pub dataset: String,
    pub source_name: String,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: SIDRA_6579_URL.to_string(),
            dataset: DEFAULT_DATASET.to_string(),
            source_name: DEFAULT_SOURCE_NAME.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_cap_ms: DEFAULT_BACKOFF_CAP_MS,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_cap: Duration::from_millis(self.backoff_cap_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    pub locality_rows: usize,
    pub nationwide_rows: usize,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            locality_rows: LOCALITY_SAMPLE_ROWS,
            nationwide_rows: NATIONWIDE_SAMPLE_ROWS,
        }
    }
}

/// Contents of `pipeline.toml`. Every section and field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub retry: RetryConfig,
    pub dimensions: DimensionColumns,
    pub samples: SampleConfig,
}

impl PipelineConfig {
    /// Load `pipeline.toml` from the project root, or defaults when it is absent.
    pub fn load(layout: &ProjectLayout) -> Result<Self> {
        let path = layout.config_path();
        let config = match fs::read_to_string(&path) {
            Ok(content) => {
                debug!("Loading configuration from {}", path.display());
                toml::from_str(&content)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(PipelineError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                )))
            }
        };
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.url.trim().is_empty() {
            return Err(PipelineError::Config("source.url must not be empty".into()));
        }
        if self.source.dataset.trim().is_empty() {
            return Err(PipelineError::Config("source.dataset must not be empty".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(PipelineError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.dimensions.value.trim().is_empty() || self.dimensions.locality.trim().is_empty() {
            return Err(PipelineError::Config(
                "dimensions.value and dimensions.locality must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_project(dir: &Path) {
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::write(dir.join("Cargo.toml"), "[package]\n").unwrap();
    }

    #[test]
    fn env_root_wins_unless_empty() {
        let cwd = tempdir().unwrap();
        let root = resolve_project_root(Some(PathBuf::from("/srv/sidra")), None, cwd.path());
        assert_eq!(root, PathBuf::from("/srv/sidra"));

        let root = resolve_project_root(Some(PathBuf::new()), None, cwd.path());
        assert_eq!(root, cwd.path());
    }

    #[test]
    fn executable_in_target_points_at_project() {
        let project = tempdir().unwrap();
        make_project(project.path());
        let exe = project.path().join("target").join("release").join("ingest-bronze");
        let elsewhere = tempdir().unwrap();

        let root = resolve_project_root(None, Some(&exe), elsewhere.path());
        assert_eq!(root, project.path());
    }

    #[test]
    fn searches_upward_from_cwd() {
        let project = tempdir().unwrap();
        make_project(project.path());
        let nested = project.path().join("data").join("bronze");
        fs::create_dir_all(&nested).unwrap();

        let root = resolve_project_root(None, Some(Path::new("/usr/local/bin/x")), &nested);
        assert_eq!(root, project.path());
    }

    #[test]
    fn falls_back_to_cwd() {
        let cwd = tempdir().unwrap();
        assert_eq!(resolve_project_root(None, None, cwd.path()), cwd.path());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig::load(&ProjectLayout::new(dir.path())).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.retry.policy(), RetryPolicy::default());
    }

    #[test]
    fn partial_file_overrides_fields() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
[source]
dataset = "sidra_test"

[retry]
max_attempts = 2

[dimensions]
locality = "D1N"
period = "D2N"
category = "D3N"
sentinel_column = "D3N"
"#,
        )
        .unwrap();

        let config = PipelineConfig::load(&ProjectLayout::new(dir.path())).unwrap();
        assert_eq!(config.source.dataset, "sidra_test");
        assert_eq!(config.source.url, SIDRA_6579_URL);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.backoff_cap_ms, DEFAULT_BACKOFF_CAP_MS);
        assert_eq!(config.dimensions.category.as_deref(), Some("D3N"));
        assert_eq!(config.dimensions.value, "v");
        assert_eq!(config.samples.locality_rows, 60);
    }

    #[test]
    fn shipped_example_maps_live_table_layout() {
        let config: PipelineConfig = toml::from_str(include_str!("../pipeline.toml.example")).unwrap();
        config.validate().unwrap();

        assert_eq!(config.source, SourceConfig::default());
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.samples, SampleConfig::default());
        assert_eq!(
            config.dimensions,
            DimensionColumns {
                category: Some("d3n".into()),
                locality: "d1n".into(),
                period: Some("d2n".into()),
                value: "v".into(),
                sentinel_column: Some("d3n".into()),
                sentinel_label: "Variável".into(),
            }
        );
    }

    #[test]
    fn empty_dimension_names_switch_roles_off() {
        use crate::pipeline::processing::aggregate::aggregate;
        use crate::pipeline::processing::table::{Column, ColumnData, Table};

        let dir = tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        fs::write(
            layout.config_path(),
            "[dimensions]\nperiod = \"\"\nsentinel_column = \"\"\ncategory = \"\"\n",
        )
        .unwrap();
        let config = PipelineConfig::load(&layout).unwrap();

        let silver = Table::from_columns(
            2,
            vec![
                Column::new("d1n", ColumnData::Int64(vec![Some(2020), Some(2021)])),
                Column::new("d3n", ColumnData::Utf8(vec![Some("Variável".into()), Some("Acre".into())])),
                Column::new("v", ColumnData::Int64(vec![Some(1), Some(2)])),
            ],
        )
        .unwrap();
        let gold = aggregate(&silver, &config.dimensions).unwrap();

        assert!(!gold.with_category);
        assert!(!gold.stats.period_present);
        assert_eq!(gold.stats.sentinel_rows_dropped, 0);
        assert_eq!(gold.nationwide.len(), 1);
        assert_eq!(gold.nationwide[0].value_total, 3.0);
    }

    #[test]
    fn rejects_zero_attempts_and_empty_url() {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());

        fs::write(layout.config_path(), "[retry]\nmax_attempts = 0\n").unwrap();
        assert!(matches!(PipelineConfig::load(&layout), Err(PipelineError::Config(_))));

        fs::write(layout.config_path(), "[source]\nurl = \"\"\n").unwrap();
        assert!(matches!(PipelineConfig::load(&layout), Err(PipelineError::Config(_))));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        fs::write(layout.config_path(), "[retry\nmax_attempts = ").unwrap();
        assert!(matches!(PipelineConfig::load(&layout), Err(PipelineError::Toml(_))));
    }
}
