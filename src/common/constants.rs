/// Source constants for the SIDRA table the pipeline ingests by default.
/// Every one of these can be overridden from `pipeline.toml`.

// Table 6579 (estimated resident population), all states, all periods, all variables
pub const SIDRA_6579_URL: &str = "https://apisidra.ibge.gov.br/values/t/6579/n3/all/p/all/v/all";
pub const DEFAULT_DATASET: &str = "sidra_6579";
pub const DEFAULT_SOURCE_NAME: &str = "IBGE SIDRA API";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

// Batch ids are UTC timestamps; zero padding keeps lexicographic == chronological
pub const BATCH_ID_FORMAT: &str = "%Y%m%dT%H%M%SZ";

// Technical columns appended to every silver row
pub const META_BATCH_ID: &str = "batch_id";
pub const META_INGESTED_AT: &str = "ingested_at";
pub const META_SOURCE_URL: &str = "source_url";
pub const METADATA_COLUMNS: [&str; 3] = [META_BATCH_ID, META_INGESTED_AT, META_SOURCE_URL];

// SIDRA returns its header line as the first record; this is its label in the variable column
pub const SENTINEL_LABEL: &str = "Variável";

// Default dimension columns (already normalized)
pub const DEFAULT_LOCALITY_COLUMN: &str = "d3n";
pub const DEFAULT_PERIOD_COLUMN: &str = "d1n";
pub const DEFAULT_VALUE_COLUMN: &str = "v";

// Gold output columns
pub const GOLD_CATEGORY: &str = "category";
pub const GOLD_LOCALITY: &str = "locality";
pub const GOLD_PERIOD: &str = "period";
pub const GOLD_VALUE_TOTAL: &str = "value_total";

/// Written in place of the period when the input carries no period at all.
pub const PERIOD_ABSENT: &str = "n/a";

// Inspection samples, overwritten on every run
pub const LOCALITY_SAMPLE_FILE: &str = "gold_locality_sample.csv";
pub const NATIONWIDE_SAMPLE_FILE: &str = "gold_nationwide_sample.csv";
pub const LOCALITY_SAMPLE_ROWS: usize = 60;
pub const NATIONWIDE_SAMPLE_ROWS: usize = 20;

// Retry defaults: 1s, 2s, 4s, 8s between five attempts
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
pub const DEFAULT_BACKOFF_CAP_MS: u64 = 20_000;

// Environment and on-disk configuration
pub const PROJECT_ROOT_ENV: &str = "PROJECT_ROOT";
pub const PUSHGATEWAY_ENV: &str = "SIDRA_PUSHGATEWAY_URL";
pub const CONFIG_FILE: &str = "pipeline.toml";

/// A directory holding both of these is taken as the project root.
pub const ROOT_MARKER_DIR: &str = "src";
pub const ROOT_MARKER_FILE: &str = "Cargo.toml";
