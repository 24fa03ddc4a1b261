use crate::common::constants::BATCH_ID_FORMAT;
use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static BATCH_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{8}T\d{6}Z$").expect("batch id pattern is valid"));

/// Identifier of one ingestion run, e.g. `20250101T120000Z`.
///
/// Derived from the UTC ingestion timestamp at second precision. The format is
/// fixed-width, so ordering the strings orders the runs chronologically; the
/// stages rely on that when they pick the latest file in a directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    pub fn from_timestamp(ts: DateTime<Utc>) -> Self {
        Self(ts.format(BATCH_ID_FORMAT).to_string())
    }

    /// Accepts only well-formed ids that name a real calendar instant.
    pub fn parse(raw: &str) -> Option<Self> {
        if !BATCH_ID_RE.is_match(raw) {
            return None;
        }
        NaiveDateTime::parse_from_str(raw, BATCH_ID_FORMAT).ok()?;
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
