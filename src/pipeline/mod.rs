// Medallion pipeline building blocks: ingestion, processing, and artifact storage

pub mod ingestion;
pub mod processing;
pub mod storage;
