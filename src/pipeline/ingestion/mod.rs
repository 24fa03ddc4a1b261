// Pipeline ingestion: batch identifiers, the bronze envelope and fetch retries

pub mod batch;
pub mod envelope;
pub mod retry;

pub use batch::BatchId;
pub use envelope::{BronzeEnvelope, BronzeMeta, RawRecord};
pub use retry::{RetryExhausted, RetryPolicy};
