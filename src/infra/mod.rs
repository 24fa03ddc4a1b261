// Adapters between the use cases and the outside world: HTTP and the filesystem

pub mod bronze_store;
pub mod csv_sample;
pub mod http_client;
pub mod parquet_io;

pub use http_client::ReqwestHttp;
