// Bronze -> silver -> gold pipeline for IBGE SIDRA tables

pub mod common;
pub mod config;
pub mod observability;
pub mod pipeline;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;

pub use common::error::{PipelineError, Result};
