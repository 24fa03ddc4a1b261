// Common constants and the error type shared by every stage

pub mod constants;
pub mod error;
