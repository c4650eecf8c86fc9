//! Ingestion side of the demand pipeline: the raw and canonical series model,
//! timestamp and time zone handling, region lookup, and the source adapters
//! that produce raw series.

pub mod errors;
pub mod models;
pub mod region;
pub mod sources;
pub mod tz;
