//! Process-wide helpers shared by the ingestion and harmonization crates.

pub mod config;
pub mod env;
