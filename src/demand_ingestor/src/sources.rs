//! Source abstraction for electricity demand data.
//!
//! This module defines the [`SourceAdapter`] trait, the single capability every
//! upstream data source offers: produce a [`RawSeries`] for one region code.
//! Each concrete source (a TSO portal, a statistics office dump, a local file
//! export) implements it with its own retrieval and parsing quirks, including
//! source-specific corrections such as fixed time shifts.
//!
//! Adapters are looked up at runtime through a [`SourceRegistry`] keyed by
//! source identifier, so callers never match on concrete types.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use demand_ingestor::models::raw_series::{RawIndex, RawSeries};
//! use demand_ingestor::sources::{SourceAdapter, SourceError, SourceRegistry};
//!
//! struct Fixed;
//!
//! #[async_trait]
//! impl SourceAdapter for Fixed {
//!     fn id(&self) -> &str {
//!         "fixed"
//!     }
//!
//!     async fn fetch(&self, _code: &str) -> Result<RawSeries, SourceError> {
//!         Ok(RawSeries::new(RawIndex::Naive(vec![]), vec![]))
//!     }
//! }
//!
//! let mut registry = SourceRegistry::new();
//! registry.register(Fixed);
//! assert!(registry.get("fixed").is_ok());
//! ```

pub mod csv_file;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use snafu::{Backtrace, Snafu};

use crate::errors::SeriesError;
use crate::models::raw_series::RawSeries;
use crate::tz::TzError;

/// Trait for producing a raw demand series from one upstream source.
///
/// Implementations must be `Send + Sync` so independent regions can be
/// fetched from separate tasks.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable identifier used in configuration and output paths (e.g., "entsoe").
    fn id(&self) -> &str;

    /// Fetches the raw series for a region code (`"DE"`, `"US_CAL"`, ...).
    ///
    /// # Returns
    ///
    /// * `Ok(RawSeries)` - Observations in MW, in whatever order and resolution the source uses.
    /// * `Err(SourceError)` - No series could be produced for this code.
    async fn fetch(&self, code: &str) -> Result<RawSeries, SourceError>;
}

/// Errors that can occur within a [`SourceAdapter`] implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// The source data could not be read.
    #[snafu(display("Failed to read {}: {source}", path.display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The payload is not valid delimited text.
    #[snafu(display("Malformed CSV in {}: {source}", path.display()))]
    Csv {
        path: PathBuf,
        source: csv::Error,
        backtrace: Backtrace,
    },

    /// The configured field delimiter is not a single-byte ASCII character.
    #[snafu(display("Delimiter {delimiter:?} is not an ASCII character"))]
    Delimiter { delimiter: char, backtrace: Backtrace },

    /// A configured column is absent from the payload.
    #[snafu(display("Column '{column}' not found"))]
    MissingColumn { column: String, backtrace: Backtrace },

    /// A timestamp did not match the configured format.
    #[snafu(display("Row {row}: cannot parse timestamp '{label}'"))]
    Timestamp {
        row: usize,
        label: String,
        backtrace: Backtrace,
    },

    /// Local wall-clock timestamps could not be placed in the source's zone.
    #[snafu(display("Cannot localize timestamps: {source}"))]
    Localize { source: TzError, backtrace: Backtrace },

    /// The index could not be typed before applying a source correction.
    #[snafu(display("Invalid index: {source}"))]
    Index {
        source: SeriesError,
        backtrace: Backtrace,
    },

    /// The source has nothing for this code.
    #[snafu(display("No data for '{code}'"))]
    NoData { code: String, backtrace: Backtrace },

    /// No adapter is registered under this identifier.
    #[snafu(display("Unknown source '{id}'"))]
    UnknownSource { id: String, backtrace: Backtrace },
}

/// Runtime lookup table from source identifier to adapter.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    adapters: IndexMap<String, Arc<dyn SourceAdapter>>,
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.adapters.keys()).finish()
    }
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own [`SourceAdapter::id`], replacing any previous one.
    pub fn register<A: SourceAdapter + 'static>(&mut self, adapter: A) {
        self.adapters
            .insert(adapter.id().to_string(), Arc::new(adapter));
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn SourceAdapter>, SourceError> {
        self.adapters
            .get(id)
            .cloned()
            .ok_or_else(|| UnknownSourceSnafu { id }.build())
    }

    /// Registered identifiers in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::raw_series::RawIndex;

    struct Alpha;
    struct Beta;

    #[async_trait]
    impl SourceAdapter for Alpha {
        fn id(&self) -> &str {
            "alpha"
        }

        async fn fetch(&self, _code: &str) -> Result<RawSeries, SourceError> {
            Ok(RawSeries::new(
                RawIndex::Labels(vec!["2024-01-01 00:00:00".into()]),
                vec![Some(1.0)],
            ))
        }
    }

    #[async_trait]
    impl SourceAdapter for Beta {
        fn id(&self) -> &str {
            "beta"
        }

        async fn fetch(&self, code: &str) -> Result<RawSeries, SourceError> {
            NoDataSnafu { code }.fail()
        }
    }

    #[tokio::test]
    async fn registry_dispatches_by_id() {
        let mut registry = SourceRegistry::new();
        registry.register(Alpha);
        registry.register(Beta);

        assert_eq!(registry.ids().collect::<Vec<_>>(), ["alpha", "beta"]);

        let alpha = registry.get("alpha").unwrap();
        assert_eq!(alpha.fetch("DE").await.unwrap().len(), 1);

        let beta = registry.get("beta").unwrap();
        assert!(matches!(
            beta.fetch("DE").await,
            Err(SourceError::NoData { code, .. }) if code == "DE"
        ));
    }

    #[test]
    fn unknown_source_is_an_error() {
        let registry = SourceRegistry::new();
        assert!(matches!(
            registry.get("nope"),
            Err(SourceError::UnknownSource { id, .. }) if id == "nope"
        ));
    }
}
