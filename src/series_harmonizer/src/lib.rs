//! Normalization and persistence of electricity demand series.
//!
//! Raw series from [`demand_ingestor`] adapters become canonical through
//! [`clean::normalize`] and reach disk only through [`persist::save`], which
//! refuses any file whose time zone could not be read back unambiguously.

pub mod clean;
pub mod config;
pub mod gaps;
pub mod persist;
pub mod pipeline;
pub mod quality;
pub mod resample;
