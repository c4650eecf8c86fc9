pub mod canonical_series;
pub mod raw_series;
pub mod resolution;
pub mod time_index;
