//! Region code → time zone lookup.
//!
//! Codes are either an ISO alpha-2 country code (`"DE"`) or a country code plus
//! a subdivision code (`"US_CAL"`). Countries spanning several zones are
//! expected to be registered under their capital's zone; named subdivisions
//! override the country entry.

use chrono_tz::Tz;
use indexmap::IndexMap;
use thiserror::Error;

use crate::tz::{TzError, parse_time_zone};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionError {
    #[error("no time zone registered for region '{0}'")]
    UnknownRegion(String),

    #[error("the subdivisions of '{country}' are not supported")]
    UnsupportedSubdivision { country: String },

    #[error(transparent)]
    TimeZone(#[from] TzError),
}

/// A pure mapping from region code to time zone.
pub trait TimezoneLookup {
    fn time_zone(&self, code: &str) -> Result<Tz, RegionError>;
}

/// US balancing regions (EIA) and their reference zones.
const US_REGIONS: &[(&str, Tz)] = &[
    ("US_CAL", Tz::America__Los_Angeles),
    ("US_CAR", Tz::America__New_York),
    ("US_CENT", Tz::America__Chicago),
    ("US_FLA", Tz::America__New_York),
    ("US_MIDA", Tz::America__New_York),
    ("US_MIDW", Tz::America__Chicago),
    ("US_NE", Tz::America__New_York),
    ("US_NY", Tz::America__New_York),
    ("US_NW", Tz::America__Los_Angeles),
    ("US_SE", Tz::America__New_York),
    ("US_SW", Tz::America__Phoenix),
    ("US_TEN", Tz::America__Chicago),
    ("US_TEX", Tz::America__Chicago),
];

/// Canadian provinces and territories.
const CA_REGIONS: &[(&str, Tz)] = &[
    ("CA_AB", Tz::America__Edmonton),
    ("CA_BC", Tz::America__Vancouver),
    ("CA_MB", Tz::America__Winnipeg),
    ("CA_NB", Tz::America__Moncton),
    ("CA_NL", Tz::America__St_Johns),
    ("CA_NS", Tz::America__Halifax),
    ("CA_NT", Tz::America__Yellowknife),
    ("CA_NU", Tz::America__Iqaluit),
    ("CA_ON", Tz::America__Toronto),
    ("CA_PE", Tz::America__Halifax),
    ("CA_QC", Tz::America__Montreal),
    ("CA_SK", Tz::America__Regina),
    ("CA_YT", Tz::America__Whitehorse),
];

/// Table-backed [`TimezoneLookup`] with built-in US/CA subdivisions.
#[derive(Debug, Clone)]
pub struct RegionTable {
    countries: IndexMap<String, Tz>,
    subdivisions: IndexMap<String, Tz>,
}

impl Default for RegionTable {
    fn default() -> Self {
        let subdivisions = US_REGIONS
            .iter()
            .chain(CA_REGIONS)
            .map(|(code, tz)| (code.to_string(), *tz))
            .collect();
        Self {
            countries: IndexMap::new(),
            subdivisions,
        }
    }
}

impl RegionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the zone of a country or subdivision code.
    pub fn insert(&mut self, code: &str, tz: Tz) {
        let code = code.trim().to_uppercase();
        if code.contains('_') {
            self.subdivisions.insert(code, tz);
        } else {
            self.countries.insert(code, tz);
        }
    }

    /// Register a batch of `code = "Zone/Name"` entries, e.g. from configuration.
    pub fn with_entries<'a>(
        mut self,
        entries: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, RegionError> {
        for (code, name) in entries {
            self.insert(code, parse_time_zone(name)?);
        }
        Ok(self)
    }
}

impl TimezoneLookup for RegionTable {
    fn time_zone(&self, code: &str) -> Result<Tz, RegionError> {
        let code = code.trim().to_uppercase();
        match code.split_once('_') {
            None => self
                .countries
                .get(&code)
                .copied()
                .ok_or(RegionError::UnknownRegion(code)),
            Some((country, _)) => {
                if let Some(tz) = self.subdivisions.get(&code) {
                    return Ok(*tz);
                }
                let known_country = self
                    .subdivisions
                    .keys()
                    .any(|k| k.split_once('_').is_some_and(|(c, _)| c == country));
                if known_country {
                    Err(RegionError::UnknownRegion(code))
                } else {
                    Err(RegionError::UnsupportedSubdivision {
                        country: country.to_string(),
                    })
                }
            }
        }
    }
}
