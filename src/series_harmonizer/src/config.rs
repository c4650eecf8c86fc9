//! Pipeline configuration: parsing, normalization, and wiring.
//!
//! A pipeline TOML file describes:
//! - the target resolution, output format and output folder of every saved series
//! - the time zone of each country code (`[countries]`)
//! - the sources to read and, per source, the entities (country + optional
//!   subdivision) to produce and the adapter settings
//!
//! ```toml
//! target_resolution = "1h"
//! output_format = "parquet"
//! timeout_secs = 300
//!
//! [countries]
//! DE = "Europe/Berlin"
//!
//! [sources.tso_dumps]
//! folder = "raw_data_folder"
//! entities = [{ country_code = "DE" }, { country_code = "US", subdivision_code = "CAL" }]
//!
//! [sources.tso_dumps.csv]
//! time_column = "Time"
//! value_column = "Load"
//! ```
//!
//! Folder values are keys into the `directories.toml` folder structure
//! ([`shared_utils::config::FoldersConfig`]), never raw paths.
//!
//! Entrypoints:
//! - Parse + normalize from a TOML string: [`load_pipeline_str`]
//! - Parse + normalize from a file path: [`load_pipeline_path`]
//! - Build runtime objects: [`PipelineConfig::build`]

use std::collections::HashSet;
use std::mem;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use demand_ingestor::models::resolution::Resolution;
use demand_ingestor::region::RegionTable;
use demand_ingestor::sources::SourceRegistry;
use demand_ingestor::sources::csv_file::{CsvFileSource, CsvSourceSettings};
use indexmap::IndexMap;
use serde::Deserialize;
use shared_utils::config::FoldersConfig;
use tracing::info;

use crate::persist::Format;
use crate::pipeline::{Job, PipelinePlan};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Folder structure file, relative to the pipeline file.
    #[serde(default = "default_directories")]
    pub directories: PathBuf,
    #[serde(default)]
    pub target_resolution: Resolution,
    #[serde(default = "default_format")]
    pub output_format: Format,
    /// Folder key under which `<source>/<code>.<ext>` files are written.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,
    /// Name of the value column in saved files.
    #[serde(default = "default_variable_name")]
    pub variable_name: String,
    /// Per-job budget for fetch, normalization and save.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Country code -> IANA zone name.
    #[serde(default)]
    pub countries: IndexMap<String, String>,
    /// Source id -> configuration, in run order.
    pub sources: IndexMap<String, SourceCfg>,
}

/// One source: where its files live, which entities to produce, how to parse them.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceCfg {
    /// Folder key of the source's raw files.
    pub folder: String,
    pub entities: Vec<EntityCfg>,
    pub csv: CsvSourceSettings,
}

/// A country, optionally narrowed to one of its subdivisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityCfg {
    pub country_code: String,
    #[serde(default)]
    pub subdivision_code: Option<String>,
}

impl EntityCfg {
    /// `CC` or `CC_SUB`.
    pub fn code(&self) -> String {
        match &self.subdivision_code {
            Some(sub) => format!("{}_{}", self.country_code, sub),
            None => self.country_code.clone(),
        }
    }
}

fn default_directories() -> PathBuf {
    PathBuf::from("directories.toml")
}

fn default_format() -> Format {
    Format::Columnar
}

fn default_output_folder() -> String {
    "output_folder".to_string()
}

fn default_variable_name() -> String {
    "Load (MW)".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

/// Summary of changes performed during normalization.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ConfigReport {
    /// Source ids changed by trimming/lowercasing.
    pub sources_renamed: usize,
    /// Entities removed because they were listed twice for the same source.
    pub entities_deduped: usize,
}

/// Normalize a pipeline configuration in place.
///
/// - Lowercase + trim source ids; reject empty or colliding ids
/// - Uppercase + trim country and subdivision codes; drop empty subdivisions
/// - Deduplicate entities per source, preserving the first occurrence
/// - Uppercase + trim `[countries]` keys
///
/// Errors:
/// - Empty or duplicate source ids after normalization
/// - Empty country codes, or country codes containing `_`
/// - A zero timeout or an empty variable name
pub fn normalize_pipeline(cfg: &mut PipelineConfig) -> anyhow::Result<ConfigReport> {
    let mut report = ConfigReport::default();

    if cfg.timeout_secs == 0 {
        bail!("timeout_secs must be positive");
    }
    cfg.variable_name = cfg.variable_name.trim().to_string();
    if cfg.variable_name.is_empty() {
        bail!("variable_name cannot be empty");
    }

    let mut countries = IndexMap::with_capacity(cfg.countries.len());
    for (code, zone) in mem::take(&mut cfg.countries) {
        countries.insert(code.trim().to_uppercase(), zone.trim().to_string());
    }
    cfg.countries = countries;

    let mut rebuilt: IndexMap<String, SourceCfg> = IndexMap::new();
    for (raw_id, mut source) in mem::take(&mut cfg.sources) {
        let id = raw_id.trim().to_lowercase();
        if id.is_empty() {
            bail!("source id cannot be empty after trimming");
        }
        if id != raw_id {
            report.sources_renamed += 1;
        }
        if rebuilt.contains_key(&id) {
            bail!("duplicate source id after normalization: {id}");
        }

        let before = source.entities.len();
        let mut seen = HashSet::new();
        let mut entities = Vec::with_capacity(before);
        for mut entity in mem::take(&mut source.entities) {
            entity.country_code = entity.country_code.trim().to_uppercase();
            if entity.country_code.is_empty() {
                bail!("source '{id}': country_code cannot be empty");
            }
            if entity.country_code.contains('_') {
                bail!(
                    "source '{id}': country_code '{}' must not contain '_'",
                    entity.country_code
                );
            }
            entity.subdivision_code = entity
                .subdivision_code
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty());
            if seen.insert(entity.clone()) {
                entities.push(entity);
            }
        }
        report.entities_deduped += before - entities.len();
        source.entities = entities;
        rebuilt.insert(id, source);
    }
    cfg.sources = rebuilt;
    Ok(report)
}

/// Parse and normalize a pipeline configuration from a TOML string.
pub fn load_pipeline_str(toml_str: &str) -> anyhow::Result<PipelineConfig> {
    let mut cfg: PipelineConfig =
        toml::from_str(toml_str).context("failed to parse pipeline TOML")?;
    let report = normalize_pipeline(&mut cfg).context("normalize_pipeline failed")?;
    info!(
        sources = cfg.sources.len(),
        sources_renamed = report.sources_renamed,
        entities_deduped = report.entities_deduped,
        "pipeline configuration loaded"
    );
    Ok(cfg)
}

/// Read a pipeline TOML file from disk, parse, and normalize it.
///
/// A relative `directories` entry is resolved against the file's folder.
pub fn load_pipeline_path(path: impl AsRef<Path>) -> anyhow::Result<PipelineConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read pipeline file {}", path.display()))?;
    let mut cfg = load_pipeline_str(&text)?;
    if cfg.directories.is_relative() {
        if let Some(parent) = path.parent() {
            cfg.directories = parent.join(&cfg.directories);
        }
    }
    Ok(cfg)
}

impl PipelineConfig {
    /// Build the region table, the adapter registry and the job plan.
    ///
    /// With `only_source`, the plan is restricted to that source.
    pub fn build(
        &self,
        folders: &FoldersConfig,
        only_source: Option<&str>,
    ) -> anyhow::Result<(SourceRegistry, RegionTable, PipelinePlan)> {
        let regions = RegionTable::new()
            .with_entries(self.countries.iter().map(|(c, z)| (c.as_str(), z.as_str())))
            .context("invalid [countries] entry")?;

        let only = only_source.map(|s| s.trim().to_lowercase());
        if let Some(id) = &only {
            if !self.sources.contains_key(id) {
                bail!("source '{id}' is not configured");
            }
        }

        let mut registry = SourceRegistry::new();
        let mut jobs = Vec::new();
        for (id, source) in &self.sources {
            if only.as_ref().is_some_and(|o| o != id) {
                continue;
            }
            let folder = folders
                .folder(&source.folder)
                .with_context(|| format!("source '{id}'"))?;
            registry.register(CsvFileSource::new(id, folder, source.csv.clone()));
            jobs.extend(source.entities.iter().map(|e| Job {
                source: id.clone(),
                code: e.code(),
            }));
        }

        let plan = PipelinePlan {
            jobs,
            output_dir: folders.folder(&self.output_folder)?.to_path_buf(),
            format: self.output_format,
            target: self.target_resolution,
            variable_name: self.variable_name.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        };
        Ok((registry, regions, plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use demand_ingestor::region::TimezoneLookup;

    const SAMPLE: &str = r#"
        target_resolution = "1h"
        output_format = "csv"

        [countries]
        " de " = "Europe/Berlin"

        [sources." TSO_Dumps "]
        folder = "raw"
        entities = [
            { country_code = "de" },
            { country_code = "DE " },
            { country_code = "us", subdivision_code = "cal" },
        ]

        [sources." TSO_Dumps ".csv]
        time_column = "Time"
        value_column = "Load"
        time_zone = "Europe/Berlin"
        dst_policy = "prefer_earliest"
    "#;

    #[test]
    fn normalizes_ids_codes_and_dedupes() {
        let mut cfg: PipelineConfig = toml::from_str(SAMPLE).unwrap();
        let report = normalize_pipeline(&mut cfg).unwrap();
        assert_eq!(
            report,
            ConfigReport {
                sources_renamed: 1,
                entities_deduped: 1
            }
        );

        let (id, source) = cfg.sources.first().unwrap();
        assert_eq!(id, "tso_dumps");
        let codes: Vec<_> = source.entities.iter().map(EntityCfg::code).collect();
        assert_eq!(codes, ["DE", "US_CAL"]);
        assert_eq!(cfg.countries.get("DE").map(String::as_str), Some("Europe/Berlin"));
        assert_eq!(cfg.output_format, Format::Delimited);
        assert_eq!(cfg.variable_name, "Load (MW)");
    }

    #[test]
    fn duplicate_source_collision_errors() {
        let toml_str = r#"
            [sources.a]
            folder = "raw"
            entities = []
            csv = { time_column = "t", value_column = "v" }
            [sources.A]
            folder = "raw"
            entities = []
            csv = { time_column = "t", value_column = "v" }
        "#;
        let err = load_pipeline_str(toml_str).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate source id"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = load_pipeline_str("sources = {}\nresolution = \"1h\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("unknown field"));
    }

    #[test]
    fn build_wires_registry_regions_and_plan() {
        let cfg = load_pipeline_str(SAMPLE).unwrap();
        let folders =
            FoldersConfig::from_toml_str("raw = \"raw\"\noutput_folder = \"out\"\n", "/data")
                .unwrap();

        let (registry, regions, plan) = cfg.build(&folders, None).unwrap();
        assert_eq!(registry.ids().collect::<Vec<_>>(), ["tso_dumps"]);
        assert_eq!(regions.time_zone("DE").unwrap(), chrono_tz::Tz::Europe__Berlin);
        assert_eq!(plan.jobs.len(), 2);
        assert_eq!(plan.jobs[1].code, "US_CAL");
        assert_eq!(plan.output_dir, Path::new("/data/out"));
        assert_eq!(plan.timeout, Duration::from_secs(300));

        assert!(cfg.build(&folders, Some("other")).is_err());
        let (_, _, only) = cfg.build(&folders, Some("TSO_DUMPS")).unwrap();
        assert_eq!(only.jobs.len(), 2);
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() {
        let toml_str = r#"
            [sources.s]
            folder = "raw"
            entities = []
            csv = { time_column = "t", value_column = "v", delimiter = "§" }
        "#;
        let err = load_pipeline_str(toml_str).unwrap_err();
        assert!(format!("{err:#}").contains("ASCII delimiter"), "{err:#}");
    }

    #[test]
    fn jobs_follow_source_declaration_order() {
        let toml_str = r#"
            [sources.zeta]
            folder = "raw"
            entities = [{ country_code = "fr" }]
            csv = { time_column = "t", value_column = "v" }
            [sources.alpha]
            folder = "raw"
            entities = [{ country_code = "de" }]
            csv = { time_column = "t", value_column = "v" }
        "#;
        let cfg = load_pipeline_str(toml_str).unwrap();
        assert_eq!(cfg.sources.keys().collect::<Vec<_>>(), ["zeta", "alpha"]);

        let folders =
            FoldersConfig::from_toml_str("raw = \"raw\"\noutput_folder = \"out\"\n", "/data")
                .unwrap();
        let (registry, _, plan) = cfg.build(&folders, None).unwrap();
        assert_eq!(registry.ids().collect::<Vec<_>>(), ["zeta", "alpha"]);
        let jobs: Vec<String> = plan.jobs.iter().map(ToString::to_string).collect();
        assert_eq!(jobs, ["zeta/FR", "alpha/DE"]);
    }

    #[test]
    fn build_reports_unknown_folder_keys() {
        let cfg = load_pipeline_str(SAMPLE).unwrap();
        let folders = FoldersConfig::from_toml_str("output_folder = \"out\"\n", "/data").unwrap();
        let err = cfg.build(&folders, None).unwrap_err();
        assert!(format!("{err:#}").contains("raw"));
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn entity_codes_are_uppercase_and_unique(
            codes in proptest::collection::vec("[a-zA-Z]{2}", 1..8),
        ) {
            let entities = codes
                .iter()
                .map(|c| format!("{{ country_code = \" {c} \" }}"))
                .collect::<Vec<_>>()
                .join(", ");
            let toml_str = format!(
                "[sources.s]\nfolder = \"raw\"\nentities = [{entities}]\ncsv = {{ time_column = \"t\", value_column = \"v\" }}\n"
            );
            let cfg = load_pipeline_str(&toml_str).unwrap();
            let got: Vec<String> = cfg.sources["s"].entities.iter().map(EntityCfg::code).collect();
            let unique: HashSet<&String> = got.iter().collect();
            prop_assert_eq!(unique.len(), got.len());
            prop_assert!(got.iter().all(|c| c.chars().all(|ch| ch.is_ascii_uppercase())));
        }
    }
}
