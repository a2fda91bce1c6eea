// Pipeline settings, loaded from a JSON file (default embedded at build time)
use crate::data::csv_parser::CsvTableSource;
use crate::data::sheets_export::SheetValuesSource;
use crate::data::table::TableSource;
use crate::error::PipelineError;
use crate::pipeline::validate::QualityRules;
use crate::pipeline::PipelineOptions;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use shared::catalog::{CatalogEntry, MetricCatalog};
use shared::models::ConversionClass;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = include_str!("../../assets/config/default.json");

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PipelineSettings {
    pub version: String,
    pub server: ServerSettings,
    pub source: SourceSettings,
    pub output: OutputSettings,
    pub conversion: ConversionSettings,
    pub catalog: CatalogSettings,
    #[serde(default)]
    pub validation: QualityRules,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Csv,
    SheetsJson,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceSettings {
    pub kind: SourceKind,
    pub path: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_delimiter() -> String {
    ",".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputSettings {
    pub dashboard_json: PathBuf,
    pub pipeline_csv_usd: PathBuf,
    pub pipeline_csv_eur: PathBuf,
    #[serde(default)]
    pub long_csv: Option<PathBuf>,
    #[serde(default)]
    pub report_json: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConversionSettings {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub rate_metric: String,
    /// Read `(500)` as -500, as accounting exports write negatives.
    #[serde(default = "enabled_by_default")]
    pub accounting_negatives: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CatalogSettings {
    #[serde(default)]
    pub monetary: Vec<String>,
    #[serde(default)]
    pub non_monetary: Vec<String>,
    /// Metrics that must be classified; startup fails if any is in neither list.
    #[serde(default)]
    pub expected_metrics: Vec<String>,
}

impl PipelineSettings {
    pub fn load_default() -> anyhow::Result<Self> {
        serde_json::from_str(DEFAULT_CONFIG).context("Embedded default configuration is invalid")
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file {}", path.display()))
    }

    /// Loads `path` when given, the embedded defaults otherwise.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Self::load_default(),
        }
    }

    /// Builds and validates the metric catalog. Monetary entries come first, in declaration
    /// order, followed by non-monetary ones; that order is the dashboard's metric order.
    pub fn build_catalog(&self) -> Result<MetricCatalog, PipelineError> {
        let entries = self
            .catalog
            .monetary
            .iter()
            .map(|name| CatalogEntry { name: name.clone(), class: ConversionClass::Monetary })
            .chain(
                self.catalog
                    .non_monetary
                    .iter()
                    .map(|name| CatalogEntry { name: name.clone(), class: ConversionClass::NonMonetary }),
            )
            .collect();
        let catalog = MetricCatalog::new(&self.conversion.rate_metric, entries)?;
        catalog.validate_expected(&self.catalog.expected_metrics)?;
        Ok(catalog)
    }

    pub fn delimiter_byte(&self) -> Result<u8, PipelineError> {
        match self.source.delimiter.as_bytes() {
            [b] => Ok(*b),
            _ if self.source.delimiter == "\\t" => Ok(b'\t'),
            _ => Err(PipelineError::ConfigError(format!(
                "CSV delimiter must be a single ASCII character, got '{}'",
                self.source.delimiter
            ))),
        }
    }

    pub fn table_source(&self) -> Result<Box<dyn TableSource>, PipelineError> {
        match self.source.kind {
            SourceKind::Csv => Ok(Box::new(CsvTableSource::new(&self.source.path, self.delimiter_byte()?))),
            SourceKind::SheetsJson => Ok(Box::new(SheetValuesSource::new(&self.source.path))),
        }
    }

    pub fn options(&self) -> PipelineOptions {
        PipelineOptions {
            convert_currency: self.conversion.enabled,
            accounting_negatives: self.conversion.accounting_negatives,
            quality: self.validation.clone(),
        }
    }

    /// Checks everything that can be checked without reading the source.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.build_catalog()?;
        if self.source.kind == SourceKind::Csv {
            self.delimiter_byte()?;
        }
        let outputs = [&self.output.dashboard_json, &self.output.pipeline_csv_usd, &self.output.pipeline_csv_eur];
        if outputs.iter().any(|p| p.as_os_str().is_empty()) {
            return Err(PipelineError::ConfigError("Output paths must not be empty".to_string()));
        }
        let rules = &self.validation;
        if !(rules.rate_min > 0.0 && rules.rate_min < rules.rate_max) {
            return Err(PipelineError::ConfigError(format!(
                "Rate band must satisfy 0 < rate_min < rate_max, got {}..{}",
                rules.rate_min, rules.rate_max
            )));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
