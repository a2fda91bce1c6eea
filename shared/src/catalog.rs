// Explicit metric catalog: metric name -> conversion class, in declaration order.
use crate::models::ConversionClass;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CatalogError {
    #[error("Metric '{0}' is declared more than once in the catalog")]
    DuplicateMetric(String),

    #[error("Metric '{metric}' is declared as a rate, but the configured rate metric is '{rate_metric}'")]
    UnexpectedRateMetric { metric: String, rate_metric: String },

    #[error("Rate metric '{0}' must be declared with class 'rate'")]
    RateMetricMisclassified(String),

    #[error("Rate metric label must not be empty")]
    EmptyRateMetric,

    #[error("Expected metrics missing from the catalog: {0:?}")]
    Unclassified(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub class: ConversionClass,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricCatalog {
    rate_metric: String,
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl MetricCatalog {
    /// Builds the catalog. The rate metric is appended as a `Rate` entry when the
    /// declarations do not list it.
    pub fn new(rate_metric: &str, entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        let rate_metric = rate_metric.trim();
        if rate_metric.is_empty() {
            return Err(CatalogError::EmptyRateMetric);
        }

        let mut catalog = MetricCatalog {
            rate_metric: rate_metric.to_string(),
            entries: Vec::with_capacity(entries.len() + 1),
            index: HashMap::new(),
        };

        for entry in entries {
            let name = entry.name.trim().to_string();
            if catalog.index.contains_key(&name) {
                return Err(CatalogError::DuplicateMetric(name));
            }
            match (name == catalog.rate_metric, entry.class) {
                (true, ConversionClass::Rate) | (false, ConversionClass::Monetary) | (false, ConversionClass::NonMonetary) => {}
                (true, _) => return Err(CatalogError::RateMetricMisclassified(name)),
                (false, ConversionClass::Rate) => {
                    return Err(CatalogError::UnexpectedRateMetric {
                        metric: name,
                        rate_metric: catalog.rate_metric.clone(),
                    })
                }
            }
            catalog.push(name, entry.class);
        }

        if !catalog.index.contains_key(&catalog.rate_metric) {
            let name = catalog.rate_metric.clone();
            catalog.push(name, ConversionClass::Rate);
        }

        Ok(catalog)
    }

    fn push(&mut self, name: String, class: ConversionClass) {
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(CatalogEntry { name, class });
    }

    pub fn rate_metric(&self) -> &str {
        &self.rate_metric
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// `None` for names the catalog does not know.
    pub fn classify(&self, metric: &str) -> Option<ConversionClass> {
        self.index.get(metric).map(|&i| self.entries[i].class)
    }

    /// Unknown names are treated as non-monetary (pass-through).
    pub fn class_or_default(&self, metric: &str) -> ConversionClass {
        self.classify(metric).unwrap_or(ConversionClass::NonMonetary)
    }

    /// Declaration position, used to order metrics deterministically.
    pub fn position(&self, metric: &str) -> Option<usize> {
        self.index.get(metric).copied()
    }

    pub fn validate_expected<S: AsRef<str>>(&self, expected: &[S]) -> Result<(), CatalogError> {
        let missing: Vec<String> = expected
            .iter()
            .map(|name| name.as_ref().trim())
            .filter(|name| !self.index.contains_key(*name))
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CatalogError::Unclassified(missing))
        }
    }
}
