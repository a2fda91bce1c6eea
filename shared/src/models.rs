use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// How a metric is treated by the USD to EUR conversion step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConversionClass {
    /// Currency amounts, multiplied by the period's rate.
    Monetary,
    /// Percentages, counts and day figures. Never converted.
    NonMonetary,
    /// The exchange-rate row itself. Never converted.
    Rate,
}

impl fmt::Display for ConversionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConversionClass::Monetary => "monetary",
            ConversionClass::NonMonetary => "non_monetary",
            ConversionClass::Rate => "rate",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Usd => f.write_str("USD"),
            Currency::Eur => f.write_str("EUR"),
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            other => Err(format!("Unsupported currency '{}'. Use 'USD' or 'EUR'.", other)),
        }
    }
}

/// One cell of the wide source table, in long format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub metric: String,
    pub period: String,
    /// Source text of the cell, kept for issue reporting.
    pub raw: String,
    /// Parsed value. `None` means "no data", which is distinct from zero.
    pub value: Option<f64>,
}

/// A long-format row after conversion, carrying both currency slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertedRow {
    pub metric: String,
    pub period: String,
    pub class: ConversionClass,
    pub usd: Option<f64>,
    pub eur: Option<f64>,
}

impl ConvertedRow {
    pub fn value(&self, currency: Currency) -> Option<f64> {
        match currency {
            Currency::Usd => self.usd,
            Currency::Eur => self.eur,
        }
    }
}

/// Period label to USD→EUR rate. Only usable rates (finite, > 0) are stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRateSeries {
    rates: HashMap<String, f64>,
}

impl ExchangeRateSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false (and stores nothing) when the rate cannot be used for conversion.
    pub fn insert(&mut self, period: &str, rate: f64) -> bool {
        if !rate.is_finite() || rate <= 0.0 {
            return false;
        }
        self.rates.insert(period.to_string(), rate);
        true
    }

    pub fn rate_for(&self, period: &str) -> Option<f64> {
        self.rates.get(period).copied()
    }

    /// Converts a USD amount for `period`. Fails closed: a missing rate gives `None`.
    pub fn convert(&self, period: &str, usd: Option<f64>) -> Option<f64> {
        let rate = self.rate_for(period)?;
        usd.map(|amount| amount * rate)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Wide table keyed by period (rows) with one column per metric: the "pipeline" format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineTable {
    pub currency: Currency,
    pub periods: Vec<String>,
    pub metrics: Vec<String>,
    /// `cells[period_index][metric_index]`
    pub cells: Vec<Vec<Option<f64>>>,
}

impl PipelineTable {
    pub fn get(&self, period: &str, metric: &str) -> Option<f64> {
        let row = self.periods.iter().position(|p| p == period)?;
        let col = self.metrics.iter().position(|m| m == metric)?;
        self.cells[row][col]
    }
}

/// The JSON artifact consumed by the chart front end.
///
/// Every series in `values_usd` and `values_eur` has exactly `periods.len()` entries,
/// aligned by position; a missing data point is `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardDataset {
    pub metrics: Vec<String>,
    pub periods: Vec<String>,
    pub values_usd: BTreeMap<String, Vec<Option<f64>>>,
    pub values_eur: BTreeMap<String, Vec<Option<f64>>>,
}

impl DashboardDataset {
    pub fn series(&self, metric: &str, currency: Currency) -> Option<&[Option<f64>]> {
        let values = match currency {
            Currency::Usd => &self.values_usd,
            Currency::Eur => &self.values_eur,
        };
        values.get(metric).map(Vec::as_slice)
    }

    /// Checks the position-alignment invariant for both currency maps.
    pub fn is_aligned(&self) -> bool {
        let expected = self.periods.len();
        self.metrics.iter().all(|metric| {
            matches!(self.values_usd.get(metric), Some(v) if v.len() == expected)
                && matches!(self.values_eur.get(metric), Some(v) if v.len() == expected)
        }) && self.values_usd.len() == self.metrics.len()
            && self.values_eur.len() == self.metrics.len()
    }
}
