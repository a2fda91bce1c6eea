// Keeps the dataset and report of the latest successful run for the trigger service.
use shared::models::{ConversionClass, Currency, DashboardDataset};
use shared::report::PipelineReport;

#[derive(Debug, Clone)]
pub struct StoredRun {
    pub dataset: DashboardDataset,
    pub report: PipelineReport,
}

/// One metric's series in one currency, ready to stream to a client.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSnapshot {
    pub metric: String,
    pub currency: Currency,
    pub class: Option<ConversionClass>,
    pub periods: Vec<String>,
    pub values: Vec<Option<f64>>,
}

pub struct RunStore {
    latest: Option<StoredRun>,
}

impl RunStore {
    pub fn new() -> Self {
        RunStore { latest: None }
    }

    /// Replaces the previous run. Only successful runs are recorded.
    pub fn record(&mut self, dataset: DashboardDataset, report: PipelineReport) {
        self.latest = Some(StoredRun { dataset, report });
    }

    pub fn latest(&self) -> Option<&StoredRun> {
        self.latest.as_ref()
    }

    /// `None` when no run has completed. An empty `metric` selects every metric in
    /// dataset order; an unknown metric yields an empty list.
    pub fn series(&self, metric: &str, currency: Currency) -> Option<Vec<SeriesSnapshot>> {
        let run = self.latest.as_ref()?;
        let snapshots = run
            .dataset
            .metrics
            .iter()
            .filter(|m| metric.is_empty() || m.as_str() == metric)
            .filter_map(|m| {
                let values = run.dataset.series(m, currency)?;
                Some(SeriesSnapshot {
                    metric: m.clone(),
                    currency,
                    class: run.report.summary(m).map(|s| s.class),
                    periods: run.dataset.periods.clone(),
                    values: values.to_vec(),
                })
            })
            .collect();
        Some(snapshots)
    }
}

impl Default for RunStore {
    fn default() -> Self {
        Self::new()
    }
}
