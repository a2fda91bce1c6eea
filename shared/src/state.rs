// Dashboard view state for chart front ends.
//
// State is immutable: every update goes through `reduce`, which returns a new state and
// the list of fields that changed. `DashboardStore` holds the current state and notifies
// subscribed `StateObserver`s with those fields.
use crate::models::{Currency, DashboardDataset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateField {
    Dataset,
    Currency,
    PeriodWindow,
    HiddenMetrics,
}

#[derive(Debug, Clone)]
pub enum Action {
    LoadDataset(DashboardDataset),
    SetCurrency(Currency),
    /// Half-open range of period indexes, clamped to the loaded dataset.
    SetPeriodWindow { start: usize, end: usize },
    ResetPeriodWindow,
    ToggleMetric(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub dataset: Option<Arc<DashboardDataset>>,
    pub currency: Currency,
    pub period_window: Option<(usize, usize)>,
    pub hidden_metrics: BTreeSet<String>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            dataset: None,
            currency: Currency::Usd,
            period_window: None,
            hidden_metrics: BTreeSet::new(),
        }
    }
}

/// One chart-ready series derived from the state.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesView {
    pub metric: String,
    pub currency: Currency,
    pub periods: Vec<String>,
    pub values: Vec<Option<f64>>,
}

impl DashboardState {
    fn period_count(&self) -> usize {
        self.dataset.as_ref().map_or(0, |d| d.periods.len())
    }

    /// Indexes of the visible periods.
    pub fn visible_range(&self) -> std::ops::Range<usize> {
        let count = self.period_count();
        match self.period_window {
            Some((start, end)) => start.min(count)..end.min(count),
            None => 0..count,
        }
    }

    pub fn visible_series(&self) -> Vec<SeriesView> {
        let Some(dataset) = self.dataset.as_ref() else {
            return Vec::new();
        };
        let range = self.visible_range();
        dataset
            .metrics
            .iter()
            .filter(|metric| !self.hidden_metrics.contains(*metric))
            .filter_map(|metric| {
                let values = dataset.series(metric, self.currency)?.get(range.clone())?;
                Some(SeriesView {
                    metric: metric.clone(),
                    currency: self.currency,
                    periods: dataset.periods.get(range.clone())?.to_vec(),
                    values: values.to_vec(),
                })
            })
            .collect()
    }
}

fn clamp_window(start: usize, end: usize, count: usize) -> Option<(usize, usize)> {
    let end = end.min(count);
    if start >= end {
        None
    } else {
        Some((start, end))
    }
}

/// Applies `action` to `state`. The input state is never modified.
/// Misaligned datasets are ignored and report no changed fields.
pub fn reduce(state: &DashboardState, action: Action) -> (DashboardState, Vec<StateField>) {
    let mut next = state.clone();
    let mut changed = Vec::new();

    match action {
        // A dataset whose series do not match its periods is not loaded.
        Action::LoadDataset(dataset) if !dataset.is_aligned() => {}
        Action::LoadDataset(dataset) => {
            let count = dataset.periods.len();
            next.hidden_metrics.retain(|m| dataset.metrics.contains(m));
            next.period_window = state.period_window.and_then(|(s, e)| clamp_window(s, e, count));
            next.dataset = Some(Arc::new(dataset));
            changed.push(StateField::Dataset);
            if next.hidden_metrics != state.hidden_metrics {
                changed.push(StateField::HiddenMetrics);
            }
            if next.period_window != state.period_window {
                changed.push(StateField::PeriodWindow);
            }
        }
        Action::SetCurrency(currency) => {
            if currency != state.currency {
                next.currency = currency;
                changed.push(StateField::Currency);
            }
        }
        Action::SetPeriodWindow { start, end } => {
            next.period_window = clamp_window(start, end, state.period_count());
            if next.period_window != state.period_window {
                changed.push(StateField::PeriodWindow);
            }
        }
        Action::ResetPeriodWindow => {
            if state.period_window.is_some() {
                next.period_window = None;
                changed.push(StateField::PeriodWindow);
            }
        }
        Action::ToggleMetric(metric) => {
            if !next.hidden_metrics.remove(&metric) {
                next.hidden_metrics.insert(metric);
            }
            changed.push(StateField::HiddenMetrics);
        }
    }

    (next, changed)
}

pub trait StateObserver: Send {
    fn on_change(&mut self, state: &DashboardState, changed: &[StateField]);
}

#[derive(Default)]
pub struct DashboardStore {
    state: DashboardState,
    observers: Vec<Box<dyn StateObserver>>,
}

impl DashboardStore {
    pub fn new(state: DashboardState) -> Self {
        Self { state, observers: Vec::new() }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn subscribe(&mut self, observer: Box<dyn StateObserver>) {
        self.observers.push(observer);
    }

    /// Reduces the action into a new state. Observers are only notified when a field changed.
    pub fn dispatch(&mut self, action: Action) -> Vec<StateField> {
        let (next, changed) = reduce(&self.state, action);
        self.state = next;
        if !changed.is_empty() {
            for observer in self.observers.iter_mut() {
                observer.on_change(&self.state, &changed);
            }
        }
        changed
    }
}
