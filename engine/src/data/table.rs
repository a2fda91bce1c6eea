// In-memory wide table as read from a spreadsheet export, before any reshaping.
use crate::error::{PipelineError, Stage};
use shared::utils::normalize_period_label;
use std::collections::HashSet;

/// A raw spreadsheet cell. Sheets exports may hand us numbers directly; CSV only has text.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn from_text(s: &str) -> Self {
        if s.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Source rendering of the cell, used in issue reports.
    pub fn raw(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(v) => v.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    /// 1-based row number in the source, header included.
    pub line: usize,
    pub metric: String,
    /// One cell per period, padded with `Cell::Empty` when the source row is short.
    pub cells: Vec<Cell>,
}

/// Wide format: one row per metric, one column per period.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    pub label_header: String,
    pub periods: Vec<String>,
    pub rows: Vec<SourceRow>,
}

impl WideTable {
    /// Builds a table from a raw grid where row 0 holds the period labels and column 0
    /// the metric names.
    ///
    /// Trailing empty header columns and fully blank rows are spreadsheet padding and are
    /// dropped. Metric-name checks are left to the reshaper.
    pub fn from_grid(grid: Vec<Vec<Cell>>) -> Result<Self, PipelineError> {
        let mut grid = grid.into_iter();
        let header = grid
            .next()
            .ok_or_else(|| PipelineError::malformed(Stage::Read, "missing header row"))?;

        let mut header: Vec<String> = header.iter().map(|c| c.raw().trim().to_string()).collect();
        while header.len() > 1 && header.last().map_or(false, |h| h.is_empty()) {
            header.pop();
        }
        if header.len() < 2 {
            return Err(PipelineError::malformed(
                Stage::Read,
                "header row must contain at least one period label",
            ));
        }

        let label_header = header[0].clone();
        let mut periods = Vec::with_capacity(header.len() - 1);
        let mut seen = HashSet::new();
        for (col, label) in header.iter().enumerate().skip(1) {
            if label.is_empty() {
                return Err(PipelineError::malformed(
                    Stage::Read,
                    format!("empty period label in header column {}", col + 1),
                ));
            }
            let period = normalize_period_label(label);
            if !seen.insert(period.clone()) {
                return Err(PipelineError::malformed(
                    Stage::Read,
                    format!("duplicate period label '{}' in header", period),
                ));
            }
            periods.push(period);
        }

        let width = periods.len();
        let mut rows = Vec::new();
        for (idx, record) in grid.enumerate() {
            let line = idx + 2;
            if record.iter().all(Cell::is_empty) {
                continue;
            }
            let mut record = record.into_iter();
            let metric = record.next().map(|c| c.raw().trim().to_string()).unwrap_or_default();
            let mut cells: Vec<Cell> = record.collect();
            if cells.len() > width {
                if cells[width..].iter().any(|c| !c.is_empty()) {
                    return Err(PipelineError::malformed(
                        Stage::Read,
                        format!("row {} has more cells than the header has periods", line),
                    ));
                }
                cells.truncate(width);
            }
            cells.resize(width, Cell::Empty);
            rows.push(SourceRow { line, metric, cells });
        }

        Ok(WideTable { label_header, periods, rows })
    }
}

/// Where a pipeline run gets its wide table from.
pub trait TableSource: Send + Sync {
    fn describe(&self) -> String;
    fn read_table(&self) -> Result<WideTable, PipelineError>;
}
