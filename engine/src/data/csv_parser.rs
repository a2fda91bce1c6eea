use crate::data::table::{Cell, TableSource, WideTable};
use crate::error::PipelineError;
use csv::ReaderBuilder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;

// Spreadsheet number formats: "$11,763,388", "1234.5", "15%", "-", "N/A".
pub mod currency_format {
    use super::Cell;
    use std::str::FromStr;

    /// Parses a monetary or numeric cell.
    ///
    /// `None` means "no data" and is never conflated with zero. Currency symbols,
    /// thousands separators and whitespace are stripped; a trailing `%` divides by 100.
    /// Parenthesized values like `($500)` are only read as negatives when
    /// `accounting_negatives` is set; otherwise they are unparsable.
    pub fn parse_amount(s: &str, accounting_negatives: bool) -> Option<f64> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == "-" || trimmed == "\u{2014}" {
            return None;
        }

        let mut cleaned: String = trimmed
            .chars()
            .filter(|c| !matches!(c, '$' | '\u{20ac}' | ',') && !c.is_whitespace())
            .collect();

        let mut negate = false;
        if cleaned.len() >= 2 && cleaned.starts_with('(') && cleaned.ends_with(')') {
            if !accounting_negatives {
                return None;
            }
            cleaned = cleaned[1..cleaned.len() - 1].to_string();
            negate = true;
        }

        let (number, divisor) = match cleaned.strip_suffix('%') {
            Some(n) => (n, 100.0),
            None => (cleaned.as_str(), 1.0),
        };

        let value = f64::from_str(number).ok()?;
        if !value.is_finite() {
            return None;
        }
        let value = value / divisor;
        Some(if negate { -value } else { value })
    }

    pub fn parse_cell(cell: &Cell, accounting_negatives: bool) -> Option<f64> {
        match cell {
            Cell::Empty => None,
            Cell::Number(v) if v.is_finite() => Some(*v),
            Cell::Number(_) => None,
            Cell::Text(s) => parse_amount(s, accounting_negatives),
        }
    }

    /// True when the cell had content that should have been a number. Blank and "-" cells
    /// are plain "no data" and do not count.
    pub fn is_unparsable(cell: &Cell, parsed: Option<f64>) -> bool {
        if parsed.is_some() {
            return false;
        }
        match cell {
            Cell::Empty => false,
            Cell::Number(_) => true,
            Cell::Text(s) => {
                let t = s.trim();
                !(t.is_empty() || t == "-" || t == "\u{2014}")
            }
        }
    }

}

/// Reads a wide KPI table from a CSV file (first row: label header + periods).
pub struct CsvTableSource {
    path: PathBuf,
    delimiter: u8,
}

impl CsvTableSource {
    pub fn new(path: impl Into<PathBuf>, delimiter: u8) -> Self {
        Self { path: path.into(), delimiter }
    }

    pub fn read_from<R: Read>(reader: R, delimiter: u8) -> Result<WideTable, PipelineError> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false) // the header row is part of the grid
            .flexible(true)
            .from_reader(reader);

        let mut grid = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| {
                PipelineError::SourceError(format!("Error reading CSV record at line {}: {}", idx + 1, e))
            })?;
            grid.push(record.iter().map(Cell::from_text).collect());
        }
        WideTable::from_grid(grid)
    }
}

impl TableSource for CsvTableSource {
    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    fn read_table(&self) -> Result<WideTable, PipelineError> {
        let file = File::open(&self.path)?;
        tracing::info!(path = %self.path.display(), "Reading wide KPI table from CSV");
        Self::read_from(BufReader::new(file), self.delimiter)
    }
}
