// Reader for a saved Google Sheets `values.get` response:
// {"range": "dashboard!A1:Z40", "majorDimension": "ROWS", "values": [["month", "Jan-25"], ...]}
use crate::data::table::{Cell, TableSource, WideTable};
use crate::error::PipelineError;
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetValues {
    #[serde(default)]
    range: Option<String>,
    #[serde(default)]
    major_dimension: Option<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

fn to_cell(value: Value) -> Cell {
    match value {
        Value::Null => Cell::Empty,
        Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
        Value::String(s) => Cell::from_text(&s),
        Value::Bool(b) => Cell::Text(b.to_string()),
        other => Cell::Text(other.to_string()),
    }
}

pub struct SheetValuesSource {
    path: PathBuf,
}

impl SheetValuesSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read_from<R: Read>(reader: R) -> Result<WideTable, PipelineError> {
        let sheet: SheetValues = serde_json::from_reader(reader)?;
        if let Some(dim) = sheet.major_dimension.as_deref() {
            if dim != "ROWS" {
                return Err(PipelineError::SourceError(format!(
                    "Unsupported majorDimension '{}'; export the sheet with ROWS",
                    dim
                )));
            }
        }
        tracing::debug!(range = ?sheet.range, rows = sheet.values.len(), "Decoded sheet values export");
        let grid = sheet
            .values
            .into_iter()
            .map(|row| row.into_iter().map(to_cell).collect())
            .collect();
        WideTable::from_grid(grid)
    }
}

impl TableSource for SheetValuesSource {
    fn describe(&self) -> String {
        format!("sheets_json:{}", self.path.display())
    }

    fn read_table(&self) -> Result<WideTable, PipelineError> {
        let file = File::open(&self.path)?;
        tracing::info!(path = %self.path.display(), "Reading wide KPI table from sheet values export");
        Self::read_from(BufReader::new(file))
    }
}
