// Long → wide "pipeline" format: one row per period, one column per metric.
use crate::error::{PipelineError, Stage};
use crate::pipeline::reshape::LongTable;
use shared::models::{ConvertedRow, Currency, PipelineTable};
use std::collections::HashMap;

fn build<'a, I>(
    entries: I,
    periods: &[String],
    metrics: &[String],
    currency: Currency,
) -> Result<PipelineTable, PipelineError>
where
    I: IntoIterator<Item = (&'a str, &'a str, Option<f64>)>,
{
    let period_index: HashMap<&str, usize> = periods.iter().enumerate().map(|(i, p)| (p.as_str(), i)).collect();
    let metric_index: HashMap<&str, usize> = metrics.iter().enumerate().map(|(i, m)| (m.as_str(), i)).collect();

    let mut cells = vec![vec![None; metrics.len()]; periods.len()];
    let mut filled = vec![vec![false; metrics.len()]; periods.len()];

    for (metric, period, value) in entries {
        let row = *period_index
            .get(period)
            .ok_or_else(|| PipelineError::malformed(Stage::Pivot, format!("unknown period '{}' for metric '{}'", period, metric)))?;
        let col = *metric_index
            .get(metric)
            .ok_or_else(|| PipelineError::malformed(Stage::Pivot, format!("unknown metric '{}'", metric)))?;
        if filled[row][col] {
            return Err(PipelineError::malformed(
                Stage::Pivot,
                format!("more than one value for metric '{}' in period '{}'", metric, period),
            ));
        }
        filled[row][col] = true;
        cells[row][col] = value;
    }

    Ok(PipelineTable {
        currency,
        periods: periods.to_vec(),
        metrics: metrics.to_vec(),
        cells,
    })
}

/// Pivots converted rows for one currency. Columns follow `metrics`.
pub fn pivot(
    rows: &[ConvertedRow],
    periods: &[String],
    metrics: &[String],
    currency: Currency,
) -> Result<PipelineTable, PipelineError> {
    build(
        rows.iter().map(|r| (r.metric.as_str(), r.period.as_str(), r.value(currency))),
        periods,
        metrics,
        currency,
    )
}

/// Pivots the unconverted long table, columns in source order.
pub fn pivot_long(long: &LongTable) -> Result<PipelineTable, PipelineError> {
    build(
        long.rows.iter().map(|r| (r.metric.as_str(), r.period.as_str(), r.value)),
        &long.periods,
        &long.metrics,
        Currency::Usd,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::csv_parser::currency_format::parse_cell;
    use crate::data::table::{Cell, WideTable};
    use crate::pipeline::reshape::melt;
    use shared::models::ConversionClass;

    fn wide(rows: &[&[&str]]) -> WideTable {
        let grid = rows.iter().map(|r| r.iter().map(|c| Cell::from_text(c)).collect()).collect();
        WideTable::from_grid(grid).unwrap()
    }

    #[test]
    fn test_round_trip_reproduces_source_values() {
        let table = wide(&[
            &["month", "Jan-25", "Feb-25", "Mar-25"],
            &["GMV", "$11,763,388.25", "", "$0.1"],
            &["Cash Drag", "0.15", "N/A", "12.5%"],
            &["# Boxes", "91", "-", "1e3"],
        ]);
        let long = melt(&table, false, &mut Vec::new()).unwrap();
        let pivoted = pivot_long(&long).unwrap();

        assert_eq!(pivoted.periods, table.periods);
        assert_eq!(pivoted.metrics, vec!["GMV", "Cash Drag", "# Boxes"]);
        for (col, source_row) in table.rows.iter().enumerate() {
            for (row, cell) in source_row.cells.iter().enumerate() {
                let expected = parse_cell(cell, false);
                let actual = pivoted.cells[row][col];
                // Bit-for-bit equality, with None standing in for empty strings.
                assert_eq!(actual.map(f64::to_bits), expected.map(f64::to_bits));
            }
        }
    }

    #[test]
    fn test_pivot_selects_currency() {
        let periods = vec!["Jan-25".to_string()];
        let metrics = vec!["GMV".to_string()];
        let rows = vec![ConvertedRow {
            metric: "GMV".to_string(),
            period: "Jan-25".to_string(),
            class: ConversionClass::Monetary,
            usd: Some(1000.0),
            eur: Some(900.0),
        }];
        let usd = pivot(&rows, &periods, &metrics, Currency::Usd).unwrap();
        let eur = pivot(&rows, &periods, &metrics, Currency::Eur).unwrap();
        assert_eq!(usd.get("Jan-25", "GMV"), Some(1000.0));
        assert_eq!(eur.get("Jan-25", "GMV"), Some(900.0));
        assert_eq!(eur.currency, Currency::Eur);
    }

    #[test]
    fn test_pivot_rejects_duplicate_cell() {
        let periods = vec!["Jan-25".to_string()];
        let metrics = vec!["GMV".to_string()];
        let row = ConvertedRow {
            metric: "GMV".to_string(),
            period: "Jan-25".to_string(),
            class: ConversionClass::Monetary,
            usd: Some(1.0),
            eur: Some(1.0),
        };
        let err = pivot(&[row.clone(), row], &periods, &metrics, Currency::Usd).unwrap_err();
        assert_eq!(err.stage(), Stage::Pivot);
        assert!(err.to_string().contains("more than one value for metric 'GMV'"));
    }

    #[test]
    fn test_pivot_missing_cells_stay_none() {
        let periods = vec!["Jan-25".to_string(), "Feb-25".to_string()];
        let metrics = vec!["GMV".to_string()];
        let rows = vec![ConvertedRow {
            metric: "GMV".to_string(),
            period: "Feb-25".to_string(),
            class: ConversionClass::Monetary,
            usd: Some(2.0),
            eur: None,
        }];
        let table = pivot(&rows, &periods, &metrics, Currency::Usd).unwrap();
        assert_eq!(table.cells, vec![vec![None], vec![Some(2.0)]]);
    }
}
