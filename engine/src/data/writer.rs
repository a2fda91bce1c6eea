// Output artifacts are staged as temp files next to their destination and only renamed
// into place once every artifact of the run has been written successfully.
use crate::error::PipelineError;
use shared::models::{ConvertedRow, DashboardDataset, PipelineTable};
use shared::report::PipelineReport;
use shared::utils::format_value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile, TempPath};

fn write_error(path: &Path, reason: impl std::fmt::Display) -> PipelineError {
    PipelineError::WriteError { path: path.display().to_string(), reason: reason.to_string() }
}

pub struct OutputBatch {
    staged: Vec<(NamedTempFile, PathBuf)>,
}

impl OutputBatch {
    pub fn new() -> Self {
        Self { staged: Vec::new() }
    }

    fn stage<F>(&mut self, path: &Path, write: F) -> Result<(), PipelineError>
    where
        F: FnOnce(&mut NamedTempFile) -> Result<(), PipelineError>,
    {
        if path.is_dir() {
            return Err(write_error(path, "destination is a directory"));
        }
        let dir = parent_dir(path);
        std::fs::create_dir_all(&dir).map_err(|e| write_error(path, e))?;
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| write_error(path, e))?;
        write(&mut tmp)?;
        tmp.as_file().sync_all().map_err(|e| write_error(path, e))?;
        self.staged.push((tmp, path.to_path_buf()));
        Ok(())
    }

    pub fn stage_json<T: serde::Serialize>(&mut self, path: &Path, value: &T) -> Result<(), PipelineError> {
        self.stage(path, |tmp| {
            serde_json::to_writer_pretty(&mut *tmp, value)?;
            writeln!(tmp).map_err(|e| write_error(path, e))
        })
    }

    pub fn stage_dataset(&mut self, path: &Path, dataset: &DashboardDataset) -> Result<(), PipelineError> {
        self.stage_json(path, dataset)
    }

    pub fn stage_report(&mut self, path: &Path, report: &PipelineReport) -> Result<(), PipelineError> {
        self.stage_json(path, report)
    }

    /// Pipeline format: `month` plus one column per metric, one row per period.
    pub fn stage_pipeline_csv(&mut self, path: &Path, table: &PipelineTable) -> Result<(), PipelineError> {
        self.stage(path, |tmp| {
            let mut wtr = csv::Writer::from_writer(tmp);
            let mut header = Vec::with_capacity(table.metrics.len() + 1);
            header.push("month");
            header.extend(table.metrics.iter().map(String::as_str));
            wtr.write_record(&header)?;
            for (period, row) in table.periods.iter().zip(&table.cells) {
                let mut record = Vec::with_capacity(row.len() + 1);
                record.push(period.clone());
                record.extend(row.iter().map(|v| format_value(*v)));
                wtr.write_record(&record)?;
            }
            wtr.flush()?;
            Ok(())
        })
    }

    pub fn stage_long_csv(&mut self, path: &Path, rows: &[ConvertedRow]) -> Result<(), PipelineError> {
        self.stage(path, |tmp| {
            let mut wtr = csv::Writer::from_writer(tmp);
            wtr.write_record(["metric", "period", "class", "value_usd", "value_eur"])?;
            for row in rows {
                wtr.write_record([
                    row.metric.clone(),
                    row.period.clone(),
                    row.class.to_string(),
                    format_value(row.usd),
                    format_value(row.eur),
                ])?;
            }
            wtr.flush()?;
            Ok(())
        })
    }

    /// Renames every staged file over its destination. Returns the written paths.
    ///
    /// Each destination that already exists is copied to a backup first. If any rename
    /// fails, the destinations replaced so far are restored from their backups.
    pub fn commit(self) -> Result<Vec<PathBuf>, PipelineError> {
        let mut committed: Vec<(PathBuf, Option<TempPath>)> = Vec::with_capacity(self.staged.len());
        for (tmp, path) in self.staged {
            let backup = match backup_existing(&path) {
                Ok(b) => b,
                Err(e) => {
                    rollback(committed);
                    return Err(e);
                }
            };
            if let Err(e) = tmp.persist(&path) {
                committed.push((path.clone(), backup));
                rollback(committed);
                return Err(write_error(&path, e.error));
            }
            committed.push((path, backup));
        }

        let mut written = Vec::with_capacity(committed.len());
        for (path, _backup) in committed {
            tracing::info!(path = %path.display(), "Wrote output artifact");
            written.push(path);
        }
        Ok(written)
    }
}

fn backup_existing(path: &Path) -> Result<Option<TempPath>, PipelineError> {
    if !path.exists() {
        return Ok(None);
    }
    let backup = Builder::new()
        .prefix(".bak")
        .tempfile_in(parent_dir(path))
        .map_err(|e| write_error(path, e))?
        .into_temp_path();
    std::fs::copy(path, &backup).map_err(|e| write_error(path, e))?;
    Ok(Some(backup))
}

/// Puts back what was there before, newest first. Destinations that did not exist are removed.
fn rollback(committed: Vec<(PathBuf, Option<TempPath>)>) {
    for (path, backup) in committed.into_iter().rev() {
        let restored = match backup {
            Some(b) => b.persist(&path).map_err(|e| e.error),
            None => match std::fs::remove_file(&path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        match restored {
            Ok(()) => tracing::warn!(path = %path.display(), "Rolled back output artifact"),
            Err(e) => tracing::error!(path = %path.display(), error = %e, "Failed to roll back output artifact"),
        }
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

impl Default for OutputBatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::Currency;
    use std::collections::BTreeMap;

    fn sample_table() -> PipelineTable {
        PipelineTable {
            currency: Currency::Usd,
            periods: vec!["Jan-25".to_string(), "Feb-25".to_string()],
            metrics: vec!["GMV".to_string(), "Cash Drag".to_string()],
            cells: vec![vec![Some(1000.0), Some(0.15)], vec![None, Some(0.2)]],
        }
    }

    #[test]
    fn test_pipeline_csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/pipeline.csv");
        let mut batch = OutputBatch::new();
        batch.stage_pipeline_csv(&path, &sample_table()).unwrap();
        assert!(!path.exists(), "nothing is visible before commit");
        batch.commit().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "month,GMV,Cash Drag\nJan-25,1000,0.15\nFeb-25,,0.2\n");
    }

    #[test]
    fn test_dropped_batch_leaves_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard_data.json");
        std::fs::write(&path, "previous").unwrap();

        let dataset = DashboardDataset {
            metrics: vec![],
            periods: vec![],
            values_usd: BTreeMap::new(),
            values_eur: BTreeMap::new(),
        };
        let mut batch = OutputBatch::new();
        batch.stage_dataset(&path, &dataset).unwrap();
        drop(batch);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous");
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_commit_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard_data.json");
        std::fs::write(&path, "previous").unwrap();

        let mut usd = BTreeMap::new();
        usd.insert("GMV".to_string(), vec![Some(1.0), None]);
        let dataset = DashboardDataset {
            metrics: vec!["GMV".to_string()],
            periods: vec!["Jan-25".to_string(), "Feb-25".to_string()],
            values_usd: usd.clone(),
            values_eur: usd,
        };
        let mut batch = OutputBatch::new();
        batch.stage_dataset(&path, &dataset).unwrap();
        let written = batch.commit().unwrap();
        assert_eq!(written, vec![path.clone()]);

        let parsed: DashboardDataset = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, dataset);
    }

    fn empty_dataset() -> DashboardDataset {
        DashboardDataset {
            metrics: vec![],
            periods: vec![],
            values_usd: BTreeMap::new(),
            values_eur: BTreeMap::new(),
        }
    }

    #[test]
    fn test_directory_destination_is_rejected_when_staging() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("usd_dir");
        std::fs::create_dir(&blocked).unwrap();

        let mut batch = OutputBatch::new();
        let err = batch.stage_pipeline_csv(&blocked, &sample_table()).unwrap_err();
        assert!(err.to_string().contains("destination is a directory"));
    }

    #[test]
    fn test_failed_commit_restores_replaced_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let dashboard = dir.path().join("dashboard.json");
        let usd = dir.path().join("pipeline_usd.csv");
        let fresh = dir.path().join("long.csv");
        std::fs::write(&dashboard, "previous").unwrap();

        let mut batch = OutputBatch::new();
        batch.stage_dataset(&dashboard, &empty_dataset()).unwrap();
        batch.stage_long_csv(&fresh, &[]).unwrap();
        batch.stage_pipeline_csv(&usd, &sample_table()).unwrap();
        // The last destination turns into a directory between staging and commit.
        std::fs::create_dir(&usd).unwrap();

        let err = batch.commit().unwrap_err();
        assert!(matches!(err, PipelineError::WriteError { .. }));
        assert_eq!(std::fs::read_to_string(&dashboard).unwrap(), "previous");
        assert!(!fresh.exists(), "artifacts created by the failed commit are removed");

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["dashboard.json", "pipeline_usd.csv"]);
    }
}
