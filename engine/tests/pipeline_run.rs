// End-to-end runs of the KPI pipeline against files on disk.
use engine::config::settings::{PipelineSettings, SourceKind};
use engine::error::{PipelineError, Stage};
use engine::pipeline::run_pipeline;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const KPI_CSV: &str = "\
month,2025-01-01 00:00:00,2025-02-01 00:00:00,2025-03-01 00:00:00
USD to EUR historical Rates (EoM),0.90,0.91,
GMV,\"$1,000\",\"$2,000\",\"$3,000\"
# Invoices,54,60,N/A
Cash Drag,0.15,0.20,0.25
";

fn settings_for(dir: &Path, input_name: &str, content: &str) -> PipelineSettings {
    let input = dir.join(input_name);
    fs::write(&input, content).unwrap();

    let mut settings = PipelineSettings::load_default().unwrap();
    settings.source.path = input;
    settings.output.dashboard_json = dir.join("out/dashboard.json");
    settings.output.pipeline_csv_usd = dir.join("out/pipeline_usd.csv");
    settings.output.pipeline_csv_eur = dir.join("out/pipeline_eur.csv");
    settings.output.long_csv = Some(dir.join("out/long.csv"));
    settings.output.report_json = Some(dir.join("out/report.json"));
    settings
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_full_run_writes_every_artifact() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path(), "kpis.csv", KPI_CSV);

    let outcome = run_pipeline(&settings).unwrap();
    assert_eq!(outcome.written.len(), 5);

    let dashboard = read_json(&dir.path().join("out/dashboard.json"));
    assert_eq!(dashboard["periods"], serde_json::json!(["Jan-25", "Feb-25", "Mar-25"]));
    assert_eq!(
        dashboard["metrics"],
        serde_json::json!(["GMV", "# Invoices", "Cash Drag", "USD to EUR historical Rates (EoM)"])
    );
    assert_eq!(dashboard["values_usd"]["GMV"], serde_json::json!([1000.0, 2000.0, 3000.0]));
    let eur_gmv = dashboard["values_eur"]["GMV"].as_array().unwrap();
    assert!((eur_gmv[0].as_f64().unwrap() - 900.0).abs() < 1e-9);
    assert!((eur_gmv[1].as_f64().unwrap() - 1820.0).abs() < 1e-9);
    assert!(eur_gmv[2].is_null());
    assert_eq!(dashboard["values_eur"]["# Invoices"], serde_json::json!([54.0, 60.0, null]));

    let usd_csv = fs::read_to_string(dir.path().join("out/pipeline_usd.csv")).unwrap();
    let mut lines = usd_csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "month,GMV,# Invoices,Cash Drag,USD to EUR historical Rates (EoM)"
    );
    assert_eq!(lines.next().unwrap(), "Jan-25,1000,54,0.15,0.9");

    let eur_csv = fs::read_to_string(dir.path().join("out/pipeline_eur.csv")).unwrap();
    assert!(eur_csv.lines().nth(3).unwrap().starts_with("Mar-25,,"));

    let report = read_json(&dir.path().join("out/report.json"));
    let kinds: Vec<&str> = report["issues"].as_array().unwrap().iter().map(|i| i["kind"].as_str().unwrap()).collect();
    assert_eq!(kinds, vec!["unparsable_cell", "missing_rate"]);
    assert_eq!(report["conversion_applied"], Value::Bool(true));
    assert_eq!(report["status"], "critical");
    assert_eq!(report["severity_counts"], serde_json::json!({"critical": 1, "warning": 1, "info": 0}));

    let long_csv = fs::read_to_string(dir.path().join("out/long.csv")).unwrap();
    assert_eq!(long_csv.lines().next().unwrap(), "metric,period,class,value_usd,value_eur");
    assert_eq!(long_csv.lines().count(), 1 + 4 * 3);
}

#[test]
fn test_failed_run_leaves_previous_artifacts_untouched() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path(), "kpis.csv", KPI_CSV);
    run_pipeline(&settings).unwrap();
    let before = fs::read_to_string(dir.path().join("out/dashboard.json")).unwrap();

    // Duplicate metric rows are malformed input.
    let broken = "month,Jan-25\nUSD to EUR historical Rates (EoM),0.9\nGMV,1\nGMV,2\n";
    let broken_settings = settings_for(dir.path(), "broken.csv", broken);
    let err = run_pipeline(&broken_settings).unwrap_err();
    assert_eq!(err.stage(), Stage::Reshape);

    let after = fs::read_to_string(dir.path().join("out/dashboard.json")).unwrap();
    assert_eq!(before, after);
    let leftovers: Vec<_> = fs::read_dir(dir.path().join("out"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left behind: {:?}", leftovers);
}

#[test]
fn test_unwritable_output_keeps_every_previous_artifact() {
    let dir = TempDir::new().unwrap();
    let mut settings = settings_for(dir.path(), "kpis.csv", KPI_CSV);
    run_pipeline(&settings).unwrap();
    let before = fs::read_to_string(dir.path().join("out/dashboard.json")).unwrap();

    // Another tool left a directory where the EUR table should go.
    let blocked = dir.path().join("out/blocked");
    fs::create_dir(&blocked).unwrap();
    settings.output.pipeline_csv_eur = blocked;
    settings.conversion.enabled = false;

    let err = run_pipeline(&settings).unwrap_err();
    assert_eq!(err.stage(), Stage::Write);
    assert_eq!(fs::read_to_string(dir.path().join("out/dashboard.json")).unwrap(), before);
    let stray: Vec<_> = fs::read_dir(dir.path().join("out"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with('.'))
        .collect();
    assert!(stray.is_empty(), "staging files left behind: {:?}", stray);
}

#[test]
fn test_missing_rate_row_aborts_run() {
    let dir = TempDir::new().unwrap();
    let settings = settings_for(dir.path(), "kpis.csv", "month,Jan-25\nGMV,\"$1,000\"\n");
    let err = run_pipeline(&settings).unwrap_err();
    assert!(matches!(err, PipelineError::MissingRateRow(ref label) if label == "USD to EUR historical Rates (EoM)"));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_sheets_export_source() {
    let dir = TempDir::new().unwrap();
    let export = r#"{
        "range": "dashboard!A1:C3",
        "majorDimension": "ROWS",
        "values": [
            ["month", "Jan-25", "Feb-25"],
            ["USD to EUR historical Rates (EoM)", 0.9, 0.91],
            ["GMV", "$1,000", 2000]
        ]
    }"#;
    let mut settings = settings_for(dir.path(), "export.json", export);
    settings.source.kind = SourceKind::SheetsJson;

    let outcome = run_pipeline(&settings).unwrap();
    assert!(outcome.report.source.starts_with("sheets_json:"));
    let gmv = outcome.dataset().values_eur["GMV"].clone();
    assert!((gmv[0].unwrap() - 900.0).abs() < 1e-9);
    assert!((gmv[1].unwrap() - 1820.0).abs() < 1e-9);
}

#[test]
fn test_skip_conversion_run() {
    let dir = TempDir::new().unwrap();
    let mut settings = settings_for(dir.path(), "kpis.csv", KPI_CSV);
    settings.conversion.enabled = false;

    let outcome = run_pipeline(&settings).unwrap();
    assert!(!outcome.report.conversion_applied);
    let dataset = outcome.dataset();
    assert_eq!(dataset.values_usd, dataset.values_eur);
}
