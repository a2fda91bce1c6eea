// KPI pipeline entry point: one-shot `run`, long-lived `serve`, and `check-config`.
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use engine::config::settings::{PipelineSettings, SourceKind};
use engine::data::run_store::RunStore;
use engine::pipeline;
use engine::services::pipeline_service::PipelineService;
use engine::services::DashboardPipelineServer;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tonic::transport::Server;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Reshapes a wide KPI table into USD/EUR dashboard artifacts", long_about = None)]
struct Cli {
    /// Settings file (JSON). The embedded defaults are used when omitted.
    #[arg(long, global = true, env = "KPI_PIPELINE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline once and write the output artifacts
    Run(RunArgs),
    /// Serve the DashboardPipeline gRPC trigger service
    Serve(ServeArgs),
    /// Validate the settings and metric catalog without reading the source
    CheckConfig,
}

#[derive(Args)]
struct RunArgs {
    /// Source table path (overrides settings)
    #[arg(short, long)]
    input: Option<PathBuf>,

    #[arg(long, value_parser = parse_source_kind)]
    source_kind: Option<SourceKind>,

    /// Dashboard JSON output path
    #[arg(long)]
    dashboard: Option<PathBuf>,

    #[arg(long)]
    pipeline_usd: Option<PathBuf>,

    #[arg(long)]
    pipeline_eur: Option<PathBuf>,

    /// Also write the long-format CSV here
    #[arg(long)]
    long_csv: Option<PathBuf>,

    /// Also write the run report JSON here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Pass USD values through to EUR instead of converting
    #[arg(long)]
    no_conversion: bool,
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,
}

fn parse_source_kind(raw: &str) -> Result<SourceKind, String> {
    match raw {
        "csv" => Ok(SourceKind::Csv),
        "sheets_json" | "sheets-json" => Ok(SourceKind::SheetsJson),
        other => Err(format!("unknown source kind '{}' (expected csv or sheets_json)", other)),
    }
}

impl RunArgs {
    fn apply(self, settings: &mut PipelineSettings) {
        if let Some(input) = self.input {
            settings.source.path = input;
        }
        if let Some(kind) = self.source_kind {
            settings.source.kind = kind;
        }
        if let Some(path) = self.dashboard {
            settings.output.dashboard_json = path;
        }
        if let Some(path) = self.pipeline_usd {
            settings.output.pipeline_csv_usd = path;
        }
        if let Some(path) = self.pipeline_eur {
            settings.output.pipeline_csv_eur = path;
        }
        if self.long_csv.is_some() {
            settings.output.long_csv = self.long_csv;
        }
        if self.report.is_some() {
            settings.output.report_json = self.report;
        }
        if self.no_conversion {
            settings.conversion.enabled = false;
        }
    }
}

fn run_once(settings: PipelineSettings) -> anyhow::Result<()> {
    let outcome = pipeline::run_pipeline(&settings).context("KPI pipeline run failed")?;
    for issue in &outcome.report.issues {
        warn!(%issue, "Data issue");
    }
    for path in &outcome.written {
        info!(path = %path.display(), "Artifact ready");
    }
    info!(
        run_id = %outcome.report.run_id,
        metrics = outcome.report.metrics_count,
        periods = outcome.report.periods_count,
        "Run finished"
    );
    Ok(())
}

async fn serve(settings: PipelineSettings, args: ServeArgs) -> anyhow::Result<()> {
    let mut settings = settings;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    settings.validate()?;

    let addr = settings
        .server_addr()
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", settings.server_addr()))?;
    info!("KPI pipeline service will listen on {}", addr);

    let run_store = Arc::new(RwLock::new(RunStore::new()));
    let service = PipelineService::new(settings, run_store);

    Server::builder()
        .add_service(DashboardPipelineServer::new(service))
        .serve(addr)
        .await
        .context("gRPC server terminated")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut settings = PipelineSettings::load(cli.config.as_deref())?;
    info!(version = %settings.version, "Starting KPI pipeline");

    match cli.command {
        Command::Run(args) => {
            args.apply(&mut settings);
            // The pipeline is synchronous file work; keep it off the async workers.
            tokio::task::spawn_blocking(move || run_once(settings)).await??;
        }
        Command::Serve(args) => serve(settings, args).await?,
        Command::CheckConfig => {
            settings.validate()?;
            let catalog = settings.build_catalog()?;
            info!(
                metrics = catalog.entries().len(),
                rate_metric = %catalog.rate_metric(),
                source = %settings.source.path.display(),
                "Configuration is valid"
            );
        }
    }
    Ok(())
}
