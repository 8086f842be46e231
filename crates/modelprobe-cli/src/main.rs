//! ModelProbe CLI
//!
//! The `modelprobe` command benchmarks AI model endpoints and checks whether
//! they are what they claim to be.
//!
//! ## Commands
//!
//! - `run`: Run prompt suites against a set of models and store the results
//! - `results`: Show a stored run
//! - `compare`: Compare a baseline run against a suspect run
//! - `fingerprint`: Print the behavioral fingerprint of one model in a run
//! - `analyze`: Deep analysis over several suites with a fraud verdict
//! - `list`: List stored runs
//! - `report`: Show a stored fraud report

mod input;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};

use modelprobe_adapters::HttpAdapterFactory;
use modelprobe_core::{
    init_tracing, render_comparison_md, render_report_md, write_json, write_report_md,
    AnalysisRequest, BenchmarkRunner, FsRunRepository, ProbeService, RunId, RunLimits, RunRecord,
    RunRequest, Settings,
};

/// How often `run` polls the store while waiting for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "modelprobe")]
#[command(version = modelprobe_core::VERSION)]
#[command(about = "Behavioral fingerprinting and fraud detection for AI model endpoints", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding stored runs and reports
    #[arg(long, global = true, env = "MODELPROBE_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Maximum number of concurrent adapter calls
    #[arg(long, global = true)]
    max_concurrent: Option<usize>,

    /// Per-call timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run prompt suites against models and store the results
    Run {
        /// Model configs (JSON or TOML)
        #[arg(short, long)]
        models: PathBuf,

        /// Prompt suite files (JSON or TOML); several are combined into one run
        #[arg(short, long = "suite", required = true)]
        suites: Vec<PathBuf>,

        /// Run name
        #[arg(short, long, default_value = "benchmark")]
        name: String,

        /// Also write the finished run record to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show a stored run
    Results {
        run_id: String,

        /// Only show outcomes for this model
        #[arg(long)]
        model: Option<String>,

        /// Print raw JSON
        #[arg(long = "raw")]
        raw: bool,
    },

    /// Compare a baseline run against a suspect run
    Compare {
        baseline: String,
        suspect: String,

        /// Print raw JSON
        #[arg(long = "raw")]
        raw: bool,

        /// Also write the comparison as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the fingerprint of one model in a stored run
    Fingerprint {
        run_id: String,
        model: String,

        /// Fail when the model produced no usable response
        #[arg(long)]
        strict: bool,
    },

    /// Run a deep analysis and print the verdict
    Analyze {
        /// Model configs (JSON or TOML)
        #[arg(short, long)]
        models: PathBuf,

        /// Prompt suite files (JSON or TOML), run one after another
        #[arg(short, long = "suite", required = true)]
        suites: Vec<PathBuf>,

        /// Analysis name
        #[arg(short, long, default_value = "deep-analysis")]
        name: String,

        /// Write the report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the report as Markdown
        #[arg(long)]
        markdown: Option<PathBuf>,
    },

    /// List stored runs
    List,

    /// Show a stored fraud report
    Report {
        report_id: String,

        /// Render as Markdown instead of JSON
        #[arg(long)]
        markdown: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let settings = Settings::from_env().context("invalid environment configuration")?;

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        settings.log_level
    };
    init_tracing(cli.json || settings.log_json, level);

    let service = build_service(&cli, &settings)?;

    match cli.command {
        Commands::Run {
            models,
            suites,
            name,
            output,
        } => cmd_run(&service, &models, &suites, &name, output.as_deref()).await,
        Commands::Results { run_id, model, raw } => {
            cmd_results(&service, &run_id, model.as_deref(), raw).await
        }
        Commands::Compare {
            baseline,
            suspect,
            raw,
            output,
        } => cmd_compare(&service, &baseline, &suspect, raw, output.as_deref()).await,
        Commands::Fingerprint {
            run_id,
            model,
            strict,
        } => cmd_fingerprint(&service, &run_id, &model, strict).await,
        Commands::Analyze {
            models,
            suites,
            name,
            output,
            markdown,
        } => {
            cmd_analyze(
                &service,
                &models,
                &suites,
                &name,
                output.as_deref(),
                markdown.as_deref(),
            )
            .await
        }
        Commands::List => cmd_list(&service).await,
        Commands::Report {
            report_id,
            markdown,
        } => cmd_report(&service, &report_id, markdown).await,
    }
}

fn limits(cli: &Cli, settings: &Settings) -> RunLimits {
    let defaults = settings.limits();
    RunLimits::new(
        cli.max_concurrent.unwrap_or(defaults.concurrency_limit),
        cli.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.per_call_timeout),
    )
}

fn build_service(cli: &Cli, settings: &Settings) -> Result<ProbeService> {
    let store_dir = cli
        .store_dir
        .clone()
        .unwrap_or_else(|| settings.store_dir.clone());
    let repo = FsRunRepository::new(&store_dir)
        .with_context(|| format!("open store at {:?}", store_dir))?;
    let factory = HttpAdapterFactory::new(settings.credentials.clone())
        .context("Failed to create HTTP adapter factory")?;
    info!(store_dir = %store_dir.display(), "store opened");

    Ok(ProbeService::new(
        BenchmarkRunner::new(Arc::new(factory)),
        Arc::new(repo),
        limits(cli, settings),
    ))
}

async fn cmd_run(
    service: &ProbeService,
    models: &Path,
    suites: &[PathBuf],
    name: &str,
    output: Option<&Path>,
) -> Result<()> {
    let models = input::load_models(models)?;
    let suite = input::combined_suite(name, input::load_suites(suites)?)?;

    let run_id = service
        .start_run(RunRequest::new(name, models, suite))
        .await
        .context("Failed to start run")?;
    println!("Run {} started", run_id);

    let record = wait_for_run(service, &run_id).await?;
    print!("{}", render_run_summary(&record));
    if let Some(path) = output {
        write_json(path, &record)?;
        println!("Run record written to {:?}", path);
    }
    Ok(())
}

/// Poll until the run is terminal; the first Ctrl-C cancels it.
///
/// A run that is no longer executing but never reached a terminal state was
/// lost (its task died before storing the result).
async fn wait_for_run(service: &ProbeService, run_id: &RunId) -> Result<RunRecord> {
    let mut cancel_requested = false;
    loop {
        let active = service.is_active(run_id).await;
        let record = service.fetch_results(run_id).await?;
        if record.status.is_terminal() {
            return Ok(record);
        }
        if !active {
            bail!("run {} stopped without storing a result (status {})", run_id, record.status);
        }
        tokio::select! {
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
            signal = tokio::signal::ctrl_c(), if !cancel_requested => {
                signal.context("listen for Ctrl-C")?;
                cancel_requested = true;
                eprintln!("Cancelling run {}; waiting for in-flight probes", run_id);
                service.cancel_run(run_id).await?;
            }
        }
    }
}

fn render_run_summary(record: &RunRecord) -> String {
    let mut out = format!("Run {} ({}): {}\n", record.run_id, record.name, record.status);
    if let Some(reason) = &record.failure {
        out.push_str(&format!("Failure: {}\n", reason));
    }
    if let Some(result) = &record.result {
        let models: Vec<&str> = result.models.iter().map(|m| m.model_name.as_str()).collect();
        let stats = &result.stats;
        out.push_str(&format!(
            "Suite:     {} ({})\n",
            result.suite_name,
            &result.suite_digest[..12.min(result.suite_digest.len())]
        ));
        out.push_str(&format!("Models:    {}\n", models.join(", ")));
        out.push_str(&format!(
            "Outcomes:  {} total, {} ok, {} failed, {} timed out, {} cancelled\n",
            stats.total, stats.succeeded, stats.failed, stats.timed_out, stats.cancelled
        ));
        out.push_str(&format!("Duration:  {} ms\n", result.duration_ms()));
    }
    out
}

async fn cmd_results(
    service: &ProbeService,
    run_id: &str,
    model: Option<&str>,
    raw: bool,
) -> Result<()> {
    let run_id = RunId::from(run_id);
    let record = service.fetch_results(&run_id).await?;
    let outcomes = if record.result.is_some() {
        service.fetch_outcomes(&run_id, model).await?
    } else {
        Vec::new()
    };

    if raw {
        match model {
            Some(_) => println!("{}", serde_json::to_string_pretty(&outcomes)?),
            None => println!("{}", serde_json::to_string_pretty(&record)?),
        }
        return Ok(());
    }

    print!("{}", render_run_summary(&record));
    if outcomes.is_empty() {
        return Ok(());
    }
    println!();
    for o in &outcomes {
        let status = match &o.error {
            Some(failure) => failure.kind.to_string(),
            None => "ok".to_string(),
        };
        println!(
            "{:<28} {:<24} {:<10} {:>8.0} ms",
            truncate(&o.probe_id, 28),
            truncate(&o.model_name, 24),
            status,
            o.latency_ms
        );
    }
    Ok(())
}

async fn cmd_compare(
    service: &ProbeService,
    baseline: &str,
    suspect: &str,
    raw: bool,
    output: Option<&Path>,
) -> Result<()> {
    let comparison = service
        .compare_runs(&RunId::from(baseline), &RunId::from(suspect))
        .await?;
    if raw {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
    } else {
        print!("{}", render_comparison_md(&comparison));
        println!("\n{}", comparison.details);
    }
    if let Some(path) = output {
        write_json(path, &comparison)?;
    }
    Ok(())
}

async fn cmd_fingerprint(
    service: &ProbeService,
    run_id: &str,
    model: &str,
    strict: bool,
) -> Result<()> {
    let mut fingerprint = service.fingerprint(&RunId::from(run_id), model).await?;
    if strict {
        fingerprint = fingerprint.require_data()?;
    }
    println!("{}", serde_json::to_string_pretty(&fingerprint)?);
    Ok(())
}

async fn cmd_analyze(
    service: &ProbeService,
    models: &Path,
    suites: &[PathBuf],
    name: &str,
    output: Option<&Path>,
    markdown: Option<&Path>,
) -> Result<()> {
    let request = AnalysisRequest {
        name: name.to_string(),
        models: input::load_models(models)?,
        suites: input::load_suites(suites)?,
    };
    let report = service
        .deep_analysis(request)
        .await
        .context("Deep analysis failed")?;

    println!("{}", report.summary);
    println!("Report: {}", report.report_id);
    if let Some(path) = output {
        write_json(path, &report)?;
        println!("JSON report written to {:?}", path);
    }
    if let Some(path) = markdown {
        write_report_md(path, &report)?;
        println!("Markdown report written to {:?}", path);
    }
    Ok(())
}

async fn cmd_list(service: &ProbeService) -> Result<()> {
    let runs = service.list_runs().await?;
    if runs.is_empty() {
        println!("No runs found. Start one with 'modelprobe run'.");
        return Ok(());
    }
    for run in runs {
        println!(
            "{}  {:<10} {:<24} {} outcomes  {}",
            run.run_id,
            run.status.to_string(),
            truncate(&run.name, 24),
            run.outcomes,
            run.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

async fn cmd_report(service: &ProbeService, report_id: &str, markdown: bool) -> Result<()> {
    let report = service.get_report(report_id).await?;
    if markdown {
        print!("{}", render_report_md(&report));
    } else {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
