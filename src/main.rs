use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use covtree::app::{handle_fatal_error, init_logging, AppConfig};
use covtree::config::{ConfigLoader, CoverageConfig};
use covtree::coverage::report::{render_json, render_text, tree_rows, ReportRow};
use covtree::coverage::{
    CollectionReport, ConsoleProgress, CoverageSession, NoopProgress, ProgressReporter,
    RefreshOutcome,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

/// Collect statement coverage for a source tree and report it per file and folder
#[derive(Parser)]
#[command(name = "covtree", version)]
#[command(about = "Hierarchical statement coverage through an external coverage tool", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file applied after the global and project files
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Interpreter that runs the coverage script
    #[arg(long, global = true)]
    interpreter: Option<PathBuf>,

    /// Coverage analysis script
    #[arg(long, global = true)]
    script: Option<PathBuf>,

    /// Directory holding the `.coverage` data file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Do not show a progress spinner
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect coverage for every source file below ROOT and print the report
    Refresh {
        /// Folder to collect coverage for
        root: PathBuf,

        /// Only report these files or folders
        #[arg(long = "show", value_name = "PATH")]
        show: Vec<PathBuf>,

        /// Report format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Erase the coverage data collected so far
    Erase,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let app = AppConfig::new(cli.global.verbose).with_progress(!cli.global.no_progress);
    init_logging(&app);

    let result = match cli.command {
        Commands::Refresh { root, show, format } => {
            run_refresh(&cli.global, &app, &root, &show, format).await
        }
        Commands::Erase => run_erase(&cli.global).await,
    };

    if let Err(e) = result {
        handle_fatal_error(e, app.verbose);
    }
}

/// Configuration files and environment, then command line flags on top
async fn load_config(args: &GlobalArgs, project_root: &Path) -> anyhow::Result<CoverageConfig> {
    let mut config = ConfigLoader::new()
        .load(Some(project_root), args.config.as_deref())
        .await?;

    let mut overrides = CoverageConfig::new();
    overrides.tool.interpreter = args.interpreter.clone();
    overrides.tool.script = args.script.clone();
    overrides.tool.data_dir = args.data_dir.clone();
    config.merge(overrides);

    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

async fn run_refresh(
    args: &GlobalArgs,
    app: &AppConfig,
    root: &Path,
    show: &[PathBuf],
    format: OutputFormat,
) -> anyhow::Result<()> {
    let config = load_config(args, root).await?;
    let session = CoverageSession::from_config(&config)?;

    let console = app
        .show_progress
        .then(|| Arc::new(ConsoleProgress::new("Collecting coverage...")));
    let progress: Arc<dyn ProgressReporter> = match &console {
        Some(console) => {
            let cancel = console.cancel_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.store(true, Ordering::SeqCst);
                }
            });
            console.clone() as Arc<dyn ProgressReporter>
        }
        None => Arc::new(NoopProgress) as Arc<dyn ProgressReporter>,
    };

    let outcome = session.refresh(root, progress).await?;

    let (collection, failure) = match outcome {
        RefreshOutcome::NoData => {
            if let Some(console) = &console {
                console.success("No source files found");
            }
            eprintln!("No source files found below {}", root.display());
            return Ok(());
        }
        RefreshOutcome::Completed(report) => {
            if let Some(console) = &console {
                console.success(&summary_line(&report));
            }
            (report, None)
        }
        RefreshOutcome::Cancelled(report) => {
            if let Some(console) = &console {
                console.error("Cancelled");
            }
            warn!("Collection cancelled; the report is incomplete");
            (report, None)
        }
        RefreshOutcome::Failed { error, report } => {
            if let Some(console) = &console {
                console.error("Coverage collection failed");
            }
            (report, Some(error))
        }
    };

    let rows = if show.is_empty() {
        tree_rows(&session.cache())
    } else {
        show.iter()
            .map(|path| {
                let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
                session.query(&path).map(ReportRow::standalone)
            })
            .collect::<covtree::Result<Vec<_>>>()?
    };

    match format {
        OutputFormat::Text => print!("{}", render_text(&rows)),
        OutputFormat::Json => println!(
            "{}",
            render_json(&rows, Some(&collection)).context("Failed to render JSON report")?
        ),
    }

    match failure {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

fn summary_line(report: &CollectionReport) -> String {
    let mut line = format!(
        "Collected coverage for {} of {} files",
        report.coverage_records, report.files_requested
    );
    if report.error_records > 0 {
        line.push_str(&format!(", {} could not be analyzed", report.error_records));
    }
    if let Some(status) = report.exit_status.as_ref().filter(|status| !status.success()) {
        line.push_str(&format!(" (tool {})", status));
    }
    line
}

async fn run_erase(args: &GlobalArgs) -> anyhow::Result<()> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    let config = load_config(args, &current_dir).await?;
    let session = CoverageSession::from_config(&config)?;

    session.erase().await?;
    println!("Coverage data erased");
    Ok(())
}
