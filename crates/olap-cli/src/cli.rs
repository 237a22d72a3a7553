use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use olap_analytics::{AnalysisConfig, AnalysisKind, Orchestrator, RunReport, StarSchema};

use crate::generate::{self, GeneratorConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "olap-analyze", version)]
#[command(about = "Star-schema sales analytics over a directory of Parquet tables.")]
pub struct Cli {
    /// Log debug output (overrides `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the sales analyses and print one table per section.
    Run(RunArgs),
    /// Print the row and column counts of every table.
    Info(DataDir),
    /// Write a synthetic star schema as Parquet files.
    Generate(GenerateArgs),
}

#[derive(Args)]
struct DataDir {
    /// Directory holding `fact_sales.parquet` and the `dim_*.parquet` files.
    #[arg(long, env = "OLAP_DATA_PATH", default_value = "olap_data")]
    data_dir: PathBuf,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    data: DataDir,

    /// JSON run configuration; every field is optional.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run only these analyses (repeatable), e.g. `sales-by-time`.
    #[arg(long = "analysis", value_name = "KIND")]
    analyses: Vec<AnalysisKind>,

    /// Row limit of the "top N" sections.
    #[arg(long)]
    top_n: Option<usize>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Args)]
struct GenerateArgs {
    /// Output directory, created if missing.
    #[arg(long, default_value = "olap_data")]
    out: PathBuf,

    /// Number of fact rows.
    #[arg(long, default_value_t = 50_000)]
    rows: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Run(args) => run_analyses(args),
        Command::Info(args) => info(&args.data_dir),
        Command::Generate(args) => {
            let config = GeneratorConfig {
                rows: args.rows,
                seed: args.seed,
            };
            let schema = generate::generate(&config)?;
            generate::write_parquet(&schema, &args.out)?;
            let mut out = io::stdout().lock();
            for table in schema.tables() {
                writeln!(out, "{}: {} rows", table.name(), table.row_count())
                    .or_else(ignore_broken_pipe)?;
            }
            writeln!(out, "written to {}", args.out.display()).or_else(ignore_broken_pipe)?;
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // A second init in the same process (tests) keeps the first logger.
    let _ = builder.try_init();
}

fn load(data_dir: &Path) -> Result<StarSchema> {
    StarSchema::load_dir(data_dir)
        .with_context(|| format!("loading star schema from {}", data_dir.display()))
}

fn run_analyses(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_path(path)?,
        None => AnalysisConfig::default(),
    };
    if !args.analyses.is_empty() {
        config.analyses = args.analyses;
    }
    if let Some(top_n) = args.top_n {
        config.top_n = top_n;
    }

    let schema = load(&args.data.data_dir)?;
    let report = Orchestrator::new(Arc::new(schema), config).run();
    print_report(&report, args.format)?;

    if !report.is_success() {
        anyhow::bail!("{} of the analyses failed", report.failures.len());
    }
    Ok(())
}

fn print_report(report: &RunReport, format: OutputFormat) -> Result<()> {
    let mut out = io::stdout().lock();
    let written = match format {
        OutputFormat::Text => out.write_all(report.render_text().as_bytes()),
        OutputFormat::Json => serde_json::to_writer_pretty(&mut out, report)
            .map_err(io::Error::from)
            .and_then(|()| out.write_all(b"\n")),
    };
    written.or_else(ignore_broken_pipe)?;
    Ok(())
}

fn info(data_dir: &Path) -> Result<()> {
    let schema = load(data_dir)?;
    let mut out = io::stdout().lock();
    for table in schema.tables() {
        writeln!(
            out,
            "{}: {} rows, {} columns",
            table.name(),
            table.row_count(),
            table.column_count()
        )
        .or_else(ignore_broken_pipe)?;
    }
    Ok(())
}

// Downstream consumers such as `head` may close stdout early.
fn ignore_broken_pipe(err: io::Error) -> io::Result<()> {
    if err.kind() == io::ErrorKind::BrokenPipe {
        Ok(())
    } else {
        Err(err)
    }
}
