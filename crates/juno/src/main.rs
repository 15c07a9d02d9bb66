use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use juno_config::{ReporterConfig, Verbosity};
use juno_reporter::{Reporter, RunReporter, dispatch, read_rerun_manifest};
use juno_types::TestEvent;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Reporter config file [default: ./juno.toml when present]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    log: clap_verbosity_flag::Verbosity,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a recorded JSON-lines stream of test lifecycle events
    Replay(ReplayArgs),
    /// Print the failed tests of the last run as re-invocation arguments
    Rerun,
}

#[derive(Args)]
struct ReplayArgs {
    /// Event stream file, or `-` for stdin
    #[arg(default_value = "-")]
    events: PathBuf,

    #[arg(long, value_enum)]
    verbosity: Option<OutputLevel>,

    #[arg(long)]
    no_color: bool,

    /// Print the given number of slowest tests
    #[arg(short = 's', long)]
    slow_tests: Option<usize>,

    /// Write a JUnit XML report to this path
    #[arg(long)]
    junit: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputLevel {
    Quiet,
    Dots,
    Verbose,
}

impl From<OutputLevel> for Verbosity {
    fn from(level: OutputLevel) -> Self {
        match level {
            OutputLevel::Quiet => Verbosity::Quiet,
            OutputLevel::Dots => Verbosity::Dots,
            OutputLevel::Verbose => Verbosity::Verbose,
        }
    }
}

impl ReplayArgs {
    fn apply(&self, config: &mut ReporterConfig) {
        if let Some(level) = self.verbosity {
            config.verbosity = level.into();
        }
        if self.no_color {
            config.color = false;
        }
        if let Some(count) = self.slow_tests {
            config.slow_test_count = count;
        }
        if let Some(path) = &self.junit {
            config.junit_path = Some(path.clone());
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ReporterConfig> {
    match path {
        Some(path) => ReporterConfig::load(path).context("failed to load reporter config"),
        None => {
            let cwd = std::env::current_dir().context("failed to resolve working directory")?;
            ReporterConfig::discover(&cwd).context("failed to load reporter config")
        }
    }
}

/// Feeds every event in `reader` to a reporter built from the `run_start`
/// event, and returns the reporter once the run is complete.
fn replay<W: io::Write>(
    config: &ReporterConfig,
    reader: impl BufRead,
    writer: W,
) -> Result<RunReporter<W>> {
    let mut writer = Some(writer);
    let mut reporter: Option<RunReporter<W>> = None;
    let mut completed = false;

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.context("failed to read event stream")?;
        if line.trim().is_empty() {
            continue;
        }
        let event: TestEvent = serde_json::from_str(&line)
            .with_context(|| format!("invalid event on line {line_no}"))?;

        if let Some(total) = event.expected_total() {
            let Some(mut writer) = writer.take() else {
                bail!("line {line_no}: run_start seen twice");
            };
            writeln!(writer, "{total} tests found").context("failed to write to output")?;
            reporter = Some(RunReporter::with_writer(config, total, writer));
        }
        let Some(reporter) = reporter.as_mut() else {
            bail!("line {line_no}: event before run_start");
        };
        completed |= event == TestEvent::RunComplete;
        dispatch(reporter, &event);
    }

    let mut reporter = reporter.context("event stream contained no run_start event")?;
    if !completed {
        log::warn!("event stream ended without run_complete; finishing the run");
        reporter.on_run_complete();
    }
    Ok(reporter)
}

fn rerun_arguments(config: &ReporterConfig) -> Result<String> {
    let entries = read_rerun_manifest(&config.rerun_log)?;
    if entries.is_empty() {
        log::info!("no failed tests in {}", config.rerun_log.display());
    }
    Ok(entries.join(" "))
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log.log_level_filter())
        .init();

    let mut config = load_config(cli.config.as_deref())?;
    match &cli.command {
        Commands::Replay(args) => {
            args.apply(&mut config);
            let reporter = if args.events == Path::new("-") {
                replay(&config, io::stdin().lock(), io::stderr())?
            } else {
                let file = File::open(&args.events)
                    .with_context(|| format!("failed to open {}", args.events.display()))?;
                replay(&config, BufReader::new(file), io::stderr())?
            };
            Ok(if reporter.was_successful() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Rerun => {
            let args = rerun_arguments(&config)?;
            if !args.is_empty() {
                println!("{args}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
