//! zpm - ZFS metrics exporter.
//!
//! Exposes pool, disk and ARC statistics over HTTP, runs periodic jobs under ledger
//! tracking, and initializes the ledger database.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod exporter;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

use zpm_core::collector::SystemRunner;
use zpm_core::ledger::{self, InitOutcome, Ledger};

use crate::exporter::ExporterArgs;

/// ZFS metrics exporter.
#[derive(Parser)]
#[command(name = "zpm", about = "ZFS metrics exporter", version = zpm_core::VERSION)]
struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve metrics over HTTP.
    Exporter(ExporterArgs),
    /// Run a job and record its completion time in the ledger.
    Cron(CronArgs),
    /// Initialize a ledger database.
    Createdb {
        /// Ledger database file.
        dbfile: PathBuf,
    },
}

#[derive(clap::Args)]
struct CronArgs {
    /// Run frequency, e.g. "daily". Becomes part of the metric name.
    runfreq: String,

    /// Ledger database file, created with `zpm createdb`.
    dbfile: PathBuf,

    /// Job name, exposed as the `cronjob` label.
    jobname: String,

    /// Command to run, with its arguments.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    cmd: Vec<String>,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["zpm", "zpm_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Exporter(args) => exporter::run(args),
        Command::Cron(args) => run_cron(args),
        Command::Createdb { dbfile } => run_createdb(dbfile),
    }
}

fn run_cron(args: CronArgs) -> ExitCode {
    match ledger::run_job(
        &SystemRunner,
        &args.runfreq,
        &args.dbfile,
        &args.jobname,
        &args.cmd,
    ) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(runfreq = %args.runfreq, job = %args.jobname, error = %e, "cron job failed");
            exit_code_for(e.exit_code())
        }
    }
}

/// Maps a child's exit status onto ours; anything unrepresentable becomes 1.
fn exit_code_for(code: Option<i32>) -> ExitCode {
    match code.and_then(|c| u8::try_from(c).ok()) {
        Some(c) if c != 0 => ExitCode::from(c),
        _ => ExitCode::FAILURE,
    }
}

fn run_createdb(dbfile: PathBuf) -> ExitCode {
    println!("Creating {}", dbfile.display());
    info!(path = %dbfile.display(), "creating ledger database");
    match Ledger::init(&dbfile) {
        Ok(outcome) => {
            println!("{}", createdb_message(outcome));
            info!(path = %dbfile.display(), outcome = ?outcome, "ledger initialization finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(path = %dbfile.display(), error = %e, "failed to initialize ledger");
            ExitCode::FAILURE
        }
    }
}

/// User-facing result line of `zpm createdb`, printed regardless of `-q`.
fn createdb_message(outcome: InitOutcome) -> &'static str {
    match outcome {
        InitOutcome::Created => "Done",
        InitOutcome::AlreadyInitialized => "Database already initialized",
    }
}
