use anyhow::Result;
use clap::{Parser, Subcommand};
use perfscan::commands::{
    list_detectors_command, list_findings_command, list_runs_command, scan_command, ScanOptions,
};
use tracing_subscriber::EnvFilter;

/// Static detector for known performance anti-patterns in compiled programs.
///
/// This CLI is a thin wrapper around `perfscan-core`; the detectors, the
/// engine and the findings database all live in the library.
#[derive(Parser, Debug)]
#[command(
    name = "perfscan",
    version,
    about = "Find known performance anti-patterns in program IR",
    long_about = None
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). Logs go to stderr.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one detector over a program dump.
    ///
    /// Findings are printed as `<file>:<line>` followed by the source text
    /// and any context lines.
    Scan {
        /// Program dump (JSON) to analyze.
        #[arg(long)]
        program: Option<String>,

        /// Detector identifier, e.g. `MozillaBug35294`. See `perfscan detectors`.
        #[arg(long)]
        bug: Option<String>,

        /// Scan config file (YAML, or JSON with a `.json` extension). Flags override it.
        #[arg(long)]
        config: Option<String>,

        /// Base directory for debug locations recorded with relative directories.
        #[arg(long)]
        source_root: Option<String>,

        /// Record the run and its findings into this database.
        #[arg(long)]
        record: Option<String>,

        /// Optional note stored with a recorded run.
        #[arg(long)]
        description: Option<String>,

        /// Emit findings as JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the known detector identifiers.
    Detectors {
        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List scan runs recorded in a database.
    Runs {
        /// Scan database path.
        #[arg(long)]
        db: String,

        /// Only runs of this detector.
        #[arg(long)]
        bug: Option<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show the findings of one recorded run.
    Findings {
        /// Scan database path.
        #[arg(long)]
        db: String,

        /// Run id as shown by `perfscan runs`.
        #[arg(long)]
        run: i64,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Scan { program, bug, config, source_root, record, description, json } => {
            let options =
                ScanOptions { program, bug, config, source_root, record, description, json };
            scan_command(&options)?
        }
        Command::Detectors { json } => list_detectors_command(json)?,
        Command::Runs { db, bug, json } => list_runs_command(&db, bug.as_deref(), json)?,
        Command::Findings { db, run, json } => list_findings_command(&db, run, json)?,
    }

    Ok(())
}
