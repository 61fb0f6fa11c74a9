use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use perfscan_core::config::{load_scan_config, ScanConfig};
use perfscan_core::db::{timestamp, ScanDb, ScanRunRecord, ScanStatus};
use perfscan_core::engine::Engine;
use perfscan_core::report::{Finding, FindingSink};
use perfscan_core::source::LocationResolver;
use tracing::info;

use crate::{canonicalize_or_current, load_program, sha256_file};

/// Options for one scan as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub program: Option<String>,
    pub bug: Option<String>,
    pub config: Option<String>,
    pub source_root: Option<String>,
    pub record: Option<String>,
    pub description: Option<String>,
    pub json: bool,
}

/// Prints findings as they are reported and keeps them for recording.
struct ReportSink {
    echo: bool,
    findings: Vec<Finding>,
}

impl FindingSink for ReportSink {
    fn emit(&mut self, finding: Finding) {
        if self.echo {
            println!("{finding}\n");
        }
        self.findings.push(finding);
    }
}

/// Merge the config file (if any) with command-line flags; flags win.
pub fn resolve_scan_config(options: &ScanOptions) -> Result<ScanConfig> {
    let mut config = match &options.config {
        Some(path) => load_scan_config(Path::new(path))?,
        None => ScanConfig::default(),
    };
    if let Some(program) = &options.program {
        config.program = PathBuf::from(program);
    }
    if let Some(bug) = &options.bug {
        config.bug = bug.clone();
    }
    if let Some(root) = &options.source_root {
        config.source_root = Some(PathBuf::from(root));
    }
    if let Some(record) = &options.record {
        config.record = Some(PathBuf::from(record));
    }
    if options.description.is_some() {
        config.description = options.description.clone();
    }
    Ok(config)
}

/// Run one detector over a program dump and print what it finds.
pub fn scan_command(options: &ScanOptions) -> Result<()> {
    let config = resolve_scan_config(options)?;
    let detector = config.validate()?;

    let program_path = canonicalize_or_current(&config.program.to_string_lossy())?;
    let (program, loops) = load_program(&program_path)?;
    info!(program = %program_path.display(), bug = %detector, "loaded program");

    let resolver = match &config.source_root {
        Some(root) => {
            LocationResolver::with_source_root(canonicalize_or_current(&root.to_string_lossy())?)
        }
        None => LocationResolver::new(),
    };

    let recorder = match &config.record {
        Some(db_path) => {
            let db = ScanDb::open(db_path)
                .with_context(|| format!("Failed to open scan database at {}", db_path.display()))?;
            let record =
                ScanRunRecord::start_now(program_path.display().to_string(), detector.as_str())
                    .with_hash(Some(sha256_file(&program_path)?))
                    .with_description(config.description.clone());
            let run_id = db.insert_scan_run(&record).context("Failed to record scan run")?;
            Some((db, run_id))
        }
        None => None,
    };

    let mut sink = ReportSink { echo: !options.json, findings: Vec::new() };
    let outcome = Engine::new(detector, &program, &loops, resolver).run(&mut sink);

    if let Some((db, run_id)) = &recorder {
        let status = if outcome.is_ok() { ScanStatus::Succeeded } else { ScanStatus::Failed };
        db.insert_findings(*run_id, &sink.findings).context("Failed to record findings")?;
        db.finish_scan_run(*run_id, status, &timestamp(), sink.findings.len() as i64)
            .context("Failed to finish scan run")?;
        info!(run_id, findings = sink.findings.len(), "recorded scan run");
    }
    outcome.map_err(|e| anyhow!("Scan with {} failed: {}", detector, e))?;

    if options.json {
        let serialized = serde_json::to_string_pretty(&sink.findings)
            .context("Failed to serialize findings to JSON")?;
        println!("{}", serialized);
    }
    Ok(())
}
