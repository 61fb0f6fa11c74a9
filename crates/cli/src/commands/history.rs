use std::path::Path;

use anyhow::{anyhow, Context, Result};
use perfscan_core::db::ScanDb;

fn open_scan_db(db: &str) -> Result<ScanDb> {
    let path = Path::new(db);
    if !path.exists() {
        return Err(anyhow!("Scan database does not exist: {}", path.display()));
    }
    ScanDb::open(path)
        .with_context(|| format!("Failed to open scan database at {}", path.display()))
}

/// List recorded scan runs, optionally for a single detector.
pub fn list_runs_command(db: &str, bug: Option<&str>, json: bool) -> Result<()> {
    let db = open_scan_db(db)?;
    let runs = db.list_scan_runs(bug).context("Failed to list scan runs")?;

    if json {
        let serialized =
            serde_json::to_string_pretty(&runs).context("Failed to serialize scan runs to JSON")?;
        println!("{}", serialized);
        return Ok(());
    }

    println!("Scan runs ({}):", runs.len());
    if runs.is_empty() {
        println!("  (none)");
        return Ok(());
    }
    for run in runs {
        println!(
            "  - #{} {} {} [{}] findings={} started={}",
            run.id.unwrap_or_default(),
            run.bug,
            run.program,
            run.status.as_str(),
            run.finding_count,
            run.started_at
        );
        if let Some(desc) = run.description {
            println!("      {}", desc);
        }
    }
    Ok(())
}

/// Show the findings stored for one run.
pub fn list_findings_command(db: &str, run_id: i64, json: bool) -> Result<()> {
    let db = open_scan_db(db)?;
    let run = db.scan_run(run_id).with_context(|| format!("Failed to load scan run {}", run_id))?;
    let findings = db.list_findings(run_id).context("Failed to list findings")?;

    if json {
        let serialized = serde_json::to_string_pretty(&findings)
            .context("Failed to serialize findings to JSON")?;
        println!("{}", serialized);
        return Ok(());
    }

    println!("Run #{} ({} on {}): {} finding(s)", run_id, run.bug, run.program, findings.len());
    for finding in findings {
        println!("{finding}\n");
    }
    Ok(())
}
