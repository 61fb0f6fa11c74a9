use std::path::PathBuf;

use perfscan_core::db::{DbError, ScanDb, ScanRunRecord, ScanStatus, CURRENT_SCHEMA_VERSION};
use perfscan_core::report::{Finding, FindingContext, SourceSite};
use perfscan_core::source::SourceLocation;
use tempfile::tempdir;

fn sample_findings() -> Vec<Finding> {
    let site = |line: u32, text: &str| SourceSite {
        location: SourceLocation { path: PathBuf::from("/src/tree.cpp"), line },
        text: text.to_string(),
    };
    vec![
        Finding::new("MozillaBug35294", Some("prune"))
            .site(site(4, "      n->RemoveChildAt(j);"))
            .with(FindingContext::LoopDepth { depth: 2 }),
        Finding::new("MozillaBug35294", Some("drain"))
            .site(site(19, "  n->RemoveChildAt(0);"))
            .with(FindingContext::LoopDepth { depth: 1 }),
    ]
}

#[test]
fn fresh_database_is_at_current_schema() {
    let db = ScanDb::open_in_memory().expect("open in-memory db");
    assert_eq!(db.schema_version().expect("schema version"), CURRENT_SCHEMA_VERSION);
    assert!(db.list_scan_runs(None).expect("list runs").is_empty());
}

#[test]
fn recorded_run_round_trips_with_findings() {
    let db = ScanDb::open_in_memory().expect("open in-memory db");
    let record =
        ScanRunRecord::started("/work/tree.json", "MozillaBug35294", "2024-01-01T00:00:00+00:00")
            .with_hash(Some("abc123".to_string()))
            .with_description(Some("nightly".to_string()));
    let run_id = db.insert_scan_run(&record).expect("insert run");

    let findings = sample_findings();
    db.insert_findings(run_id, &findings).expect("insert findings");
    let finished_at = "2024-01-01T00:00:05+00:00";
    db.finish_scan_run(run_id, ScanStatus::Succeeded, finished_at, findings.len() as i64)
        .expect("finish run");

    let stored = db.scan_run(run_id).expect("run exists");
    assert_eq!(stored.id, Some(run_id));
    assert_eq!(stored.program_hash.as_deref(), Some("abc123"));
    assert_eq!(stored.description.as_deref(), Some("nightly"));
    assert_eq!(stored.status, ScanStatus::Succeeded);
    assert_eq!(stored.finished_at.as_deref(), Some("2024-01-01T00:00:05+00:00"));
    assert_eq!(stored.finding_count, 2);

    // Findings come back in the order they were reported.
    assert_eq!(db.list_findings(run_id).expect("list findings"), findings);
}

#[test]
fn runs_can_be_filtered_by_detector() {
    let db = ScanDb::open_in_memory().expect("open in-memory db");
    db.insert_scan_run(&ScanRunRecord::start_now("a.json", "MozillaBug35294")).expect("insert run");
    db.insert_scan_run(&ScanRunRecord::start_now("b.json", "MySQLBug38968")).expect("insert run");
    db.insert_scan_run(&ScanRunRecord::start_now("c.json", "MozillaBug35294")).expect("insert run");

    let all = db.list_scan_runs(None).expect("list runs");
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|r| r.status == ScanStatus::Running));

    let filtered = db.list_scan_runs(Some("MozillaBug35294")).expect("list runs");
    let programs: Vec<&str> = filtered.iter().map(|r| r.program.as_str()).collect();
    assert_eq!(programs, vec!["a.json", "c.json"]);
}

#[test]
fn unknown_runs_are_reported() {
    let db = ScanDb::open_in_memory().expect("open in-memory db");
    assert!(matches!(db.scan_run(42), Err(DbError::UnknownRun(42))));
    assert!(matches!(
        db.finish_scan_run(42, ScanStatus::Failed, "2024-01-01T00:00:00+00:00", 0),
        Err(DbError::UnknownRun(42))
    ));
    assert!(db.list_findings(42).expect("list findings").is_empty());
}

#[test]
fn database_from_a_newer_version_is_rejected() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("scans.db");
    {
        let db = ScanDb::open(&path).expect("create db");
        db.connection().pragma_update(None, "user_version", 99).expect("bump user_version");
    }

    match ScanDb::open(&path) {
        Err(DbError::UnsupportedSchemaVersion { found, max_supported, .. }) => {
            assert_eq!(found, 99);
            assert_eq!(max_supported, CURRENT_SCHEMA_VERSION);
        }
        Err(other) => panic!("expected UnsupportedSchemaVersion, got {other}"),
        Ok(_) => panic!("newer schema should not open"),
    }
}

#[test]
fn status_names_parse_back() {
    for status in [ScanStatus::Running, ScanStatus::Succeeded, ScanStatus::Failed] {
        assert_eq!(ScanStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(ScanStatus::parse("SUCCEEDED"), Some(ScanStatus::Succeeded));
    assert_eq!(ScanStatus::parse("pending"), None);
}
