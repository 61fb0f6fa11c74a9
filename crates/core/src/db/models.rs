use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current time as an RFC 3339 string, the format stored in the database.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Lifecycle of a recorded scan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Running,
    Succeeded,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Running => "running",
            ScanStatus::Succeeded => "succeeded",
            ScanStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "running" => Some(ScanStatus::Running),
            "succeeded" => Some(ScanStatus::Succeeded),
            "failed" => Some(ScanStatus::Failed),
            _ => None,
        }
    }
}

/// One scan of one program with one detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanRunRecord {
    /// Row id; `None` until the record is stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub program: String,
    /// SHA-256 of the program dump, hex encoded.
    pub program_hash: Option<String>,
    pub bug: String,
    pub description: Option<String>,
    pub status: ScanStatus,
    /// RFC 3339 timestamps.
    pub started_at: String,
    pub finished_at: Option<String>,
    pub finding_count: i64,
}

impl ScanRunRecord {
    /// A run that has just started.
    pub fn started(
        program: impl Into<String>,
        bug: impl Into<String>,
        started_at: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            program: program.into(),
            program_hash: None,
            bug: bug.into(),
            description: None,
            status: ScanStatus::Running,
            started_at: started_at.into(),
            finished_at: None,
            finding_count: 0,
        }
    }

    /// A run starting now.
    pub fn start_now(program: impl Into<String>, bug: impl Into<String>) -> Self {
        Self::started(program, bug, timestamp())
    }

    pub fn with_hash(mut self, hash: Option<String>) -> Self {
        self.program_hash = hash;
        self
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }
}
