use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// When a detector runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Once for every function, in program order.
    PerFunction,
    /// Once for the whole program, at initialization.
    Module,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::PerFunction => "function",
            Granularity::Module => "module",
        }
    }
}

/// Every known bug signature. The variant name is the identifier accepted on
/// the command line and in scan configs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Detector {
    MozillaBug35294,
    MozillaBug311566,
    LoopNestedCallSites,
    MozillaBug103330,
    MozillaBug267506,
    MozillaBug66461,
    MozillaBug409961,
    MozillaBug258793,
    MySQLBug38769,
    MySQLBug14637,
    MySQLBug38968,
    MySQLBug49491,
    MySQLBug39268,
    MySQLBug48229,
    MySQLBug26527,
    MySQLBug38941,
    MySQLBug38824,
    ApacheBug33605,
    ApacheBug45464,
}

impl Detector {
    pub const ALL: [Detector; 19] = [
        Detector::MozillaBug35294,
        Detector::MozillaBug311566,
        Detector::LoopNestedCallSites,
        Detector::MozillaBug103330,
        Detector::MozillaBug267506,
        Detector::MozillaBug66461,
        Detector::MozillaBug409961,
        Detector::MozillaBug258793,
        Detector::MySQLBug38769,
        Detector::MySQLBug14637,
        Detector::MySQLBug38968,
        Detector::MySQLBug49491,
        Detector::MySQLBug39268,
        Detector::MySQLBug48229,
        Detector::MySQLBug26527,
        Detector::MySQLBug38941,
        Detector::MySQLBug38824,
        Detector::ApacheBug33605,
        Detector::ApacheBug45464,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Detector::MozillaBug35294 => "MozillaBug35294",
            Detector::MozillaBug311566 => "MozillaBug311566",
            Detector::LoopNestedCallSites => "LoopNestedCallSites",
            Detector::MozillaBug103330 => "MozillaBug103330",
            Detector::MozillaBug267506 => "MozillaBug267506",
            Detector::MozillaBug66461 => "MozillaBug66461",
            Detector::MozillaBug409961 => "MozillaBug409961",
            Detector::MozillaBug258793 => "MozillaBug258793",
            Detector::MySQLBug38769 => "MySQLBug38769",
            Detector::MySQLBug14637 => "MySQLBug14637",
            Detector::MySQLBug38968 => "MySQLBug38968",
            Detector::MySQLBug49491 => "MySQLBug49491",
            Detector::MySQLBug39268 => "MySQLBug39268",
            Detector::MySQLBug48229 => "MySQLBug48229",
            Detector::MySQLBug26527 => "MySQLBug26527",
            Detector::MySQLBug38941 => "MySQLBug38941",
            Detector::MySQLBug38824 => "MySQLBug38824",
            Detector::ApacheBug33605 => "ApacheBug33605",
            Detector::ApacheBug45464 => "ApacheBug45464",
        }
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            Detector::MySQLBug38968 => Granularity::Module,
            _ => Granularity::PerFunction,
        }
    }

    /// Recognized identifiers that have no pattern yet.
    pub fn is_placeholder(&self) -> bool {
        matches!(
            self,
            Detector::MozillaBug258793
                | Detector::MySQLBug26527
                | Detector::MySQLBug38941
                | Detector::MySQLBug38824
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            Detector::MozillaBug35294 => "RemoveChildAt called inside a loop",
            Detector::MozillaBug311566 => "string Append( called inside a loop",
            Detector::LoopNestedCallSites => "generic loop call listing, not a tracked bug",
            Detector::MozillaBug103330 => "nsAString truncated with SetLength(0) then appended to",
            Detector::MozillaBug267506 => "document charset copied into a single-use nsCAutoString",
            Detector::MozillaBug66461 => "GTK drawing helper taking non nsIDeviceContext pointers",
            Detector::MozillaBug409961 => "QueryInterface with error inside a loop",
            Detector::MySQLBug38769 => "_info field re-read behind a loop-header sentinel",
            Detector::MySQLBug14637 => "byte-wise sentinel comparison driving a loop exit",
            Detector::MySQLBug38968 => "pthread mutex globals only created and destroyed",
            Detector::MySQLBug49491 => "sprintf with a constant %02X hex format",
            Detector::MySQLBug39268 => "startTransaction without a hint feeding getNdbOperation",
            Detector::MySQLBug48229 => "two-argument val_str calls",
            Detector::ApacheBug33605 => "setsockopt call sites",
            Detector::ApacheBug45464 => "apr_stat with full info for a partly read apr_finfo_t",
            Detector::MozillaBug258793
            | Detector::MySQLBug26527
            | Detector::MySQLBug38941
            | Detector::MySQLBug38824 => "recognized; no pattern implemented",
        }
    }
}

impl fmt::Display for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Detector {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Detector::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s.trim())
            .ok_or_else(|| ConfigError::UnknownBug(s.to_string()))
    }
}

/// Summary row for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorInfo {
    pub id: String,
    pub granularity: Granularity,
    pub description: String,
}

impl From<Detector> for DetectorInfo {
    fn from(d: Detector) -> Self {
        Self {
            id: d.as_str().to_string(),
            granularity: d.granularity(),
            description: d.description().to_string(),
        }
    }
}

/// Sorted identifiers, for help text and error messages.
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = Detector::ALL.iter().map(Detector::as_str).collect();
    names.sort();
    names
}

/// Every detector, sorted by identifier.
pub fn list() -> Vec<DetectorInfo> {
    let mut all: Vec<DetectorInfo> =
        Detector::ALL.iter().copied().map(DetectorInfo::from).collect();
    all.sort_by(|a, b| a.id.cmp(&b.id));
    all
}
