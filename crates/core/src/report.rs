//! Findings and where they go.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::source::SourceLocation;

/// A source position together with its literal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSite {
    pub location: SourceLocation,
    pub text: String,
}

/// Outcome of a resource lifecycle check on one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleVerdict {
    /// Only init/destroy style functions touch the variable.
    Bug,
    GoodPractice,
}

impl LifecycleVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleVerdict::Bug => "bugs",
            LifecycleVerdict::GoodPractice => "good practice",
        }
    }
}

/// Extra facts attached to a finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingContext {
    LoopDepth { depth: u32 },
    LoopHeader { is_header: bool },
    Classification { variable: String, verdict: LifecycleVerdict, used_by: Vec<String> },
    SkippableFunction { name: String, line: u32 },
    Excerpt { path: PathBuf, first_line: u32, lines: Vec<String> },
    Note { text: String },
}

impl fmt::Display for FindingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingContext::LoopDepth { depth } => write!(f, "LoopDepth: {depth}"),
            FindingContext::LoopHeader { is_header } => {
                write!(f, "isLoopHeader: {}", u8::from(*is_header))
            }
            FindingContext::Classification { variable, verdict, .. } => {
                let rule = "==============================";
                let sep = if *verdict == LifecycleVerdict::Bug { ":  " } else { ": " };
                write!(f, "{rule}\n* {}{sep}{variable}\n{rule}", verdict.as_str())
            }
            FindingContext::SkippableFunction { name, line } => {
                write!(f, "Possible skippable function ({name}) found at line: {line}")
            }
            FindingContext::Excerpt { path, first_line, lines } => {
                write!(f, "{}:", path.display())?;
                for (i, line) in lines.iter().enumerate() {
                    write!(f, "\n{:>6}  {line}", *first_line as usize + i)?;
                }
                Ok(())
            }
            FindingContext::Note { text } => f.write_str(text),
        }
    }
}

/// One detected occurrence of a known bug pattern.
///
/// `sites[0]` is the primary site; a second site makes the finding a pair
/// (for example an allocation and the mutation that makes it redundant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub bug: String,
    /// Function the finding was made in; absent for module-level findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default)]
    pub sites: Vec<SourceSite>,
    #[serde(default)]
    pub context: Vec<FindingContext>,
}

impl Finding {
    pub fn new(bug: &str, function: Option<&str>) -> Self {
        Self {
            bug: bug.to_string(),
            function: function.map(str::to_string),
            sites: Vec::new(),
            context: Vec::new(),
        }
    }

    pub fn site(mut self, site: SourceSite) -> Self {
        self.sites.push(site);
        self
    }

    pub fn with(mut self, context: FindingContext) -> Self {
        self.context.push(context);
        self
    }

    pub fn primary(&self) -> Option<&SourceSite> {
        self.sites.first()
    }

    pub fn is_pair(&self) -> bool {
        self.sites.len() > 1
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines: Vec<String> = Vec::new();
        for site in &self.sites {
            lines.push(site.location.to_string());
            lines.push(format!("\t{}", site.text));
        }
        lines.extend(self.context.iter().map(ToString::to_string));
        if self.is_pair() {
            lines.push("=============================".to_string());
        }
        f.write_str(&lines.join("\n"))
    }
}

/// Receiver of findings, in discovery order.
pub trait FindingSink {
    fn emit(&mut self, finding: Finding);
}

impl FindingSink for Vec<Finding> {
    fn emit(&mut self, finding: Finding) {
        self.push(finding);
    }
}
