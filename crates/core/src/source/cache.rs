use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Lines of every source file referenced during a run, loaded once each.
///
/// Entries are never reloaded or invalidated, so a file that changes on disk
/// after its first load keeps its original content for the rest of the run.
#[derive(Debug, Default)]
pub struct SourceCache {
    files: HashMap<PathBuf, Vec<String>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a file on first reference and return its lines.
    ///
    /// A file that cannot be read is cached as empty.
    pub fn load(&mut self, path: &Path) -> &[String] {
        self.files.entry(path.to_path_buf()).or_insert_with(|| read_lines(path))
    }

    /// The 1-based line `line` of `path`, or an empty string when out of range.
    pub fn line_at(&mut self, path: &Path, line: u32) -> String {
        let lines = self.load(path);
        if line == 0 {
            return String::new();
        }
        lines.get(line as usize - 1).cloned().unwrap_or_default()
    }

    /// Lines `first..=last` (1-based, clamped to the file).
    pub fn excerpt(&mut self, path: &Path, first: u32, last: u32) -> Vec<String> {
        let lines = self.load(path);
        let start = first.max(1) as usize - 1;
        let end = (last as usize).min(lines.len());
        if start >= end {
            return Vec::new();
        }
        lines[start..end].to_vec()
    }

    pub fn is_loaded(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Number of files loaded so far.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    match fs::read(path) {
        Ok(bytes) => {
            debug!(path = %path.display(), "loaded source file");
            String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect()
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "source file unreadable; treating as empty"
            );
            Vec::new()
        }
    }
}
