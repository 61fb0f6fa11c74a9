use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ir::{DebugLoc, InstId, Program};

/// A resolved `file:line` position. `path` is absolute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub path: PathBuf,
    pub line: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("instruction {0} has no usable debug location")]
    NoDebugInfo(InstId),
}

/// Maps instructions to source positions through their debug metadata.
#[derive(Debug, Clone, Default)]
pub struct LocationResolver {
    source_root: Option<PathBuf>,
}

impl LocationResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative debug directories are taken relative to `root` instead of the
    /// current directory.
    pub fn with_source_root(root: impl Into<PathBuf>) -> Self {
        Self { source_root: Some(root.into()) }
    }

    pub fn source_root(&self) -> Option<&Path> {
        self.source_root.as_deref()
    }

    /// Position of the code an instruction was inlined into, walking the
    /// inlining chain from the outermost site inward and taking the first
    /// node that carries a file and a line.
    pub fn resolve(
        &self,
        program: &Program,
        inst: InstId,
    ) -> Result<SourceLocation, LocationError> {
        let loc = program.inst(inst).loc.as_ref().ok_or(LocationError::NoDebugInfo(inst))?;
        loc.chain()
            .into_iter()
            .rev()
            .find(|node| node.is_verified())
            .map(|node| self.to_location(node))
            .ok_or(LocationError::NoDebugInfo(inst))
    }

    /// Lexical position of the instruction itself, ignoring inlining.
    pub fn resolve_immediate(
        &self,
        program: &Program,
        inst: InstId,
    ) -> Result<SourceLocation, LocationError> {
        match program.inst(inst).loc.as_ref() {
            Some(loc) if loc.is_verified() => Ok(self.to_location(loc)),
            _ => Err(LocationError::NoDebugInfo(inst)),
        }
    }

    fn to_location(&self, node: &DebugLoc) -> SourceLocation {
        let file = Path::new(&node.file);
        let joined = if file.is_absolute() {
            file.to_path_buf()
        } else {
            let dir = Path::new(&node.directory);
            match (&self.source_root, dir.is_absolute()) {
                (Some(root), false) => root.join(dir).join(file),
                _ => dir.join(file),
            }
        };
        SourceLocation { path: canonicalize(&joined), line: node.line }
    }
}

/// Canonical form of a path. Files that do not exist are made absolute and
/// normalized lexically so equal spellings still compare equal.
pub fn canonicalize(path: &Path) -> PathBuf {
    if let Ok(real) = path.canonicalize() {
        return real;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
