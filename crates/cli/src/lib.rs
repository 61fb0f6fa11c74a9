use std::env;
use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use perfscan_core::ir::{Program, ProgramDump};
use perfscan_core::loops::LoopTable;
use sha2::{Digest, Sha256};

pub mod commands;

/// Canonicalize a path if it exists, otherwise anchor it at the current
/// working directory.
pub fn canonicalize_or_current(path: &str) -> Result<PathBuf> {
    let path = Path::new(path);
    if path == Path::new(".") {
        return env::current_dir().context("Failed to get current directory");
    }
    match path.canonicalize() {
        Ok(p) => Ok(p),
        Err(_) => {
            let cwd = env::current_dir().context("Failed to get current directory")?;
            Ok(cwd.join(path))
        }
    }
}

/// SHA-256 of a file as a hex string.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open file for hashing: {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("Failed to read file for hashing: {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Read a JSON program dump and assemble it, together with its loop facts.
pub fn load_program(path: &Path) -> Result<(Program, LoopTable)> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read program dump at {}", path.display()))?;
    let dump: ProgramDump =
        serde_json::from_slice(&bytes).context("Failed to parse program dump JSON")?;
    let assembled = Program::from_dump(dump)
        .with_context(|| format!("Invalid program dump at {}", path.display()))?;
    Ok(assembled)
}
