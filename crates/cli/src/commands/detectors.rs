use anyhow::{Context, Result};
use perfscan_core::detectors::registry;

/// List every known detector identifier.
pub fn list_detectors_command(json: bool) -> Result<()> {
    let detectors = registry::list();

    if json {
        let serialized = serde_json::to_string_pretty(&detectors)
            .context("Failed to serialize detectors to JSON")?;
        println!("{}", serialized);
        return Ok(());
    }

    println!("Detectors ({}):", detectors.len());
    for info in detectors {
        println!("  - {} [{}] {}", info.id, info.granularity.as_str(), info.description);
    }
    Ok(())
}
