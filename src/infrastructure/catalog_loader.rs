// Device-type catalog loader - one JSON document per device type
use crate::domain::catalog::{Catalog, DeviceType};
use anyhow::{Context, Result};
use std::path::Path;

/// Load every `*.json` file in `dir`. A document that fails to parse is
/// logged and skipped so one bad device type does not take down the rest.
pub fn load_catalog(dir: impl AsRef<Path>) -> Result<Catalog> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read catalog directory {}", dir.display()))?;

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut device_types = Vec::new();
    for path in paths {
        match load_device_type(&path) {
            Ok(device_type) => {
                tracing::debug!(
                    "Loaded device type {} ({} measurements, {} templates)",
                    device_type.id,
                    device_type.measurements.len(),
                    device_type.templates.len()
                );
                device_types.push(device_type);
            }
            Err(e) => tracing::warn!("Skipping {}: {:#}", path.display(), e),
        }
    }

    tracing::info!("Loaded {} device types from {}", device_types.len(), dir.display());
    Ok(Catalog::new(device_types))
}

fn load_device_type(path: &Path) -> Result<DeviceType> {
    let text = std::fs::read_to_string(path).context("Failed to read file")?;
    serde_json::from_str(&text).context("Invalid device type document")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::tests::SAMPLE_DEVICE_TYPE;

    #[test]
    fn test_load_skips_invalid_documents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lht65.json"), SAMPLE_DEVICE_TYPE).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{\"id\": 3").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let catalog = load_catalog(dir.path()).unwrap();

        assert_eq!(catalog.summaries().len(), 1);
        assert!(catalog.device_type("lht65").is_some());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_catalog(dir.path().join("nope")).is_err());
    }
}
