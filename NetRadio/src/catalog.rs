//! Loading of the channel catalog file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use nrbroadcast::{CatalogDocument, MemoryCatalog};
use tracing::{info, warn};

/// Reads `catalog.yaml` into an in-memory catalog.
///
/// A missing file yields an empty catalog; a malformed one is an error.
pub fn load_catalog(path: &Path) -> Result<MemoryCatalog> {
    if !path.exists() {
        warn!(path = %path.display(), "Catalog file not found, no channel to broadcast");
        return Ok(MemoryCatalog::new());
    }

    let yaml = fs::read_to_string(path)
        .with_context(|| format!("cannot read catalog {}", path.display()))?;
    let document: CatalogDocument = serde_yaml::from_str(&yaml)
        .with_context(|| format!("invalid catalog {}", path.display()))?;

    let catalog = MemoryCatalog::from_document(document)
        .with_context(|| format!("inconsistent schedule in {}", path.display()))?;
    info!(
        path = %path.display(),
        channels = catalog.channels().len(),
        "Catalog loaded"
    );
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = load_catalog(&dir.path().join("catalog.yaml")).unwrap();
        assert!(catalog.channels().is_empty());
    }

    #[test]
    fn test_overlapping_schedule_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        fs::write(
            &path,
            r#"
channels:
  - id: c1
    title: One
tracks:
  - id: t1
    title: T1
    duration: 60
    audio: t1.opus
schedule:
  - channel: c1
    track: t1
    start: 2024-01-01T00:00:00Z
  - channel: c1
    track: t1
    start: 2024-01-01T00:00:30Z
"#,
        )
        .unwrap();

        let err = load_catalog(&path).unwrap_err();
        assert!(format!("{err:#}").contains("overlaps"));
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        fs::write(&path, "channels: [ {id: ").unwrap();
        assert!(load_catalog(&path).is_err());
    }
}
