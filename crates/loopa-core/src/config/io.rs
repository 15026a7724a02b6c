//! YAML read/write for any serde configuration type

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Read and parse a YAML file
///
/// `Ok(None)` when the file does not exist; read and parse failures are
/// errors so the caller can decide how to degrade.
pub fn read_config<T>(path: &Path) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    let config = serde_yaml::from_str::<T>(&contents)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;
    Ok(Some(config))
}

/// Load a YAML file, falling back to `T::default()`
///
/// A missing file is not worth a warning; an unreadable or malformed one is.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    log::info!("[CONFIG] Loading {:?}", path);

    match read_config(path) {
        Ok(Some(config)) => config,
        Ok(None) => {
            log::info!("[CONFIG] {:?} not found, using defaults", path);
            T::default()
        }
        Err(e) => {
            log::warn!("[CONFIG] {:#}, using defaults", e);
            T::default()
        }
    }
}

/// Write `config` as YAML, creating parent directories as needed
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::info!("[CONFIG] Saved {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        rate: u32,
        name: String,
    }

    #[test]
    fn test_missing_file_reads_none() {
        let read: Option<Sample> = read_config(Path::new("/nonexistent/loopa.yaml")).unwrap();
        assert!(read.is_none());
    }

    #[test]
    fn test_malformed_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "rate: [not a number").unwrap();

        assert!(read_config::<Sample>(&path).is_err());
        assert_eq!(load_config::<Sample>(&path), Sample::default());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("loopa.yaml");
        let sample = Sample {
            rate: 48000,
            name: "studio".to_string(),
        };

        save_config(&sample, &path).unwrap();
        assert_eq!(load_config::<Sample>(&path), sample);
    }
}
