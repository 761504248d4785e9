use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Durable key-value slots backed by one JSON file per key.
#[derive(Debug, Clone)]
pub struct SlotStore {
    pub data_dir: PathBuf,
}

impl SlotStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened slot store");

        Ok(Self { data_dir })
    }

    pub fn slot_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }

    /// Returns `None` when the slot was never written.
    #[tracing::instrument(skip(self))]
    pub fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.slot_path(key);
        match fs::read_to_string(&path) {
            Ok(payload) => {
                debug!(file = %path.display(), bytes = payload.len(), "read slot");
                Ok(Some(payload))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(file = %path.display(), "slot not present");
                Ok(None)
            }
            Err(err) => Err(err).with_context(|| format!("failed reading {}", path.display())),
        }
    }

    /// Moves an unusable slot to `<key>.json.corrupt` so the next write
    /// cannot destroy it.
    #[tracing::instrument(skip(self))]
    pub fn set_aside(&self, key: &str) -> anyhow::Result<PathBuf> {
        let path = self.slot_path(key);
        let backup = self.data_dir.join(format!("{key}.json.corrupt"));
        fs::rename(&path, &backup).with_context(|| {
            format!("failed to move {} to {}", path.display(), backup.display())
        })?;
        info!(from = %path.display(), to = %backup.display(), "slot set aside");
        Ok(backup)
    }

    #[tracing::instrument(skip(self, payload))]
    pub fn write(&self, key: &str, payload: &str) -> anyhow::Result<()> {
        let path = self.slot_path(key);
        debug!(file = %path.display(), bytes = payload.len(), "writing slot atomically");

        let mut temp = NamedTempFile::new_in(&self.data_dir)?;
        temp.write_all(payload.as_bytes())?;
        temp.flush()?;

        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

        Ok(())
    }
}
