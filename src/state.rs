//! On-disk record of the snapshots known to a local backend.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::snapshot::Snapshot;

pub const STATE_FILE: &str = "snapshots.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    snapshots: Vec<Snapshot>,
}

pub fn state_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

/// Loads the registered snapshots; a missing file means none.
pub fn load_snapshots(root: &Path) -> Result<IndexMap<String, Snapshot>> {
    let path = state_path(root);
    let data = match std::fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(IndexMap::new()),
        Err(e) => return Err(Error::unexpected(&format!("failed to read {}", path.display()), e)),
    };
    let state: StateFile = serde_json::from_str(&data)
        .map_err(|e| Error::BadFormat(format!("{}: {}", path.display(), e)))?;
    Ok(state
        .snapshots
        .into_iter()
        .map(|s| (s.name.clone(), s))
        .collect())
}

/// Writes the snapshot records, replacing the previous file atomically.
pub fn save_snapshots(root: &Path, snapshots: &IndexMap<String, Snapshot>) -> Result<()> {
    let state = StateFile {
        snapshots: snapshots.values().cloned().collect(),
    };
    let json = serde_json::to_string_pretty(&state).map_err(|e| Error::unexpected("failed to encode snapshots", e))?;

    let path = state_path(root);
    let mut tmp = tempfile::NamedTempFile::new_in(root)
        .map_err(|e| Error::unexpected(&format!("failed to write {}", path.display()), e))?;
    std::io::Write::write_all(&mut tmp, json.as_bytes())
        .map_err(|e| Error::unexpected(&format!("failed to write {}", path.display()), e))?;
    tmp.persist(&path)
        .map_err(|e| Error::unexpected(&format!("failed to write {}", path.display()), e))?;
    Ok(())
}
