//! A `Backend` that keeps images, containers and snapshot records on the local filesystem.
//!
//! Layout under the root directory:
//!
//! ```text
//! snapshots.json        registered snapshot records
//! images/<tag>/         image trees
//! containers/<tmp>/     ephemeral build containers
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use camino::{Utf8Component, Utf8Path};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::copy_tree;
use crate::error::{Error, Result};
use crate::patch;
use crate::runner;
use crate::snapshot::{Backend, BuildOutcome, Container, Snapshot};
use crate::state;

pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(300);

struct LiveContainer {
    dir: TempDir,
    snapshot: Snapshot,
}

pub struct LocalBackend {
    root: PathBuf,
    build_timeout: Duration,
    snapshots: Mutex<IndexMap<String, Snapshot>>,
    containers: Mutex<HashMap<String, LiveContainer>>,
}

/// Rejects absolute paths and paths that climb out of their base directory.
fn relative(path: &str) -> Result<&Utf8Path> {
    let path = Utf8Path::new(path);
    let ok = !path.as_str().is_empty() && path.components().all(|c| matches!(c, Utf8Component::Normal(_) | Utf8Component::CurDir));
    if ok {
        Ok(path)
    } else {
        Err(Error::BadFormat(format!("expected a relative path: {}", path)))
    }
}

fn io_error(context: String) -> impl FnOnce(std::io::Error) -> Error {
    move |e| Error::unexpected(&context, e)
}

impl LocalBackend {
    /// Opens (creating if needed) a backend rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in [root.join("images"), root.join("containers")] {
            std::fs::create_dir_all(&dir).map_err(io_error(format!("failed to create {}", dir.display())))?;
        }
        let snapshots = state::load_snapshots(&root)?;
        info!(root = %root.display(), snapshots = snapshots.len(), "opened local backend");
        Ok(LocalBackend {
            root,
            build_timeout: DEFAULT_BUILD_TIMEOUT,
            snapshots: Mutex::new(snapshots),
            containers: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_build_timeout(mut self, timeout: Duration) -> Self {
        self.build_timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn image_dir(&self, image: &str) -> Result<PathBuf> {
        Ok(self.root.join("images").join(relative(image)?))
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.lock().values().cloned().collect()
    }

    /// Copies `source` into a new image named after `snapshot` and registers it.
    pub fn import(&self, mut snapshot: Snapshot, source: &Path) -> Result<Snapshot> {
        snapshot.image = snapshot.name.clone();
        let image_dir = self.image_dir(&snapshot.image)?;
        if image_dir.exists() {
            std::fs::remove_dir_all(&image_dir).map_err(io_error(format!("failed to replace {}", image_dir.display())))?;
        }
        copy_tree::copy_dir_filtered(source, &image_dir)
            .map_err(io_error(format!("failed to import {}", source.display())))?;
        self.register_snapshot(snapshot.clone())?;
        info!(snapshot = %snapshot.name, source = %source.display(), "imported snapshot");
        Ok(snapshot)
    }

    fn container_dir(&self, container: &Container) -> Result<(PathBuf, Snapshot)> {
        let containers = self.containers.lock();
        let live = containers
            .get(&container.id)
            .ok_or_else(|| Error::Unexpected(format!("no such container: {}", container.id)))?;
        Ok((live.dir.path().to_path_buf(), live.snapshot.clone()))
    }

    fn persist_snapshots(&self, snapshots: &IndexMap<String, Snapshot>) -> Result<()> {
        state::save_snapshots(&self.root, snapshots)
    }
}

impl Backend for LocalBackend {
    fn lookup_snapshot(&self, name: &str) -> Result<Snapshot> {
        self.snapshots
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::SnapshotNotFound(name.to_string()))
    }

    fn read_file(&self, snapshot: &Snapshot, path: &str) -> Result<String> {
        let full = self
            .image_dir(&snapshot.image)?
            .join(&snapshot.source_dir)
            .join(relative(path)?);
        match std::fs::read_to_string(&full) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::FileNotFound(path.to_string())),
            Err(e) => Err(Error::unexpected(&format!("failed to read {}", full.display()), e)),
        }
    }

    fn provision(&self, snapshot: &Snapshot) -> Result<Container> {
        let image_dir = self.image_dir(&snapshot.image)?;
        if !image_dir.is_dir() {
            return Err(Error::SnapshotNotFound(snapshot.name.clone()));
        }
        let dir = tempfile::Builder::new()
            .prefix("container-")
            .tempdir_in(self.root.join("containers"))
            .map_err(io_error("failed to create container".into()))?;
        copy_tree::copy_dir_all(&image_dir, dir.path())
            .map_err(io_error(format!("failed to provision container for {}", snapshot.name)))?;

        let mut containers = self.containers.lock();
        let mut id = format!("{:016x}", fastrand::u64(..));
        while containers.contains_key(&id) {
            id = format!("{:016x}", fastrand::u64(..));
        }
        debug!(container = %id, path = %dir.path().display(), "provisioned local container");
        containers.insert(
            id.clone(),
            LiveContainer {
                dir,
                snapshot: snapshot.clone(),
            },
        );
        Ok(Container {
            id,
            snapshot: snapshot.name.clone(),
        })
    }

    fn apply_patch(&self, container: &Container, diff: &str) -> Result<()> {
        let (dir, snapshot) = self.container_dir(container)?;
        let base = dir.join(&snapshot.source_dir);
        for file_patch in patch::parse(diff)? {
            let path = base.join(relative(&file_patch.path)?);
            let original = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(Error::FileNotFound(file_patch.path.clone()));
                }
                Err(e) => return Err(Error::unexpected(&format!("failed to read {}", path.display()), e)),
            };
            let patched = file_patch.apply(&original)?;
            std::fs::write(&path, patched).map_err(io_error(format!("failed to write {}", path.display())))?;
            debug!(container = %container.id, file = %file_patch.path, "patched file");
        }
        Ok(())
    }

    fn build(&self, container: &Container) -> Result<BuildOutcome> {
        let (dir, snapshot) = self.container_dir(container)?;
        match snapshot.build_command.as_deref() {
            Some(cmd) => runner::run_build(cmd, &dir.join(&snapshot.source_dir), self.build_timeout),
            None => {
                debug!(container = %container.id, "no build command; nothing to build");
                Ok(BuildOutcome::Success)
            }
        }
    }

    fn persist(&self, container: &Container, image: &str) -> Result<()> {
        let (dir, _) = self.container_dir(container)?;
        let image_dir = self.image_dir(image)?;
        if image_dir.exists() {
            std::fs::remove_dir_all(&image_dir).map_err(io_error(format!("failed to replace {}", image_dir.display())))?;
        }
        copy_tree::copy_dir_all(&dir, &image_dir).map_err(io_error(format!("failed to persist image {}", image)))
    }

    fn destroy(&self, container: &Container) -> Result<()> {
        let live = self
            .containers
            .lock()
            .remove(&container.id)
            .ok_or_else(|| Error::Unexpected(format!("no such container: {}", container.id)))?;
        live.dir
            .close()
            .map_err(io_error(format!("failed to remove container {}", container.id)))
    }

    fn register_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let mut snapshots = self.snapshots.lock();
        debug!(snapshot = %snapshot.name, image = %snapshot.image, "registering snapshot");
        snapshots.insert(snapshot.name.clone(), snapshot);
        self.persist_snapshots(&snapshots)
    }

    fn deregister_snapshot(&self, name: &str) -> Result<()> {
        let mut snapshots = self.snapshots.lock();
        if snapshots.shift_remove(name).is_none() {
            return Err(Error::SnapshotNotFound(name.to_string()));
        }
        self.persist_snapshots(&snapshots)
    }

    fn delete_image(&self, image: &str) -> Result<()> {
        let image_dir = self.image_dir(image)?;
        std::fs::remove_dir_all(&image_dir).map_err(io_error(format!("failed to delete image {}", image)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_rejects_escaping_paths() {
        assert!(relative("src/main.c").is_ok());
        assert!(relative("./main.c").is_ok());
        assert!(relative("../main.c").is_err());
        assert!(relative("/etc/passwd").is_err());
        assert!(relative("").is_err());
    }
}
