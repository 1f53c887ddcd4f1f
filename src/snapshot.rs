//! Snapshots, containers and the build backend that owns them.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A named, buildable program version held by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Snapshot {
    pub name: String,
    /// The image holding the snapshot's files.
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    /// Directory within the image that file paths are relative to.
    #[serde(default)]
    pub source_dir: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harness: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_to_instrument: Vec<String>,
}

impl Snapshot {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Snapshot {
            name: name.into(),
            image: image.into(),
            program: None,
            source_dir: String::new(),
            languages: Vec::new(),
            build_command: None,
            harness: None,
            compiler: None,
            files_to_instrument: Vec::new(),
        }
    }

    /// A record for `image` that inherits this snapshot's build metadata.
    pub fn derive(&self, name: impl Into<String>, image: impl Into<String>) -> Snapshot {
        Snapshot {
            name: name.into(),
            image: image.into(),
            ..self.clone()
        }
    }
}

/// Handle to an ephemeral build container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Container {
    pub id: String,
    pub snapshot: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Success,
    Failure { output: String },
}

/// The container/build/image service.
///
/// Calls are synchronous and may block for a long time; implementations must
/// be safe to share between request threads.
pub trait Backend: Send + Sync {
    fn lookup_snapshot(&self, name: &str) -> Result<Snapshot>;

    /// Fails with `FileNotFound` if `path` does not exist in the snapshot.
    fn read_file(&self, snapshot: &Snapshot, path: &str) -> Result<String>;

    fn provision(&self, snapshot: &Snapshot) -> Result<Container>;

    fn apply_patch(&self, container: &Container, diff: &str) -> Result<()>;

    fn build(&self, container: &Container) -> Result<BuildOutcome>;

    /// Save the container's current state as an image named `image`.
    fn persist(&self, container: &Container, image: &str) -> Result<()>;

    fn destroy(&self, container: &Container) -> Result<()>;

    fn register_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    fn deregister_snapshot(&self, name: &str) -> Result<()>;

    fn delete_image(&self, image: &str) -> Result<()>;
}
