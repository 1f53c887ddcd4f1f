#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Barrier};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;

use mutorch::error::{Error, Result};
use mutorch::installation::Installation;
use mutorch::matcher::{Match, Matcher};
use mutorch::{BuildOutcome, Configuration, Container, Snapshot, TemplateMatcher};
use mutorch::snapshot::Backend;

pub const SUM_C: &str = "int sm = 0;\nfor (int i = 0; i < 10; ++i) {\n  sm += i;\n}";

pub const ADD_C: &str = "int add(int a, int b) {\n  return a + b;\n}\n";

/// In-memory backend. Every snapshot sees the same file map.
#[derive(Default)]
pub struct FakeBackend {
    pub files: Mutex<HashMap<String, String>>,
    pub snapshots: Mutex<IndexMap<String, Snapshot>>,
    pub images: Mutex<HashSet<String>>,
    pub patches: Mutex<Vec<String>>,
    pub live: Mutex<HashSet<String>>,
    pub reads: AtomicUsize,
    pub provisioned: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub fail_build: AtomicBool,
    pub fail_patch: AtomicBool,
    pub fail_register: AtomicBool,
    pub fail_delete_image: AtomicBool,
    /// When set, every build waits on this barrier first.
    pub build_gate: Mutex<Option<Arc<Barrier>>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        let backend = FakeBackend::default();
        backend.add_snapshot(Snapshot::new("base", "base-image"));
        backend.add_file("sum.c", SUM_C);
        backend.add_file("add.c", ADD_C);
        Arc::new(backend)
    }

    pub fn add_snapshot(&self, mut snapshot: Snapshot) {
        if snapshot.build_command.is_none() {
            snapshot.build_command = Some("make".into());
        }
        self.images.lock().insert(snapshot.image.clone());
        self.snapshots.lock().insert(snapshot.name.clone(), snapshot);
    }

    pub fn add_file(&self, path: &str, text: &str) {
        self.files.lock().insert(path.to_string(), text.to_string());
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn provisioned(&self) -> usize {
        self.provisioned.load(Ordering::SeqCst)
    }

    pub fn has_image(&self, image: &str) -> bool {
        self.images.lock().contains(image)
    }

    pub fn has_snapshot(&self, name: &str) -> bool {
        self.snapshots.lock().contains_key(name)
    }
}

impl Backend for FakeBackend {
    fn lookup_snapshot(&self, name: &str) -> Result<Snapshot> {
        self.snapshots
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::SnapshotNotFound(name.to_string()))
    }

    fn read_file(&self, _snapshot: &Snapshot, path: &str) -> Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::FileNotFound(path.to_string()))
    }

    fn provision(&self, snapshot: &Snapshot) -> Result<Container> {
        let n = self.provisioned.fetch_add(1, Ordering::SeqCst);
        let id = format!("container-{}", n);
        self.live.lock().insert(id.clone());
        Ok(Container {
            id,
            snapshot: snapshot.name.clone(),
        })
    }

    fn apply_patch(&self, _container: &Container, diff: &str) -> Result<()> {
        if self.fail_patch.load(Ordering::SeqCst) {
            return Err(Error::Unexpected("patch rejected".into()));
        }
        self.patches.lock().push(diff.to_string());
        Ok(())
    }

    fn build(&self, _container: &Container) -> Result<BuildOutcome> {
        let gate = self.build_gate.lock().clone();
        if let Some(gate) = gate {
            gate.wait();
        }
        if self.fail_build.load(Ordering::SeqCst) {
            Ok(BuildOutcome::Failure {
                output: "error: expected ';'".into(),
            })
        } else {
            Ok(BuildOutcome::Success)
        }
    }

    fn persist(&self, _container: &Container, image: &str) -> Result<()> {
        self.images.lock().insert(image.to_string());
        Ok(())
    }

    fn destroy(&self, container: &Container) -> Result<()> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        if self.live.lock().remove(&container.id) {
            Ok(())
        } else {
            Err(Error::Unexpected(format!("container destroyed twice: {}", container.id)))
        }
    }

    fn register_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(Error::Unexpected("registry unavailable".into()));
        }
        self.snapshots.lock().insert(snapshot.name.clone(), snapshot);
        Ok(())
    }

    fn deregister_snapshot(&self, name: &str) -> Result<()> {
        self.snapshots
            .lock()
            .shift_remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::SnapshotNotFound(name.to_string()))
    }

    fn delete_image(&self, image: &str) -> Result<()> {
        if self.fail_delete_image.load(Ordering::SeqCst) {
            return Err(Error::Unexpected("image store unavailable".into()));
        }
        if self.images.lock().remove(image) {
            Ok(())
        } else {
            Err(Error::Unexpected(format!("no such image: {}", image)))
        }
    }
}

/// Matcher that returns canned matches and counts queries.
#[derive(Default)]
pub struct FakeMatcher {
    pub matches: Mutex<HashMap<String, Vec<Match>>>,
    pub queries: AtomicUsize,
}

impl FakeMatcher {
    pub fn with(template: &str, matches: Vec<Match>) -> Self {
        let matcher = FakeMatcher::default();
        matcher.matches.lock().insert(template.to_string(), matches);
        matcher
    }
}

impl Matcher for FakeMatcher {
    fn find_matches(&self, _text: &str, template: &str) -> Result<Vec<Match>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.matches.lock().get(template).cloned().unwrap_or_default())
    }

    fn substitute(&self, template: &str, bindings: &BTreeMap<String, String>) -> Result<String> {
        TemplateMatcher::new().substitute(template, bindings)
    }
}

pub fn bindings(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn installation(backend: Arc<FakeBackend>) -> Installation {
    let config = Configuration::system().unwrap();
    Installation::new(config, backend, Arc::new(TemplateMatcher::new()))
}
