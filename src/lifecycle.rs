//! Materializes mutants: diff, provision, patch, build, persist, register.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::mutants::{self, Mutant, Mutation};
use crate::replacement::Resolver;
use crate::snapshot::{Backend, BuildOutcome, Container, Snapshot};

/// The set of registered mutants, keyed by UUID.
#[derive(Debug, Default)]
pub struct MutantRegistry {
    mutants: Mutex<IndexMap<Uuid, Mutant>>,
}

impl MutantRegistry {
    pub fn new() -> Self {
        MutantRegistry::default()
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.mutants.lock().contains_key(uuid)
    }

    pub fn get(&self, uuid: &Uuid) -> Result<Mutant> {
        self.mutants
            .lock()
            .get(uuid)
            .cloned()
            .ok_or_else(|| Error::MutantNotFound(uuid.simple().to_string()))
    }

    /// Panics if a mutant with the same UUID is already registered.
    pub fn insert(&self, mutant: Mutant) {
        let mut mutants = self.mutants.lock();
        assert!(
            !mutants.contains_key(&mutant.uuid),
            "UUID collision: mutant {} already registered",
            mutant.uuid
        );
        mutants.insert(mutant.uuid, mutant);
    }

    pub fn remove(&self, uuid: &Uuid) -> Result<Mutant> {
        self.mutants
            .lock()
            .shift_remove(uuid)
            .ok_or_else(|| Error::MutantNotFound(uuid.simple().to_string()))
    }

    /// Removes and returns every mutant, oldest first.
    pub fn drain(&self) -> Vec<Mutant> {
        self.mutants.lock().drain(..).map(|(_, m)| m).collect()
    }

    pub fn list(&self) -> Vec<Mutant> {
        self.mutants.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.mutants.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutants.lock().is_empty()
    }
}

/// Destroys its container when dropped.
struct ContainerGuard<'a> {
    backend: &'a dyn Backend,
    container: Container,
}

impl Drop for ContainerGuard<'_> {
    fn drop(&mut self) {
        debug!(container = %self.container.id, "destroying container");
        if let Err(e) = self.backend.destroy(&self.container) {
            error!(container = %self.container.id, error = %e, "failed to destroy container");
        }
    }
}

pub struct MutantManager {
    backend: Arc<dyn Backend>,
    resolver: Arc<Resolver>,
    registry: Arc<MutantRegistry>,
}

impl MutantManager {
    pub fn new(backend: Arc<dyn Backend>, resolver: Arc<Resolver>, registry: Arc<MutantRegistry>) -> Self {
        MutantManager {
            backend,
            resolver,
            registry,
        }
    }

    pub fn registry(&self) -> &MutantRegistry {
        &self.registry
    }

    /// Builds and registers a mutant of `snapshot`.
    ///
    /// At most one mutation is supported. The ephemeral build container is
    /// destroyed before this returns, whatever the outcome.
    pub fn generate(&self, snapshot: &Snapshot, mutations: Vec<Mutation>) -> Result<Mutant> {
        if mutations.len() > 1 {
            return Err(Error::HigherOrderMutation(mutations.len()));
        }

        let uuid = Uuid::new_v4();
        assert!(!self.registry.contains(&uuid), "UUID collision: {}", uuid);
        let mutant = Mutant::new(uuid, snapshot.name.clone(), mutations);
        info!(mutant = %uuid.simple(), snapshot = %snapshot.name, "generating mutant");

        let diff = self.resolver.mutations_to_diff(snapshot, &mutant.mutations)?;
        let image = mutant.image();
        self.build_image(snapshot, &diff, &image)?;

        let record = snapshot.derive(mutant.snapshot(), image.clone());
        if let Err(e) = self.backend.register_snapshot(record) {
            error!(mutant = %uuid.simple(), error = %e, "failed to register mutant snapshot");
            if let Err(e) = self.backend.delete_image(&image) {
                warn!(image = %image, error = %e, "failed to delete orphaned image");
            }
            return Err(e);
        }

        self.registry.insert(mutant.clone());
        info!(mutant = %uuid.simple(), "registered mutant");
        Ok(mutant)
    }

    fn build_image(&self, snapshot: &Snapshot, diff: &str, image: &str) -> Result<()> {
        let container = self.backend.provision(snapshot)?;
        debug!(container = %container.id, snapshot = %snapshot.name, "provisioned container");
        let guard = ContainerGuard {
            backend: self.backend.as_ref(),
            container,
        };

        self.backend.apply_patch(&guard.container, diff)?;
        match self.backend.build(&guard.container)? {
            BuildOutcome::Success => {
                debug!(container = %guard.container.id, "build succeeded");
            }
            BuildOutcome::Failure { output } => {
                warn!(container = %guard.container.id, "build failed");
                return Err(Error::BuildFailure { output });
            }
        }
        self.backend.persist(&guard.container, image)?;
        debug!(container = %guard.container.id, image = image, "persisted container");
        Ok(())
    }

    pub fn get(&self, uuid: &Uuid) -> Result<Mutant> {
        self.registry.get(uuid)
    }

    pub fn list(&self) -> Vec<Mutant> {
        self.registry.list()
    }

    /// Unregisters a mutant and deletes its artifacts.
    pub fn delete(&self, uuid: &Uuid) -> Result<Mutant> {
        let mutant = self.registry.remove(uuid)?;
        self.release(&mutant);
        Ok(mutant)
    }

    /// Deletes the artifacts of a mutant, whether or not this process registered it.
    ///
    /// Mutants kept by an earlier process are found through their snapshot
    /// record; unlike `delete`, backend failures are reported.
    pub fn discard(&self, uuid: &Uuid) -> Result<()> {
        if self.registry.contains(uuid) {
            return self.delete(uuid).map(|_| ());
        }
        let name = mutants::snapshot_name(uuid);
        let record = self.backend.lookup_snapshot(&name).map_err(|e| match e {
            Error::SnapshotNotFound(_) => Error::MutantNotFound(uuid.simple().to_string()),
            e => e,
        })?;
        self.backend.deregister_snapshot(&name)?;
        self.backend.delete_image(&record.image)?;
        info!(mutant = %uuid.simple(), "discarded kept mutant");
        Ok(())
    }

    /// Deletes every registered mutant.
    pub fn clear(&self) {
        let mutants = self.registry.drain();
        if !mutants.is_empty() {
            info!(count = mutants.len(), "clearing mutants");
        }
        for mutant in &mutants {
            self.release(mutant);
        }
    }

    fn release(&self, mutant: &Mutant) {
        let snapshot = mutant.snapshot();
        let image = mutant.image();
        if let Err(e) = self.backend.deregister_snapshot(&snapshot) {
            warn!(snapshot = %snapshot, error = %e, "failed to deregister mutant snapshot");
        }
        if let Err(e) = self.backend.delete_image(&image) {
            warn!(image = %image, error = %e, "failed to delete mutant image");
        }
        info!(mutant = %mutant.uuid.simple(), "deleted mutant");
    }
}
