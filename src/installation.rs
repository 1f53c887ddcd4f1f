//! The operations exposed to clients, wired over one backend and catalogue.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::config::Configuration;
use crate::error::Result;
use crate::finder::{MutationFilter, MutationFinder, Mutations};
use crate::language::{Language, Languages};
use crate::lifecycle::{MutantManager, MutantRegistry};
use crate::matcher::Matcher;
use crate::mutants::{self, Mutant, Mutation, Replacement};
use crate::operators::Operator;
use crate::replacement::Resolver;
use crate::snapshot::{Backend, Snapshot};
use crate::sources::SourceCache;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub languages: usize,
    pub operators: usize,
    pub mutants: usize,
}

pub struct Installation {
    config: Arc<Configuration>,
    backend: Arc<dyn Backend>,
    sources: Arc<SourceCache>,
    finder: MutationFinder,
    resolver: Arc<Resolver>,
    manager: MutantManager,
}

impl Installation {
    pub fn new(config: Configuration, backend: Arc<dyn Backend>, matcher: Arc<dyn Matcher>) -> Self {
        let config = Arc::new(config);
        let sources = Arc::new(SourceCache::new(backend.clone()));
        let finder = MutationFinder::new(config.clone(), sources.clone(), matcher.clone());
        let resolver = Arc::new(Resolver::new(config.clone(), sources.clone(), matcher));
        let manager = MutantManager::new(backend.clone(), resolver.clone(), Arc::new(MutantRegistry::new()));
        info!(
            languages = config.languages.len(),
            operators = config.operators.len(),
            "installation ready"
        );
        Installation {
            config,
            backend,
            sources,
            finder,
            resolver,
            manager,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn languages(&self) -> &Languages {
        &self.config.languages
    }

    pub fn language(&self, name: &str) -> Result<&Language> {
        self.config.languages.get(name)
    }

    /// All operators, or those supporting `language`.
    pub fn operators(&self, language: Option<&str>) -> Result<Vec<&Operator>> {
        match language {
            Some(name) => {
                let language = self.config.languages.get(name)?;
                Ok(self.config.operators.for_language(&language.name).collect())
            }
            None => Ok(self.config.operators.iter().collect()),
        }
    }

    pub fn operator(&self, name: &str) -> Result<&Operator> {
        self.config.operators.get(name)
    }

    pub fn snapshot(&self, name: &str) -> Result<Snapshot> {
        self.backend.lookup_snapshot(name)
    }

    /// Lazily enumerates the mutations of `filepath` in `snapshot`.
    pub fn find_mutations(&self, snapshot: &Snapshot, filepath: &str, filter: &MutationFilter) -> Result<Mutations<'_>> {
        self.finder.find_mutations(snapshot, filepath, filter)
    }

    pub fn mutations(&self, snapshot: &str, filepath: &str, filter: &MutationFilter) -> Result<Vec<Mutation>> {
        let snapshot = self.snapshot(snapshot)?;
        self.find_mutations(&snapshot, filepath, filter)?.collect()
    }

    pub fn replacements(&self, snapshot: &str, mutations: &[Mutation]) -> Result<IndexMap<String, Vec<Replacement>>> {
        // checked for existence only; replacements don't read the snapshot
        self.snapshot(snapshot)?;
        self.resolver.mutations_to_replacements(mutations)
    }

    pub fn diff(&self, snapshot: &str, mutations: &[Mutation]) -> Result<String> {
        let snapshot = self.snapshot(snapshot)?;
        self.resolver.mutations_to_diff(&snapshot, mutations)
    }

    pub fn mutate(&self, snapshot: &str, mutations: Vec<Mutation>) -> Result<Mutant> {
        let snapshot = self.snapshot(snapshot)?;
        self.manager.generate(&snapshot, mutations)
    }

    pub fn mutants(&self) -> Vec<Mutant> {
        self.manager.list()
    }

    pub fn mutant(&self, uuid: &Uuid) -> Result<Mutant> {
        self.manager.get(uuid)
    }

    pub fn delete_mutant(&self, uuid: &Uuid) -> Result<Mutant> {
        let mutant = self.manager.delete(uuid)?;
        self.sources.forget_snapshot(&mutant.snapshot());
        Ok(mutant)
    }

    /// Deletes a mutant, including one kept by an earlier process.
    pub fn discard_mutant(&self, uuid: &Uuid) -> Result<()> {
        self.manager.discard(uuid)?;
        self.sources.forget_snapshot(&mutants::snapshot_name(uuid));
        Ok(())
    }

    pub fn clear_mutants(&self) {
        for mutant in self.manager.list() {
            self.sources.forget_snapshot(&mutant.snapshot());
        }
        self.manager.clear();
    }

    pub fn health(&self) -> Health {
        Health {
            status: "ok",
            languages: self.config.languages.len(),
            operators: self.config.operators.len(),
            mutants: self.manager.registry().len(),
        }
    }
}
