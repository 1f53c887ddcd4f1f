//! Turns mutations into text replacements, edited files and unified diffs.

use std::sync::Arc;

use indexmap::IndexMap;
use similar::TextDiff;
use tracing::{debug, info};

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::matcher::Matcher;
use crate::mutants::{Mutation, Replacement};
use crate::snapshot::Snapshot;
use crate::sources::SourceCache;

/// Picks a conflict-free subset of replacements within a single file.
///
/// Earliest start wins; among equal starts the longest span wins. A candidate
/// is dropped when it starts before the stop of the last accepted one, so
/// adjacent spans and insertions at the same point are all kept. The result
/// is in ascending file order.
pub fn resolve(replacements: &[Replacement]) -> Vec<Replacement> {
    let mut sorted: Vec<&Replacement> = replacements.iter().collect();
    sorted.sort_by(|a, b| {
        a.location
            .start()
            .cmp(&b.location.start())
            .then_with(|| b.location.stop().cmp(&a.location.stop()))
    });

    let mut accepted: Vec<Replacement> = Vec::with_capacity(sorted.len());
    for candidate in sorted {
        if let Some(last) = accepted.last() {
            if candidate.location.start() < last.location.stop() {
                debug!(
                    dropped = %candidate.location,
                    kept = %last.location,
                    "dropping conflicting replacement"
                );
                continue;
            }
        }
        accepted.push(candidate.clone());
    }
    accepted
}

pub struct Resolver {
    config: Arc<Configuration>,
    sources: Arc<SourceCache>,
    matcher: Arc<dyn Matcher>,
}

impl Resolver {
    pub fn new(config: Arc<Configuration>, sources: Arc<SourceCache>, matcher: Arc<dyn Matcher>) -> Self {
        Resolver {
            config,
            sources,
            matcher,
        }
    }

    pub fn mutation_to_replacement(&self, mutation: &Mutation) -> Result<Replacement> {
        let operator = self.config.operators.get(&mutation.operator)?;
        let transformation = operator.transformation(mutation.transformation_index)?;
        let text = self.matcher.substitute(&transformation.rewrite, &mutation.arguments)?;
        Ok(Replacement::new(mutation.location.clone(), text))
    }

    /// Groups the replacements for `mutations` by file, in order of first appearance.
    pub fn mutations_to_replacements(&self, mutations: &[Mutation]) -> Result<IndexMap<String, Vec<Replacement>>> {
        let mut by_file: IndexMap<String, Vec<Replacement>> = IndexMap::new();
        for mutation in mutations {
            let replacement = self.mutation_to_replacement(mutation)?;
            by_file
                .entry(mutation.filename().to_string())
                .or_default()
                .push(replacement);
        }
        Ok(by_file)
    }

    /// Contents of `filename` after the conflict-free subset of `replacements`
    /// has been applied.
    pub fn apply(&self, snapshot: &Snapshot, filename: &str, replacements: &[Replacement]) -> Result<String> {
        let file = self.sources.file(snapshot, filename)?;
        let text = file.text();

        let mut mutated = String::with_capacity(text.len());
        let mut cursor = 0;
        for replacement in resolve(replacements) {
            let start = file.offset(replacement.location.start())?;
            let stop = file.offset(replacement.location.stop())?;
            if start < cursor || stop < start {
                return Err(Error::BadFormat(format!("invalid replacement range {}", replacement.location)));
            }
            mutated.push_str(&text[cursor..start]);
            mutated.push_str(&replacement.text);
            cursor = stop;
        }
        mutated.push_str(&text[cursor..]);
        Ok(mutated)
    }

    /// A unified diff over every file touched by `mutations`.
    pub fn mutations_to_diff(&self, snapshot: &Snapshot, mutations: &[Mutation]) -> Result<String> {
        let by_file = self.mutations_to_replacements(mutations)?;
        self.sources
            .prefetch(snapshot, by_file.keys().map(String::as_str))?;

        let mut diff = String::new();
        for (filename, replacements) in &by_file {
            let original = self.sources.read(snapshot, filename)?;
            let mutated = self.apply(snapshot, filename, replacements)?;
            if original == mutated {
                debug!(file = %filename, "mutations leave file unchanged");
                continue;
            }
            let file_diff = TextDiff::from_lines(original.as_str(), mutated.as_str())
                .unified_diff()
                .context_radius(3)
                .header(filename, filename)
                .to_string();
            diff.push_str(&file_diff);
        }

        info!(
            snapshot = %snapshot.name,
            files = by_file.len(),
            bytes = diff.len(),
            "computed diff"
        );
        Ok(diff)
    }
}
