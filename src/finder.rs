//! Enumerates the single-order mutations of a file.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Configuration;
use crate::error::Result;
use crate::location::FileLocationRange;
use crate::matcher::{Match, Matcher};
use crate::mutants::Mutation;
use crate::operators::Operator;
use crate::snapshot::Snapshot;
use crate::sources::{SourceCache, SourceFile};

/// Optional restrictions on a mutation search.
#[derive(Debug, Clone, Default)]
pub struct MutationFilter {
    /// Language of the file; detected from its suffix when unset.
    pub language: Option<String>,
    /// Operator names to use; every operator for the language when unset.
    pub operators: Option<Vec<String>>,
    /// Only keep mutations that start on one of these lines.
    pub lines: Option<BTreeSet<usize>>,
}

pub struct MutationFinder {
    config: Arc<Configuration>,
    sources: Arc<SourceCache>,
    matcher: Arc<dyn Matcher>,
}

impl MutationFinder {
    pub fn new(config: Arc<Configuration>, sources: Arc<SourceCache>, matcher: Arc<dyn Matcher>) -> Self {
        MutationFinder {
            config,
            sources,
            matcher,
        }
    }

    /// Lazily finds every mutation of `filepath`.
    ///
    /// Catalogue and file lookups fail here, before any matching; matcher
    /// failures are yielded by the iterator.
    pub fn find_mutations(&self, snapshot: &Snapshot, filepath: &str, filter: &MutationFilter) -> Result<Mutations<'_>> {
        let language = match &filter.language {
            Some(name) => self.config.languages.get(name)?,
            None => self.config.languages.detect(filepath)?,
        };

        let operators: Vec<&Operator> = match &filter.operators {
            Some(names) => names
                .iter()
                .map(|name| self.config.operators.get(name))
                .collect::<Result<_>>()?,
            None => self.config.operators.for_language(&language.name).collect(),
        };

        let file = self.sources.file(snapshot, filepath)?;
        info!(
            snapshot = %snapshot.name,
            file = filepath,
            language = %language.name,
            operators = operators.len(),
            "finding mutations"
        );

        let work: Vec<(&Operator, usize)> = operators
            .into_iter()
            .flat_map(|op| (0..op.transformations().len()).map(move |i| (op, i)))
            .collect();

        Ok(Mutations {
            matcher: self.matcher.as_ref(),
            file,
            filepath: filepath.to_string(),
            lines: filter.lines.clone(),
            work: work.into_iter(),
            current: None,
            pending: VecDeque::new(),
        })
    }
}

/// Iterator over the mutations of one file, ordered by operator, then
/// transformation index, then match position.
pub struct Mutations<'a> {
    matcher: &'a dyn Matcher,
    file: Arc<SourceFile>,
    filepath: String,
    lines: Option<BTreeSet<usize>>,
    work: std::vec::IntoIter<(&'a Operator, usize)>,
    current: Option<(&'a Operator, usize)>,
    pending: VecDeque<Match>,
}

impl Mutations<'_> {
    fn to_mutation(&self, op: &Operator, index: usize, m: Match) -> Result<Option<Mutation>> {
        if let Some(lines) = &self.lines {
            if !lines.contains(&m.location.start.line) {
                return Ok(None);
            }
        }

        let transformation = op.transformation(index)?;
        let start = self.file.offset(m.location.start)?;
        let stop = self.file.offset(m.location.stop)?;
        if !transformation.satisfies_constraints(&m, self.file.text(), start, stop) {
            return Ok(None);
        }

        Ok(Some(Mutation::new(
            op.name(),
            index,
            FileLocationRange::new(self.filepath.clone(), m.location),
            m.bindings,
        )))
    }
}

impl Iterator for Mutations<'_> {
    type Item = Result<Mutation>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let (Some((op, index)), Some(m)) = (self.current, self.pending.pop_front()) {
                match self.to_mutation(op, index, m) {
                    Ok(Some(mutation)) => return Some(Ok(mutation)),
                    Ok(None) => continue,
                    Err(e) => return Some(Err(e)),
                }
            }

            let (op, index) = self.work.next()?;
            self.current = Some((op, index));
            let template = &op.transformations()[index].match_template;
            match self.matcher.find_matches(self.file.text(), template) {
                Ok(matches) => {
                    debug!(operator = op.name(), transformation = index, matches = matches.len(), "matched template");
                    self.pending = matches.into();
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
