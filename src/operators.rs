//! Mutation operators and the transformations that implement them.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::constraint::{self, Constraint};
use crate::error::{Error, Result};
use crate::language::Languages;
use crate::matcher::Match;

/// One concrete match/rewrite template pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    #[serde(rename = "match")]
    pub match_template: String,
    pub rewrite: String,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl Transformation {
    pub fn new(match_template: impl Into<String>, rewrite: impl Into<String>) -> Self {
        Transformation {
            match_template: match_template.into(),
            rewrite: rewrite.into(),
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
        self
    }

    pub fn satisfies_constraints(&self, m: &Match, text: &str, offset_start: usize, offset_stop: usize) -> bool {
        constraint::all_satisfied(&self.constraints, m, text, offset_start, offset_stop)
    }
}

/// An operator definition as written in a configuration file, before validation.
#[derive(Debug, Deserialize)]
pub(crate) struct OperatorDef {
    pub(crate) name: String,
    languages: BTreeSet<String>,
    transformations: Vec<Transformation>,
}

impl TryFrom<OperatorDef> for Operator {
    type Error = Error;

    fn try_from(def: OperatorDef) -> Result<Self> {
        Operator::new(def.name, def.languages, def.transformations)
    }
}

/// A named family of rewrites for one or more languages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OperatorDef")]
pub struct Operator {
    name: String,
    languages: BTreeSet<String>,
    transformations: Vec<Transformation>,
}

impl Operator {
    pub fn new<I, S>(name: impl Into<String>, languages: I, transformations: Vec<Transformation>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let languages: BTreeSet<String> = languages.into_iter().map(Into::into).collect();
        if name.is_empty() {
            return Err(Error::BadConfigFile("operator must have a non-empty name".into()));
        }
        if languages.is_empty() {
            return Err(Error::BadConfigFile(format!("operator {} must support at least one language", name)));
        }
        if transformations.is_empty() {
            return Err(Error::BadConfigFile(format!(
                "operator {} must implement at least one transformation",
                name
            )));
        }
        for t in &transformations {
            for c in &t.constraints {
                c.validate()?;
            }
        }
        Ok(Operator {
            name,
            languages,
            transformations,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.languages.iter().map(String::as_str)
    }

    pub fn supports_language(&self, language: &str) -> bool {
        self.languages.contains(language)
    }

    pub fn transformations(&self) -> &[Transformation] {
        &self.transformations
    }

    pub fn transformation(&self, index: usize) -> Result<&Transformation> {
        self.transformations
            .get(index)
            .ok_or_else(|| Error::TransformationNotFound {
                operator: self.name.clone(),
                index,
            })
    }
}

/// An immutable, ordered collection of operators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operators {
    operators: IndexMap<String, Operator>,
}

impl Operators {
    pub fn new() -> Self {
        Operators::default()
    }

    /// Returns a copy of this collection that also contains `op`.
    ///
    /// Fails with `LanguageNotFound` if `op` supports a language missing from
    /// `languages`.
    pub fn add(&self, op: Operator, languages: &Languages) -> Result<Operators> {
        if let Some(missing) = op.languages().find(|l| !languages.contains(l)) {
            error!(operator = %op.name, language = missing, "failed to add operator: language not found");
            return Err(Error::LanguageNotFound(missing.to_string()));
        }
        if self.operators.contains_key(&op.name) {
            warn!(operator = %op.name, "config overwrites existing operator definition");
        }

        let mut operators = self.operators.clone();
        debug!(operator = %op.name, "added operator to collection");
        operators.insert(op.name.clone(), op);
        Ok(Operators { operators })
    }

    pub fn get(&self, name: &str) -> Result<&Operator> {
        self.operators
            .get(name)
            .ok_or_else(|| Error::OperatorNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operator> {
        self.operators.values()
    }

    /// Operators that support `language`, in registration order.
    pub fn for_language<'a>(&'a self, language: &'a str) -> impl Iterator<Item = &'a Operator> + 'a {
        self.operators
            .values()
            .filter(move |op| op.supports_language(language))
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}
