use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::matcher::Match;

/// A side condition that a template match must satisfy to become a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Constraint {
    /// The named hole captured a single, whitespace-free term.
    IsSingleTerm { hole: String },
    /// The text before the match, ignoring trailing whitespace, ends with one
    /// of the given strings.
    PrecededBy {
        #[serde(rename = "any-of")]
        options: BTreeSet<String>,
    },
}

impl Constraint {
    pub fn is_single_term(hole: impl Into<String>) -> Self {
        Constraint::IsSingleTerm { hole: hole.into() }
    }

    pub fn preceded_by<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Constraint::PrecededBy {
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Constraint::IsSingleTerm { hole } if hole.is_empty() => {
                Err(Error::BadConfigFile("is-single-term constraint requires a hole name".into()))
            }
            Constraint::PrecededBy { options } if options.is_empty() => {
                Err(Error::BadConfigFile("preceded-by constraint requires at least one option".into()))
            }
            _ => Ok(()),
        }
    }

    /// Checks `m`, found at `offset_start..offset_stop` in `text`.
    pub fn is_satisfied_by(&self, m: &Match, text: &str, offset_start: usize, _offset_stop: usize) -> bool {
        match self {
            Constraint::IsSingleTerm { hole } => match m.bindings.get(hole) {
                Some(fragment) => {
                    let fragment = fragment.trim();
                    !fragment.is_empty() && !fragment.chars().any(char::is_whitespace)
                }
                None => false,
            },
            Constraint::PrecededBy { options } => {
                let preceding = text.get(..offset_start).unwrap_or_default().trim_end();
                options.iter().any(|option| preceding.ends_with(option.as_str()))
            }
        }
    }
}

/// True iff every constraint holds.
pub fn all_satisfied(constraints: &[Constraint], m: &Match, text: &str, offset_start: usize, offset_stop: usize) -> bool {
    constraints
        .iter()
        .all(|c| c.is_satisfied_by(m, text, offset_start, offset_stop))
}
