use std::collections::BTreeSet;

use camino::Utf8Path;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// A programming language, recognised by its file endings (e.g. `.c`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Language {
    pub name: String,
    pub file_endings: BTreeSet<String>,
}

impl Language {
    pub fn new<I, S>(name: impl Into<String>, file_endings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Language {
            name: name.into(),
            file_endings: file_endings.into_iter().map(Into::into).collect(),
        }
    }
}

/// An immutable, ordered collection of languages.
///
/// `add` returns a new collection; languages are scanned in registration order
/// during detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Languages {
    languages: IndexMap<String, Language>,
}

impl Languages {
    pub fn new() -> Self {
        Languages::default()
    }

    pub fn add(&self, language: Language) -> Result<Languages> {
        let mut endings = self.supported_file_endings();

        // an overwritten language releases its file endings
        if let Some(old) = self.languages.get(&language.name) {
            warn!(language = %language.name, "config overwrites existing language definition");
            for ending in &old.file_endings {
                endings.remove(ending);
            }
        }

        if let Some(ending) = language.file_endings.iter().find(|e| endings.contains(*e)) {
            return Err(Error::IllegalConfig(format!(
                "file ending ambiguity: '{}' is used by two or more languages",
                ending
            )));
        }

        let mut languages = self.languages.clone();
        languages.insert(language.name.clone(), language);
        Ok(Languages { languages })
    }

    pub fn get(&self, name: &str) -> Result<&Language> {
        self.languages
            .get(name)
            .ok_or_else(|| Error::LanguageNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.languages.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Language> {
        self.languages.values()
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    pub fn supported_file_endings(&self) -> BTreeSet<String> {
        self.languages
            .values()
            .flat_map(|l| l.file_endings.iter().cloned())
            .collect()
    }

    /// Detects the language of `filename` from its suffix.
    pub fn detect(&self, filename: &str) -> Result<&Language> {
        let suffix = Utf8Path::new(filename)
            .extension()
            .map(|ext| format!(".{}", ext))
            .ok_or_else(|| Error::LanguageNotDetected(filename.to_string()))?;
        self.languages
            .values()
            .find(|l| l.file_endings.contains(&suffix))
            .ok_or_else(|| Error::LanguageNotDetected(filename.to_string()))
    }
}

impl<'a> IntoIterator for &'a Languages {
    type Item = &'a Language;
    type IntoIter = indexmap::map::Values<'a, String, Language>;

    fn into_iter(self) -> Self::IntoIter {
        self.languages.values()
    }
}
