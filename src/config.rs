//! Layered YAML configuration of languages and operators.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::language::{Language, Languages};
use crate::operators::{Operator, OperatorDef, Operators};

const SYSTEM_CONFIG: &str = include_str!("../config/sys.mutorch.yml");

pub const USER_CONFIG_ENV: &str = "MUTORCH_USER_CONFIG";

#[derive(Debug, Deserialize)]
struct ConfigFile {
    version: Option<serde_yaml::Value>,
    #[serde(default)]
    languages: Vec<Language>,
    #[serde(default)]
    operators: Vec<OperatorDef>,
}

fn check_version(version: Option<&serde_yaml::Value>) -> Result<()> {
    let version = version.ok_or_else(|| Error::BadConfigFile("expected 'version' property".into()))?;
    let supported = match version {
        serde_yaml::Value::String(s) => s == "1.0",
        serde_yaml::Value::Number(n) => n.as_f64() == Some(1.0),
        _ => false,
    };
    if supported {
        Ok(())
    } else {
        Err(Error::BadConfigFile(
            "unexpected 'version' property; only '1.0' is currently supported.".into(),
        ))
    }
}

/// The languages and operators known to an installation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    pub languages: Languages,
    pub operators: Operators,
}

impl Configuration {
    pub fn new(languages: Languages, operators: Operators) -> Self {
        Configuration { languages, operators }
    }

    /// The built-in catalogue.
    pub fn system() -> Result<Configuration> {
        Configuration::from_yaml(SYSTEM_CONFIG, None)
    }

    /// Parses a configuration document, layered on top of `parent`.
    pub fn from_yaml(yaml: &str, parent: Option<&Configuration>) -> Result<Configuration> {
        let file: ConfigFile =
            serde_yaml::from_str(yaml).map_err(|e| Error::BadConfigFile(e.to_string()))?;
        check_version(file.version.as_ref())?;

        let base = parent.cloned().unwrap_or_default();
        let mut languages = base.languages;
        for language in file.languages {
            languages = languages.add(language)?;
        }

        let mut seen = HashSet::new();
        let mut operators = base.operators;
        for def in file.operators {
            if !seen.insert(def.name.clone()) {
                return Err(Error::OperatorNameAlreadyExists(def.name));
            }
            let op = Operator::try_from(def)?;
            debug!(operator = op.name(), "loading operator from definition");
            operators = operators.add(op, &languages)?;
        }

        Ok(Configuration { languages, operators })
    }

    pub fn from_file(path: &Path, parent: Option<&Configuration>) -> Result<Configuration> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| Error::BadConfigFile(format!("failed to read {}: {}", path.display(), e)))?;
        info!(path = %path.display(), "loading configuration file");
        Configuration::from_yaml(&yaml, parent)
    }

    /// `$MUTORCH_USER_CONFIG`, else `~/.mutorch.yml`.
    pub fn default_user_config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(USER_CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".mutorch.yml"))
    }

    /// The system catalogue extended by a user catalogue.
    ///
    /// An explicitly given user path must exist; the default one is optional.
    pub fn load(user_config: Option<&Path>) -> Result<Configuration> {
        let system = Configuration::system()?;
        match user_config {
            Some(path) => Configuration::from_file(path, Some(&system)),
            None => match Configuration::default_user_config_path() {
                Some(path) if path.is_file() => Configuration::from_file(&path, Some(&system)),
                _ => Ok(system),
            },
        }
    }
}
