use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::location::FileLocationRange;

/// A located, argument-bound application of one transformation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Mutation {
    pub operator: String,
    pub transformation_index: usize,
    pub location: FileLocationRange,
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,
}

impl Mutation {
    pub fn new(
        operator: impl Into<String>,
        transformation_index: usize,
        location: FileLocationRange,
        arguments: BTreeMap<String, String>,
    ) -> Self {
        Mutation {
            operator: operator.into(),
            transformation_index,
            location,
            arguments,
        }
    }

    pub fn filename(&self) -> &str {
        &self.location.filename
    }
}

/// The literal text that should occupy `location`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Replacement {
    pub location: FileLocationRange,
    pub text: String,
}

impl Replacement {
    pub fn new(location: FileLocationRange, text: impl Into<String>) -> Self {
        Replacement {
            location,
            text: text.into(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.location.filename
    }
}

/// Name of the snapshot registered for mutant `uuid`.
pub fn snapshot_name(uuid: &Uuid) -> String {
    format!("mutorch:{}", uuid.simple())
}

/// Tag of the image persisted for mutant `uuid`.
pub fn image_name(uuid: &Uuid) -> String {
    format!("mutorch/{}", uuid.simple())
}

/// A registered, built variant of a base snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutant {
    #[serde(with = "uuid::serde::simple")]
    pub uuid: Uuid,
    /// Name of the snapshot the mutant was generated from.
    pub base: String,
    pub mutations: Vec<Mutation>,
}

impl Mutant {
    pub fn new(uuid: Uuid, base: impl Into<String>, mutations: Vec<Mutation>) -> Self {
        Mutant {
            uuid,
            base: base.into(),
            mutations,
        }
    }

    /// Parses a mutant id in either simple or hyphenated form.
    pub fn parse_id(id: &str) -> Result<Uuid> {
        Uuid::parse_str(id).map_err(|e| Error::BadFormat(format!("bad mutant id '{}': {}", id, e)))
    }

    pub fn snapshot(&self) -> String {
        snapshot_name(&self.uuid)
    }

    pub fn image(&self) -> String {
        image_name(&self.uuid)
    }
}
