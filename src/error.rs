use serde_json::{Value, json};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("no language registered with name: {0}")]
    LanguageNotFound(String),

    #[error("unable to automatically detect language used by file: {0}")]
    LanguageNotDetected(String),

    #[error("no operator registered with name: {0}")]
    OperatorNotFound(String),

    #[error("operator name is already in use: {0}")]
    OperatorNameAlreadyExists(String),

    #[error("operator {operator} has no transformation at index {index}")]
    TransformationNotFound { operator: String, index: usize },

    #[error("illegal configuration: {0}")]
    IllegalConfig(String),

    #[error("bad configuration file: {0}")]
    BadConfigFile(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("no snapshot registered with name: {0}")]
    SnapshotNotFound(String),

    #[error("mutant not found: {0}")]
    MutantNotFound(String),

    #[error("failed to build mutant.")]
    BuildFailure { output: String },

    #[error("unexpected format: {0}")]
    BadFormat(String),

    #[error("higher-order mutation is currently unsupported ({0} mutations given)")]
    HigherOrderMutation(usize),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// Wrap a collaborator failure, keeping its detail.
    pub fn unexpected(context: &str, err: impl std::fmt::Display) -> Self {
        Error::Unexpected(format!("{}: {}", context, err))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Error::LanguageNotFound(_) => "LanguageNotFound",
            Error::LanguageNotDetected(_) => "LanguageNotDetected",
            Error::OperatorNotFound(_) => "OperatorNotFound",
            Error::OperatorNameAlreadyExists(_) => "OperatorNameAlreadyExists",
            Error::TransformationNotFound { .. } => "TransformationNotFound",
            Error::IllegalConfig(_) => "IllegalConfig",
            Error::BadConfigFile(_) => "BadConfigFile",
            Error::FileNotFound(_) => "FileNotFound",
            Error::SnapshotNotFound(_) => "SnapshotNotFound",
            Error::MutantNotFound(_) => "MutantNotFound",
            Error::BuildFailure { .. } => "BuildFailure",
            Error::BadFormat(_) => "BadFormat",
            Error::HigherOrderMutation(_) => "HigherOrderMutation",
            Error::Unexpected(_) => "UnexpectedServerError",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Error::LanguageNotFound(_)
            | Error::OperatorNotFound(_)
            | Error::TransformationNotFound { .. }
            | Error::FileNotFound(_)
            | Error::SnapshotNotFound(_)
            | Error::MutantNotFound(_) => 404,
            Error::OperatorNameAlreadyExists(_) => 409,
            Error::LanguageNotDetected(_)
            | Error::BuildFailure { .. }
            | Error::BadFormat(_)
            | Error::HigherOrderMutation(_) => 400,
            Error::IllegalConfig(_) | Error::BadConfigFile(_) | Error::Unexpected(_) => 500,
        }
    }

    fn data(&self) -> Option<Value> {
        match self {
            Error::LanguageNotFound(name)
            | Error::OperatorNotFound(name)
            | Error::OperatorNameAlreadyExists(name)
            | Error::FileNotFound(name)
            | Error::SnapshotNotFound(name) => Some(json!({ "name": name })),
            Error::LanguageNotDetected(filename) => Some(json!({ "filename": filename })),
            Error::MutantNotFound(uuid) => Some(json!({ "uuid": uuid })),
            Error::TransformationNotFound { operator, index } => {
                Some(json!({ "operator": operator, "index": index }))
            }
            Error::BadFormat(reason) => Some(json!({ "reason": reason })),
            Error::BuildFailure { output } if !output.is_empty() => {
                Some(json!({ "output": output }))
            }
            Error::Unexpected(message) => Some(json!({ "message": message })),
            _ => None,
        }
    }

    /// Machine-readable description of this error.
    pub fn to_json(&self) -> Value {
        let mut error = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Some(data) = self.data() {
            error["data"] = data;
        }
        json!({ "error": error })
    }
}
