use cellgen_model::cell::CellError;
use cellgen_model::{ModelError, SourceLocation};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodegenError {
    /// Invariant violated by this backend or an upstream stage.
    #[error("Internal compiler error{}: {message}", at(.location))]
    Internal {
        message: String,
        location: Option<SourceLocation>,
    },

    /// Misuse reachable from source that type-checks.
    #[error("Compilation error{}: {message}", at(.location))]
    Compilation {
        message: String,
        location: Option<SourceLocation>,
    },

    #[error("Missing dependencies: {}", .0.join(", "))]
    MissingDependencies(Vec<String>),

    #[error("Function {0} is already registered")]
    DuplicateFunction(String),

    #[error("Dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error(transparent)]
    Model(ModelError),
}

fn at(location: &Option<SourceLocation>) -> String {
    match location {
        Some(loc) => format!(" at {}", loc),
        None => String::new(),
    }
}

impl CodegenError {
    pub fn internal(message: impl Into<String>) -> Self {
        CodegenError::Internal {
            message: message.into(),
            location: None,
        }
    }

    pub fn internal_at(message: impl Into<String>, location: &SourceLocation) -> Self {
        CodegenError::Internal {
            message: message.into(),
            location: Some(location.clone()),
        }
    }

    pub fn compilation(message: impl Into<String>, location: &SourceLocation) -> Self {
        CodegenError::Compilation {
            message: message.into(),
            location: Some(location.clone()),
        }
    }
}

impl From<ModelError> for CodegenError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::UnknownType(name) => CodegenError::UnknownType(name),
            other => CodegenError::Model(other),
        }
    }
}

impl From<CellError> for CodegenError {
    fn from(err: CellError) -> Self {
        CodegenError::internal(format!("constant cell: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, CodegenError>;
