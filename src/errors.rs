use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("SCOPE_PARSE: '{input}': {reason}")]
    Parse { input: String, reason: String },
    #[error("NAVIGATION_UNDEFINED: {0}")]
    Navigation(String),
    #[error("INVARIANT_VIOLATION: {0}")]
    Invariant(String),
    #[error("CONFIG_INVALID: {0}")]
    Config(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
}

impl ScopeError {
    pub(crate) fn parse(input: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for ScopeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for ScopeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<serde_yaml::Error> for ScopeError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Config(value.to_string())
    }
}

pub type ScopeResult<T> = Result<T, ScopeError>;
