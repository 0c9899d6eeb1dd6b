use ulid::Ulid;

use crate::sources::SourceError;

#[derive(Debug)]
pub enum EngineError {
    /// Pattern fields inconsistent with its kind/end condition. Rejected
    /// before rule conversion, never silently defaulted.
    Configuration(String),
    /// A stored rule string failed to decode.
    MalformedRule(String),
    /// Zero/negative bound or inverted window.
    Range(&'static str),
    /// Series rule or resource absent.
    NotFound(Ulid),
    /// Holiday/exception/booking source unreachable. Propagated verbatim;
    /// retrying is the caller's decision.
    Dependency(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Configuration(msg) => write!(f, "invalid pattern: {msg}"),
            EngineError::MalformedRule(msg) => write!(f, "malformed rule: {msg}"),
            EngineError::Range(msg) => write!(f, "out of range: {msg}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::Dependency(msg) => write!(f, "dependency failure: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<SourceError> for EngineError {
    fn from(err: SourceError) -> Self {
        EngineError::Dependency(err.0)
    }
}
