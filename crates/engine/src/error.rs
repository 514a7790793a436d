use std::fmt;

use deepsky_config::{ConfigError, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Settings declaration or assignment failed.
    Config(ConfigError),
    /// Persisted store failure.
    Store(StoreError),
    /// A feature with this name is already registered.
    DuplicateFeature(String),
    /// A processing job failed inside the host.
    Job(JobError),
    /// Scratch table misuse.
    Scratch(ScratchError),
    /// An operation needed a target view and there is none.
    NoView,
}

impl EngineError {
    /// True for errors raised while setting a feature up.
    pub fn is_configuration_error(&self) -> bool {
        match self {
            Self::DuplicateFeature(_) => true,
            Self::Config(e) => e.is_configuration_error(),
            _ => false,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{}", e),
            Self::Store(e) => write!(f, "settings store: {}", e),
            Self::DuplicateFeature(name) => write!(f, "feature '{}' is already registered", name),
            Self::Job(e) => write!(f, "{}", e),
            Self::Scratch(e) => write!(f, "{}", e),
            Self::NoView => write!(f, "no target view"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::Job(e) => Some(e),
            Self::Scratch(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<JobError> for EngineError {
    fn from(e: JobError) -> Self {
        Self::Job(e)
    }
}

impl From<ScratchError> for EngineError {
    fn from(e: ScratchError) -> Self {
        Self::Scratch(e)
    }
}

/// Failure reported by the host while executing a processing job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobError {
    pub process: String,
    pub message: String,
}

impl JobError {
    pub fn new(process: impl Into<String>, message: impl Into<String>) -> Self {
        Self { process: process.into(), message: message.into() }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.process, self.message)
    }
}

impl std::error::Error for JobError {}

/// A feature's precondition on the target view or scratch state is not met.
///
/// Not an `Err` of the run: it is reported to the user and ends the run
/// without side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub message: String,
}

impl ValidationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed: {}", self.message)
    }
}

impl std::error::Error for ValidationFailure {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScratchError {
    /// The slot already holds an artifact that was never released.
    SlotOccupied { slot: String, created_by: String },
    /// Nothing to read or release under this name.
    NotFound { slot: String },
}

impl fmt::Display for ScratchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlotOccupied { slot, created_by } => {
                write!(f, "scratch slot '{}' is still held (created by {})", slot, created_by)
            }
            Self::NotFound { slot } => write!(f, "scratch slot '{}' is empty", slot),
        }
    }
}

impl std::error::Error for ScratchError {}
