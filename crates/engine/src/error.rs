use thiserror::Error;

/// Errors raised while assembling a world's tick schedule.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("system '{0}' is registered twice")]
    DuplicateSystem(String),

    #[error("system '{system}' runs after unknown system '{dependency}'")]
    UnknownDependency { system: String, dependency: String },

    #[error("run-after cycle among systems: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("move threshold must be finite and non-negative, got {0}")]
    InvalidThreshold(f64),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
