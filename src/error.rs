//! Typed errors for engine operations.
//!
//! Plumbing failures (I/O, serialization) travel as `anyhow::Error`; these
//! variants cover the operation outcomes callers branch on.

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HearthError {
    /// A configuration value was rejected. The target keeps its prior value.
    InvalidConfig(String),
    /// An entity with this id is already registered.
    DuplicateId(String),
    /// No entity with this id.
    NotFound(String),
    /// The component is already starting or running.
    AlreadyRunning(String),
    /// The component is not in a state that can be stopped.
    NotRunning(String),
    /// The component's worker could not be launched.
    LaunchFailure(String),
    /// The component's worker never reported healthy in time.
    HealthCheckTimeout(String),
    /// The component's worker exited without being asked to stop.
    WorkerCrashed(String),
}

impl fmt::Display for HearthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HearthError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            HearthError::DuplicateId(id) => write!(f, "Duplicate id: {}", id),
            HearthError::NotFound(id) => write!(f, "Not found: {}", id),
            HearthError::AlreadyRunning(id) => write!(f, "Component already running: {}", id),
            HearthError::NotRunning(id) => write!(f, "Component not running: {}", id),
            HearthError::LaunchFailure(msg) => write!(f, "Launch failure: {}", msg),
            HearthError::HealthCheckTimeout(id) => {
                write!(f, "Health check timed out for component: {}", id)
            }
            HearthError::WorkerCrashed(id) => write!(f, "Worker crashed: {}", id),
        }
    }
}

impl std::error::Error for HearthError {}
