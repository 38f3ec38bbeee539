//! Error kinds of the acquisition pipeline and navigation session.

use thiserror::Error;

/// A failed call to the directions service.
///
/// Never retried; the flow that issued the request is aborted.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{description}")]
pub struct ServiceError {
    pub description: String,
    /// Machine-readable status reported by the service, e.g. `NoRoute`.
    pub code: Option<String>,
}

impl ServiceError {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            code: None,
        }
    }

    pub fn with_code(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            code: Some(code.into()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavError {
    #[error("directions service failed: {0}")]
    Service(#[from] ServiceError),

    #[error("trace needs at least 2 coordinates, got {len}")]
    InvalidTrace { len: usize },

    #[error("waypoint indices {indices:?} are invalid for a trace of {len} points")]
    InvalidWaypointIndices { indices: Vec<usize>, len: usize },

    #[error("GPX trace could not be read: {0}")]
    Gpx(String),

    #[error("match result cannot be converted to a route: {0}")]
    MatchConversion(String),

    #[error("response contains no route with at least one leg")]
    EmptyRoute,

    #[error("route index {index} out of range for {count} routes")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("navigation session has already ended")]
    SessionEnded,

    #[error("the final waypoint has not been reached")]
    ArrivalNotReached,
}
