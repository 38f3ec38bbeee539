//! Directions credentials and navigation thresholds.

use std::env;

use crate::error::NavError;

pub const ACCESS_TOKEN_VAR: &str = "MAPBOX_ACCESS_TOKEN";
pub const HOST_VAR: &str = "MAPBOX_HOST";
pub const DEFAULT_HOST: &str = "https://api.mapbox.com";

/// Credentials and endpoint of the directions service.
///
/// Built once at startup and shared read-only by every request type.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionsConfig {
    pub access_token: String,
    pub host: String,
}

impl DirectionsConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            host: DEFAULT_HOST.to_string(),
        }
    }

    /// Reads `MAPBOX_ACCESS_TOKEN` and the optional `MAPBOX_HOST`.
    pub fn from_env() -> Result<Self, NavError> {
        let access_token = env::var(ACCESS_TOKEN_VAR)
            .map_err(|_| NavError::Config(format!("{ACCESS_TOKEN_VAR} is not set")))?;
        if access_token.trim().is_empty() {
            return Err(NavError::Config(format!("{ACCESS_TOKEN_VAR} is empty")));
        }

        let host = env::var(HOST_VAR).unwrap_or_else(|_| DEFAULT_HOST.to_string());
        Ok(Self {
            access_token,
            host: host.trim_end_matches('/').to_string(),
        })
    }
}

/// Thresholds used by the navigation session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationConfig {
    /// Distance from the route beyond which the observer is asked to reroute.
    pub off_route_threshold_m: f64,
    /// Remaining distance at which the final waypoint counts as reached.
    pub arrival_threshold_m: f64,
    /// Horizontal accuracy above which a fix counts as poor.
    pub poor_accuracy_m: f64,
    /// Speed of synthetic location updates.
    pub simulation_speed_mps: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            off_route_threshold_m: 50.0,
            arrival_threshold_m: 20.0,
            poor_accuracy_m: 65.0,
            simulation_speed_mps: 13.9,
        }
    }
}
