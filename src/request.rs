//! Request options and the route / match request builders.
//!
//! A direct request routes between two named waypoints. A match request
//! sends a whole trace to be snapped onto the road network, with only the
//! endpoints forced to be leg boundaries.

use serde::{Deserialize, Serialize};

use crate::error::NavError;
use crate::trace::{CoordinateTrace, GeoPoint, Waypoint};

/// Routing profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    #[default]
    Automobile,
    AutomobileAvoidingTraffic,
    Cycling,
    Walking,
}

impl Profile {
    /// Profile path segment understood by the directions service.
    pub fn identifier(self) -> &'static str {
        match self {
            Profile::Automobile => "mapbox/driving",
            Profile::AutomobileAvoidingTraffic => "mapbox/driving-traffic",
            Profile::Cycling => "mapbox/cycling",
            Profile::Walking => "mapbox/walking",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementSystem {
    #[default]
    Metric,
    Imperial,
}

/// Options of a direct route request, also carried by every route response.
///
/// Leg boundaries are the waypoints whose `separates_legs` flag is set.
/// The first and last waypoint must always be boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOptions {
    pub waypoints: Vec<Waypoint>,
    pub profile: Profile,
    pub measurement_system: MeasurementSystem,
    pub includes_steps: bool,
}

impl RouteOptions {
    pub fn new(waypoints: Vec<Waypoint>, profile: Profile) -> Self {
        Self {
            waypoints,
            profile,
            measurement_system: MeasurementSystem::Metric,
            includes_steps: true,
        }
    }

    /// Indices of the waypoints that separate legs, in increasing order.
    pub fn waypoint_indices(&self) -> Vec<usize> {
        self.waypoints
            .iter()
            .enumerate()
            .filter(|(_, wp)| wp.separates_legs)
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of legs a route built from these options has.
    pub fn leg_count(&self) -> usize {
        self.waypoint_indices().len().saturating_sub(1)
    }

    /// Waypoints that separate legs.
    pub fn leg_waypoints(&self) -> Vec<Waypoint> {
        self.waypoints
            .iter()
            .filter(|wp| wp.separates_legs)
            .cloned()
            .collect()
    }

    pub fn validate(&self) -> Result<(), NavError> {
        validate_waypoint_indices(&self.waypoint_indices(), self.waypoints.len())
    }
}

/// Options converted from match options: every trace point becomes a
/// waypoint, but only the match's waypoint indices separate legs.
impl From<&MatchOptions> for RouteOptions {
    fn from(options: &MatchOptions) -> Self {
        let waypoints = options
            .coordinates
            .iter()
            .enumerate()
            .map(|(i, point)| Waypoint {
                point: *point,
                name: None,
                separates_legs: options.waypoint_indices.contains(&i),
            })
            .collect();

        Self {
            waypoints,
            profile: options.profile,
            measurement_system: options.measurement_system,
            includes_steps: options.includes_steps,
        }
    }
}

/// Options of a map-matching request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOptions {
    pub coordinates: Vec<GeoPoint>,
    pub profile: Profile,
    pub measurement_system: MeasurementSystem,
    pub includes_steps: bool,
    /// Trace indices treated as leg boundaries; all other points are
    /// matching input only.
    pub waypoint_indices: Vec<usize>,
}

impl MatchOptions {
    /// Replace the leg boundaries, checking the options invariant.
    pub fn with_waypoint_indices(mut self, indices: Vec<usize>) -> Result<Self, NavError> {
        validate_waypoint_indices(&indices, self.coordinates.len())?;
        self.waypoint_indices = indices;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), NavError> {
        validate_waypoint_indices(&self.waypoint_indices, self.coordinates.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub options: RouteOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchRequest {
    pub options: MatchOptions,
}

/// Leg boundaries must be strictly increasing, in range, and include
/// both the first and the last index.
pub fn validate_waypoint_indices(indices: &[usize], len: usize) -> Result<(), NavError> {
    let invalid = || NavError::InvalidWaypointIndices {
        indices: indices.to_vec(),
        len,
    };

    if len < 2 || indices.len() < 2 {
        return Err(invalid());
    }
    if indices.first() != Some(&0) || indices.last() != Some(&(len - 1)) {
        return Err(invalid());
    }
    if indices.windows(2).any(|w| w[0] >= w[1]) {
        return Err(invalid());
    }

    Ok(())
}

/// A route between exactly two waypoints named "Origin" and "Destination".
pub fn build_direct_request(origin: GeoPoint, destination: GeoPoint, profile: Profile) -> RouteRequest {
    let waypoints = vec![
        Waypoint::named(origin, "Origin"),
        Waypoint::named(destination, "Destination"),
    ];
    RouteRequest {
        options: RouteOptions::new(waypoints, profile),
    }
}

/// A direct request between the first and last point of a trace.
pub fn build_direct_request_from_trace(
    trace: &CoordinateTrace,
    profile: Profile,
) -> Result<RouteRequest, NavError> {
    let (origin, destination) = trace.endpoints()?;
    Ok(build_direct_request(origin, destination, profile))
}

/// A match request over the full trace.
///
/// Only the endpoints are leg boundaries; steps are always requested and
/// distances are metric.
pub fn build_match_request(trace: &CoordinateTrace, profile: Profile) -> Result<MatchRequest, NavError> {
    if trace.len() < 2 {
        return Err(NavError::InvalidTrace { len: trace.len() });
    }

    Ok(MatchRequest {
        options: MatchOptions {
            coordinates: trace.points.clone(),
            profile,
            measurement_system: MeasurementSystem::Metric,
            includes_steps: true,
            waypoint_indices: vec![0, trace.len() - 1],
        },
    })
}

/// A direct request from the current position through the remaining
/// leg destinations, keeping the settings of the route being replaced.
///
/// With no destinations left there is nothing to route to, which is
/// reported as [`NavError::EmptyRoute`].
pub fn build_reroute_request(
    from: GeoPoint,
    remaining: &[Waypoint],
    template: &RouteOptions,
) -> Result<RouteRequest, NavError> {
    if remaining.is_empty() {
        return Err(NavError::EmptyRoute);
    }

    let mut waypoints = Vec::with_capacity(remaining.len() + 1);
    waypoints.push(Waypoint::named(from, "Current location"));
    waypoints.extend(remaining.iter().cloned().map(|mut wp| {
        wp.separates_legs = true;
        wp
    }));

    Ok(RouteRequest {
        options: RouteOptions {
            waypoints,
            profile: template.profile,
            measurement_system: template.measurement_system,
            includes_steps: template.includes_steps,
        },
    })
}
