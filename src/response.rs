//! Route and match responses.
//!
//! A direct route response and a route-shaped match response both hold
//! candidate routes made of legs. A raw match response holds the
//! service's matchings with bare legs that still need waypoints and
//! options attached before a session can use them.

use serde::{Deserialize, Serialize};

use crate::error::NavError;
use crate::instructions::Maneuver;
use crate::request::{MatchOptions, RouteOptions};
use crate::trace::{GeoPoint, Waypoint};

/// One maneuver and the stretch of road that follows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub maneuver: Maneuver,
    pub instruction: String,
    pub location: GeoPoint,
    pub distance_m: f64,
    pub duration_s: f64,
}

/// The part of a route between two consecutive leg boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub source: Waypoint,
    pub destination: Waypoint,
    pub distance_m: f64,
    pub duration_s: f64,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Full path; legs partition it in order.
    pub geometry: Vec<GeoPoint>,
    pub distance_m: f64,
    pub duration_s: f64,
    pub legs: Vec<Leg>,
}

impl Route {
    pub fn destination(&self) -> Option<&Waypoint> {
        self.legs.last().map(|leg| &leg.destination)
    }
}

/// Candidate routes from a direct request, or a match converted into one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    pub routes: Vec<Route>,
    /// Leg boundaries of the first route, origin first.
    pub waypoints: Vec<Waypoint>,
    pub options: RouteOptions,
}

/// How the service snapped one input coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracepoint {
    pub location: GeoPoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub matching_index: usize,
    /// Position among the response waypoints, for leg boundaries only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waypoint_index: Option<usize>,
    pub alternatives_count: usize,
}

/// Matched routes already carrying legs with waypoints.
///
/// Tracepoints hold per-input matching metadata; `None` marks an input
/// coordinate the service discarded as noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResponse {
    pub routes: Vec<Route>,
    pub confidences: Vec<f64>,
    pub tracepoints: Vec<Option<Tracepoint>>,
    pub options: MatchOptions,
}

impl MatchResponse {
    /// Drop the matching metadata, keeping the routes as they are.
    pub fn into_route_response(self) -> RouteResponse {
        let waypoints = self
            .routes
            .first()
            .map(|route| leg_boundaries(&route.legs))
            .unwrap_or_default();

        RouteResponse {
            routes: self.routes,
            waypoints,
            options: RouteOptions::from(&self.options),
        }
    }
}

/// A leg as returned by the matching endpoint, without waypoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLeg {
    pub distance_m: f64,
    pub duration_s: f64,
    pub summary: String,
    pub steps: Vec<Step>,
}

/// One contiguous stretch of the trace matched onto the road network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matching {
    pub confidence: f64,
    pub geometry: Vec<GeoPoint>,
    pub distance_m: f64,
    pub duration_s: f64,
    pub legs: Vec<RawLeg>,
}

/// The matching endpoint's answer before conversion into routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMatchResponse {
    pub matchings: Vec<Matching>,
    pub tracepoints: Vec<Option<Tracepoint>>,
}

/// A response together with the candidate route chosen from it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRouteResponse {
    response: RouteResponse,
    route_index: usize,
}

impl IndexedRouteResponse {
    pub fn new(response: RouteResponse, route_index: usize) -> Result<Self, NavError> {
        let count = response.routes.len();
        if route_index >= count {
            return Err(NavError::IndexOutOfRange {
                index: route_index,
                count,
            });
        }
        Ok(Self {
            response,
            route_index,
        })
    }

    pub fn route(&self) -> &Route {
        &self.response.routes[self.route_index]
    }

    pub fn route_index(&self) -> usize {
        self.route_index
    }

    pub fn response(&self) -> &RouteResponse {
        &self.response
    }

    pub fn into_response(self) -> RouteResponse {
        self.response
    }
}

/// Sources of every leg followed by the destination of the last one.
pub fn leg_boundaries(legs: &[Leg]) -> Vec<Waypoint> {
    let mut waypoints: Vec<Waypoint> = legs.iter().map(|leg| leg.source.clone()).collect();
    if let Some(last) = legs.last() {
        waypoints.push(last.destination.clone());
    }
    waypoints
}
