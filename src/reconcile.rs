//! Response reconciliation.
//!
//! Whatever the directions client returned, a direct route, a
//! route-shaped match or a raw match, comes out of [`reconcile`] as a
//! single [`RouteResponse`] the session factory can consume. Raw
//! matchings are converted here: boundary waypoints are taken from the
//! tracepoints at the options' waypoint indices, each matching becomes a
//! candidate route, and its geometry is split into one piece per leg.

use crate::error::NavError;
use crate::instructions::generate_steps;
use crate::nav::{line_length, project_on_line};
use crate::request::{MatchOptions, RouteOptions};
use crate::response::{
    leg_boundaries, Leg, MatchResponse, Matching, RawMatchResponse, Route, RouteResponse, Tracepoint,
};
use crate::trace::{GeoPoint, Waypoint};

/// A directions client result, tagged by the operation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Acquired {
    Route(RouteResponse),
    Match(MatchResponse),
    /// A raw match still needs the options of the request that produced it.
    RawMatch {
        response: RawMatchResponse,
        options: MatchOptions,
    },
}

impl From<RouteResponse> for Acquired {
    fn from(response: RouteResponse) -> Self {
        Acquired::Route(response)
    }
}

impl From<MatchResponse> for Acquired {
    fn from(response: MatchResponse) -> Self {
        Acquired::Match(response)
    }
}

/// Normalize any acquired response into a navigable route response.
///
/// Direct and route-shaped responses pass through; raw matches are
/// converted. On every path the result must hold a route with a leg.
pub fn reconcile(acquired: Acquired) -> Result<RouteResponse, NavError> {
    let response = match acquired {
        Acquired::Route(response) => response,
        Acquired::Match(response) => {
            log::debug!(
                "Using route-shaped match response with {} candidate(s)",
                response.routes.len()
            );
            response.into_route_response()
        }
        Acquired::RawMatch { response, options } => {
            log::debug!(
                "Converting raw match response with {} matching(s)",
                response.matchings.len()
            );
            route_response_from_match(response, &options)?
        }
    };

    ensure_navigable(&response)?;
    Ok(response)
}

/// The first route must exist and have at least one leg.
pub fn ensure_navigable(response: &RouteResponse) -> Result<(), NavError> {
    match response.routes.first() {
        Some(route) if !route.legs.is_empty() => Ok(()),
        _ => Err(NavError::EmptyRoute),
    }
}

/// Synthesize a route response from a raw match.
pub fn route_response_from_match(
    raw: RawMatchResponse,
    options: &MatchOptions,
) -> Result<RouteResponse, NavError> {
    let routes = routes_from_matchings(&raw.matchings, &raw.tracepoints, options)?;
    let waypoints = leg_boundaries(&routes[0].legs);

    Ok(RouteResponse {
        routes,
        waypoints,
        options: RouteOptions::from(options),
    })
}

/// Shape a raw match into routes while keeping its matching metadata.
///
/// Matchings that cannot be shaped are logged and left out, so the
/// result may hold no routes at all; [`reconcile`] rejects that as an
/// empty route.
pub fn match_response_from_raw(raw: RawMatchResponse, options: &MatchOptions) -> MatchResponse {
    let mut routes = Vec::with_capacity(raw.matchings.len());
    let mut confidences = Vec::with_capacity(raw.matchings.len());

    match options.validate() {
        Ok(()) => {
            let boundaries = boundary_waypoints(&raw.tracepoints, options);
            for (i, matching) in raw.matchings.iter().enumerate() {
                match route_from_matching(i, matching, &boundaries, options) {
                    Ok(route) => {
                        routes.push(route);
                        confidences.push(matching.confidence);
                    }
                    Err(err) => log::warn!("Matching {i} left out: {err}"),
                }
            }
        }
        Err(err) => log::error!("Match result cannot be shaped: {err}"),
    }

    MatchResponse {
        routes,
        confidences,
        tracepoints: raw.tracepoints,
        options: options.clone(),
    }
}

fn routes_from_matchings(
    matchings: &[Matching],
    tracepoints: &[Option<Tracepoint>],
    options: &MatchOptions,
) -> Result<Vec<Route>, NavError> {
    if matchings.is_empty() {
        return Err(NavError::MatchConversion(
            "match result has no candidate routes".to_string(),
        ));
    }
    options.validate()?;

    let boundaries = boundary_waypoints(tracepoints, options);
    matchings
        .iter()
        .enumerate()
        .map(|(i, matching)| route_from_matching(i, matching, &boundaries, options))
        .collect()
}

/// Leg boundaries at the snapped location when the service matched the
/// input point, at the input coordinate otherwise.
fn boundary_waypoints(tracepoints: &[Option<Tracepoint>], options: &MatchOptions) -> Vec<Waypoint> {
    options
        .waypoint_indices
        .iter()
        .map(|&idx| match tracepoints.get(idx).and_then(Option::as_ref) {
            Some(tp) => Waypoint {
                point: tp.location,
                name: tp.name.clone().filter(|name| !name.is_empty()),
                separates_legs: true,
            },
            None => Waypoint::new(options.coordinates[idx]),
        })
        .collect()
}

fn route_from_matching(
    index: usize,
    matching: &Matching,
    boundaries: &[Waypoint],
    options: &MatchOptions,
) -> Result<Route, NavError> {
    if matching.legs.is_empty() {
        return Err(NavError::MatchConversion(format!(
            "matching {index} has no legs"
        )));
    }
    let expected = boundaries.len() - 1;
    if matching.legs.len() != expected {
        return Err(NavError::MatchConversion(format!(
            "matching {index} has {} legs but the options mark {expected}",
            matching.legs.len()
        )));
    }

    let pieces = split_geometry(&matching.geometry, boundaries);
    let legs = matching
        .legs
        .iter()
        .zip(pieces.iter())
        .enumerate()
        .map(|(i, (raw, piece))| {
            let steps = if !raw.steps.is_empty() {
                raw.steps.clone()
            } else if options.includes_steps {
                generate_steps(piece, raw.duration_s, options.measurement_system)
            } else {
                Vec::new()
            };

            let distance_m = if raw.distance_m > 0.0 {
                raw.distance_m
            } else {
                line_length(piece)
            };

            Leg {
                source: boundaries[i].clone(),
                destination: boundaries[i + 1].clone(),
                distance_m,
                duration_s: raw.duration_s,
                steps,
            }
        })
        .collect();

    let distance_m = if matching.distance_m > 0.0 {
        matching.distance_m
    } else {
        line_length(&matching.geometry)
    };

    Ok(Route {
        geometry: matching.geometry.clone(),
        distance_m,
        duration_s: matching.duration_s,
        legs,
    })
}

/// Cut a geometry at the projections of the interior boundaries,
/// returning one piece per leg. Consecutive pieces share their cut point.
fn split_geometry(geometry: &[GeoPoint], boundaries: &[Waypoint]) -> Vec<Vec<GeoPoint>> {
    let interior = boundaries.len().saturating_sub(2);
    let mut pieces = Vec::with_capacity(interior + 1);
    let mut rest = geometry.to_vec();

    for wp in boundaries.iter().skip(1).take(interior) {
        match project_on_line(&wp.point, &rest) {
            Some(cut) => {
                let mut head = rest[..=cut.segment_index].to_vec();
                head.push(cut.point);
                let mut tail = vec![cut.point];
                tail.extend_from_slice(&rest[cut.segment_index + 1..]);
                pieces.push(head);
                rest = tail;
            }
            None => pieces.push(rest.clone()),
        }
    }

    pieces.push(rest);
    pieces
}
