//! Mapbox Directions and Map Matching over HTTP.
//!
//! Requests are plain GETs with coordinates in the path as `lon,lat`
//! pairs. Both endpoints answer with a `code` field; anything other than
//! `"Ok"` becomes a [`ServiceError`] carrying that code.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::client::DirectionsClient;
use crate::config::DirectionsConfig;
use crate::error::{NavError, ServiceError};
use crate::instructions::Maneuver;
use crate::reconcile::match_response_from_raw;
use crate::request::{MatchOptions, MatchRequest, RouteOptions, RouteRequest};
use crate::response::{
    Leg, MatchResponse, Matching, RawLeg, RawMatchResponse, Route, RouteResponse, Step, Tracepoint,
};
use crate::trace::{GeoPoint, Waypoint};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct MapboxDirections {
    client: reqwest::Client,
    config: Arc<DirectionsConfig>,
}

impl MapboxDirections {
    pub fn new(config: DirectionsConfig) -> Result<Self, NavError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NavError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &DirectionsConfig {
        &self.config
    }

    async fn fetch(&self, url: &str) -> Result<String, ServiceError> {
        log::debug!("GET {url}");

        let response = self
            .client
            .get(url)
            .query(&[("access_token", self.config.access_token.as_str())])
            .send()
            .await
            .map_err(|e| {
                log::error!("Request failed. URL: {url}\nError: {e}");
                ServiceError::with_code("RequestFailed", e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::with_code("RequestFailed", e.to_string()))?;

        if !status.is_success() {
            log::error!("Directions service answered {status}. URL: {url}\nBody: {text}");
            return Err(error_from_body(&text).unwrap_or_else(|| {
                ServiceError::with_code(
                    status.as_str(),
                    status.canonical_reason().unwrap_or("request rejected"),
                )
            }));
        }
        Ok(text)
    }
}

impl std::fmt::Debug for MapboxDirections {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapboxDirections")
            .field("host", &self.config.host)
            .finish_non_exhaustive()
    }
}

impl DirectionsClient for MapboxDirections {
    async fn calculate_route(&self, request: &RouteRequest) -> Result<RouteResponse, ServiceError> {
        let body = self.fetch(&route_url(&self.config.host, &request.options)).await?;
        parse_route_response(&body, &request.options)
    }

    async fn calculate_match(&self, request: &MatchRequest) -> Result<MatchResponse, ServiceError> {
        let raw = self.calculate_raw_match(request).await?;
        Ok(match_response_from_raw(raw, &request.options))
    }

    async fn calculate_raw_match(&self, request: &MatchRequest) -> Result<RawMatchResponse, ServiceError> {
        let body = self.fetch(&match_url(&self.config.host, &request.options)).await?;
        parse_raw_match(&body)
    }
}

fn coordinate_path(points: impl IntoIterator<Item = GeoPoint>) -> String {
    points
        .into_iter()
        .map(|p| format!("{:.6},{:.6}", p.lon, p.lat))
        .collect::<Vec<_>>()
        .join(";")
}

fn join_indices(indices: &[usize]) -> String {
    indices.iter().map(usize::to_string).collect::<Vec<_>>().join(";")
}

/// Directions endpoint URL, without the access token.
pub fn route_url(host: &str, options: &RouteOptions) -> String {
    let mut url = format!(
        "{host}/directions/v5/{}/{}?alternatives=true&geometries=geojson&overview=full&steps={}",
        options.profile.identifier(),
        coordinate_path(options.waypoints.iter().map(|wp| wp.point)),
        options.includes_steps
    );

    let indices = options.waypoint_indices();
    if indices.len() != options.waypoints.len() {
        url.push_str("&waypoints=");
        url.push_str(&join_indices(&indices));
    }
    url
}

/// Map matching endpoint URL, without the access token.
pub fn match_url(host: &str, options: &MatchOptions) -> String {
    format!(
        "{host}/matching/v5/{}/{}?geometries=geojson&overview=full&steps={}&waypoints={}",
        options.profile.identifier(),
        coordinate_path(options.coordinates.iter().copied()),
        options.includes_steps,
        join_indices(&options.waypoint_indices)
    )
}

#[derive(Debug, Deserialize)]
struct WireStatus {
    code: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<WireRoute>,
    #[serde(default)]
    matchings: Vec<WireRoute>,
    #[serde(default)]
    waypoints: Vec<WireWaypoint>,
    #[serde(default)]
    tracepoints: Vec<Option<WireTracepoint>>,
}

#[derive(Debug, Deserialize)]
struct WireRoute {
    #[serde(default)]
    confidence: f64,
    geometry: WireGeometry,
    distance: f64,
    duration: f64,
    #[serde(default)]
    legs: Vec<WireLeg>,
}

#[derive(Debug, Deserialize)]
struct WireGeometry {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct WireLeg {
    distance: f64,
    duration: f64,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    steps: Vec<WireStep>,
}

#[derive(Debug, Deserialize)]
struct WireStep {
    distance: f64,
    duration: f64,
    maneuver: WireManeuver,
}

#[derive(Debug, Deserialize)]
struct WireManeuver {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    modifier: Option<String>,
    location: [f64; 2],
    #[serde(default)]
    instruction: String,
}

#[derive(Debug, Deserialize)]
struct WireWaypoint {
    #[serde(default)]
    name: Option<String>,
    location: [f64; 2],
}

#[derive(Debug, Deserialize)]
struct WireTracepoint {
    location: [f64; 2],
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    matchings_index: usize,
    #[serde(default)]
    waypoint_index: Option<usize>,
    #[serde(default)]
    alternatives_count: usize,
}

fn point(lon_lat: [f64; 2]) -> GeoPoint {
    GeoPoint::new(lon_lat[1], lon_lat[0])
}

fn non_empty(name: Option<String>) -> Option<String> {
    name.filter(|n| !n.is_empty())
}

fn error_from_body(body: &str) -> Option<ServiceError> {
    let status: WireStatus = serde_json::from_str(body).ok()?;
    let description = status.message.unwrap_or_else(|| status.code.clone());
    Some(ServiceError::with_code(status.code, description))
}

fn decode(body: &str) -> Result<WireResponse, ServiceError> {
    let wire: WireResponse = serde_json::from_str(body).map_err(|e| {
        log::error!("Failed to parse directions response: {e}");
        ServiceError::with_code("InvalidResponse", e.to_string())
    })?;

    if wire.code != "Ok" {
        let description = wire.message.clone().unwrap_or_else(|| wire.code.clone());
        return Err(ServiceError::with_code(wire.code, description));
    }
    Ok(wire)
}

fn convert_steps(steps: Vec<WireStep>) -> Vec<Step> {
    steps
        .into_iter()
        .map(|step| Step {
            maneuver: Maneuver::from_wire(&step.maneuver.kind, step.maneuver.modifier.as_deref()),
            instruction: step.maneuver.instruction,
            location: point(step.maneuver.location),
            distance_m: step.distance,
            duration_s: step.duration,
        })
        .collect()
}

/// Parse a directions response for the request made with `options`.
///
/// Leg boundaries are the snapped waypoints of the response, keeping the
/// names given in the request.
pub fn parse_route_response(body: &str, options: &RouteOptions) -> Result<RouteResponse, ServiceError> {
    let wire = decode(body)?;

    let requested = options.leg_waypoints();
    let waypoints: Vec<Waypoint> = if wire.waypoints.len() == requested.len() {
        wire.waypoints
            .into_iter()
            .zip(requested)
            .map(|(snapped, asked)| Waypoint {
                point: point(snapped.location),
                name: asked.name.or(non_empty(snapped.name)),
                separates_legs: true,
            })
            .collect()
    } else {
        requested
    };

    let routes = wire
        .routes
        .into_iter()
        .map(|route| {
            if route.legs.len() + 1 != waypoints.len() {
                return Err(ServiceError::with_code(
                    "InvalidResponse",
                    format!(
                        "route has {} legs for {} waypoints",
                        route.legs.len(),
                        waypoints.len()
                    ),
                ));
            }
            let legs = route
                .legs
                .into_iter()
                .enumerate()
                .map(|(i, leg)| Leg {
                    source: waypoints[i].clone(),
                    destination: waypoints[i + 1].clone(),
                    distance_m: leg.distance,
                    duration_s: leg.duration,
                    steps: convert_steps(leg.steps),
                })
                .collect();

            Ok(Route {
                geometry: route.geometry.coordinates.into_iter().map(point).collect(),
                distance_m: route.distance,
                duration_s: route.duration,
                legs,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RouteResponse {
        routes,
        waypoints,
        options: options.clone(),
    })
}

/// Parse a map matching response without attaching waypoints to its legs.
pub fn parse_raw_match(body: &str) -> Result<RawMatchResponse, ServiceError> {
    let wire = decode(body)?;

    let matchings = wire
        .matchings
        .into_iter()
        .map(|matching| Matching {
            confidence: matching.confidence,
            geometry: matching.geometry.coordinates.into_iter().map(point).collect(),
            distance_m: matching.distance,
            duration_s: matching.duration,
            legs: matching
                .legs
                .into_iter()
                .map(|leg| RawLeg {
                    distance_m: leg.distance,
                    duration_s: leg.duration,
                    summary: leg.summary,
                    steps: convert_steps(leg.steps),
                })
                .collect(),
        })
        .collect();

    let tracepoints = wire
        .tracepoints
        .into_iter()
        .map(|tp| {
            tp.map(|tp| Tracepoint {
                location: point(tp.location),
                name: non_empty(tp.name),
                matching_index: tp.matchings_index,
                waypoint_index: tp.waypoint_index,
                alternatives_count: tp.alternatives_count,
            })
        })
        .collect();

    Ok(RawMatchResponse {
        matchings,
        tracepoints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{build_direct_request, build_match_request, Profile};
    use crate::trace::CoordinateTrace;

    const ROUTE_OK: &str = r#"{
        "code": "Ok",
        "routes": [{
            "geometry": {"type": "LineString", "coordinates": [[27.0, 47.0], [27.0, 47.005], [27.001, 47.01]]},
            "distance": 1120.5,
            "duration": 96.2,
            "legs": [{
                "distance": 1120.5,
                "duration": 96.2,
                "summary": "Strada Lunga",
                "steps": [
                    {"distance": 556.0, "duration": 48.0,
                     "maneuver": {"type": "depart", "location": [27.0, 47.0], "instruction": "Head north"}},
                    {"distance": 564.5, "duration": 48.2,
                     "maneuver": {"type": "turn", "modifier": "slight right", "location": [27.0, 47.005], "instruction": "Bear right"}},
                    {"distance": 0.0, "duration": 0.0,
                     "maneuver": {"type": "arrive", "location": [27.001, 47.01], "instruction": "You have arrived"}}
                ]
            }]
        }],
        "waypoints": [
            {"name": "Strada Lunga", "location": [27.0, 47.0]},
            {"name": "", "location": [27.001, 47.01]}
        ]
    }"#;

    const MATCH_OK: &str = r#"{
        "code": "Ok",
        "matchings": [{
            "confidence": 0.87,
            "geometry": {"type": "LineString", "coordinates": [[27.5645, 47.1871], [27.5684, 47.1792]]},
            "distance": 1004.0,
            "duration": 88.0,
            "legs": [{"distance": 1004.0, "duration": 88.0, "summary": "", "steps": []}]
        }],
        "tracepoints": [
            {"location": [27.5645, 47.1871], "name": "Bulevardul Carol I", "matchings_index": 0, "waypoint_index": 0, "alternatives_count": 0},
            null,
            {"location": [27.5684, 47.1792], "name": "", "matchings_index": 0, "waypoint_index": 1, "alternatives_count": 2}
        ]
    }"#;

    fn direct_options() -> RouteOptions {
        build_direct_request(GeoPoint::new(47.0, 27.0), GeoPoint::new(47.01, 27.001), Profile::Automobile).options
    }

    #[test]
    fn route_url_lists_lon_lat_pairs() {
        let url = route_url("https://api.mapbox.com", &direct_options());
        assert_eq!(
            url,
            "https://api.mapbox.com/directions/v5/mapbox/driving/27.000000,47.000000;27.001000,47.010000\
             ?alternatives=true&geometries=geojson&overview=full&steps=true"
        );
    }

    #[test]
    fn match_url_marks_endpoints_as_waypoints() {
        let options = build_match_request(&CoordinateTrace::sample(), Profile::Cycling)
            .unwrap()
            .options;
        let url = match_url("http://localhost:5000", &options);
        assert!(url.starts_with("http://localhost:5000/matching/v5/mapbox/cycling/27.564500,47.187144;"));
        assert!(url.ends_with("&waypoints=0;5"));
        assert_eq!(url.matches(';').count(), 6);
    }

    #[test]
    fn parses_route_response() {
        let response = parse_route_response(ROUTE_OK, &direct_options()).unwrap();
        assert_eq!(response.routes.len(), 1);

        let route = &response.routes[0];
        assert_eq!(route.geometry[2], GeoPoint::new(47.01, 27.001));
        assert_eq!(route.legs.len(), 1);
        assert_eq!(route.legs[0].source.name.as_deref(), Some("Origin"));
        assert_eq!(route.destination().and_then(|wp| wp.name.as_deref()), Some("Destination"));

        let maneuvers: Vec<_> = route.legs[0].steps.iter().map(|s| s.maneuver).collect();
        assert_eq!(maneuvers, vec![Maneuver::Depart, Maneuver::SlightRight, Maneuver::Arrive]);
        assert_eq!(route.legs[0].steps[1].instruction, "Bear right");
        assert_eq!(response.options, direct_options());
    }

    #[test]
    fn error_code_becomes_service_error() {
        let body = r#"{"code": "NoRoute", "message": "No route found", "routes": []}"#;
        let err = parse_route_response(body, &direct_options()).unwrap_err();
        assert_eq!(err, ServiceError::with_code("NoRoute", "No route found"));

        let err = parse_raw_match(r#"{"code": "NoMatch"}"#).unwrap_err();
        assert_eq!(err.code.as_deref(), Some("NoMatch"));
    }

    #[test]
    fn garbage_is_invalid_response() {
        let err = parse_raw_match("<html>busy</html>").unwrap_err();
        assert_eq!(err.code.as_deref(), Some("InvalidResponse"));
    }

    #[test]
    fn parses_raw_match_with_dropped_tracepoint() {
        let raw = parse_raw_match(MATCH_OK).unwrap();
        assert_eq!(raw.matchings.len(), 1);
        assert_eq!(raw.matchings[0].confidence, 0.87);
        assert!(raw.matchings[0].legs[0].steps.is_empty());

        assert_eq!(raw.tracepoints.len(), 3);
        assert!(raw.tracepoints[1].is_none());
        let first = raw.tracepoints[0].as_ref().unwrap();
        assert_eq!(first.name.as_deref(), Some("Bulevardul Carol I"));
        assert_eq!(first.location, GeoPoint::new(47.1871, 27.5645));
        let last = raw.tracepoints[2].as_ref().unwrap();
        assert_eq!(last.name, None);
        assert_eq!(last.waypoint_index, Some(1));
        assert_eq!(last.alternatives_count, 2);
    }

    #[test]
    fn error_body_of_rejected_request() {
        let err = error_from_body(r#"{"code": "InvalidInput", "message": "Too many coordinates"}"#).unwrap();
        assert_eq!(err, ServiceError::with_code("InvalidInput", "Too many coordinates"));
        assert!(error_from_body("Bad gateway").is_none());
    }
}
