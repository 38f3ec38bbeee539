//! Responses, a fake directions client and a recording observer shared by tests.

use std::sync::{Arc, Mutex};

use crate::client::DirectionsClient;
use crate::error::ServiceError;
use crate::instructions::Maneuver;
use crate::nav::line_length;
use crate::observer::NavigationObserver;
use crate::progress::{Location, RouteProgress};
use crate::reconcile::match_response_from_raw;
use crate::request::{build_direct_request, build_match_request, MatchOptions, MatchRequest, Profile, RouteRequest};
use crate::response::{
    Leg, MatchResponse, Matching, RawLeg, RawMatchResponse, Route, RouteResponse, Step, Tracepoint,
};
use crate::session::Router;
use crate::trace::{CoordinateTrace, GeoPoint, Waypoint};

pub(crate) fn sample_points() -> Vec<GeoPoint> {
    CoordinateTrace::sample().points
}

pub(crate) fn match_options() -> MatchOptions {
    build_match_request(&CoordinateTrace::sample(), Profile::Automobile)
        .unwrap()
        .options
}

fn route_along(geometry: Vec<GeoPoint>, duration_s: f64) -> Route {
    let distance = line_length(&geometry);
    let origin = geometry[0];
    let destination = *geometry.last().unwrap();
    let mid = geometry[geometry.len() / 2];

    Route {
        distance_m: distance,
        duration_s,
        legs: vec![Leg {
            source: Waypoint::named(origin, "Origin"),
            destination: Waypoint::named(destination, "Destination"),
            distance_m: distance,
            duration_s,
            steps: vec![
                Step {
                    maneuver: Maneuver::Depart,
                    instruction: "Head out".into(),
                    location: origin,
                    distance_m: distance / 2.0,
                    duration_s: duration_s / 2.0,
                },
                Step {
                    maneuver: Maneuver::Straight,
                    instruction: "Continue straight".into(),
                    location: mid,
                    distance_m: distance / 2.0,
                    duration_s: duration_s / 2.0,
                },
                Step {
                    maneuver: Maneuver::Arrive,
                    instruction: "Arrive".into(),
                    location: destination,
                    distance_m: 0.0,
                    duration_s: 0.0,
                },
            ],
        }],
        geometry,
    }
}

/// A north-bound line of about 1.1 km.
pub(crate) fn straight_route() -> Route {
    route_along(
        vec![
            GeoPoint::new(47.0, 27.0),
            GeoPoint::new(47.005, 27.0),
            GeoPoint::new(47.01, 27.0),
        ],
        100.0,
    )
}

pub(crate) fn straight_response() -> RouteResponse {
    let route = straight_route();
    let options = build_direct_request(route.geometry[0], route.geometry[2], Profile::Automobile).options;
    RouteResponse {
        waypoints: crate::response::leg_boundaries(&route.legs),
        routes: vec![route],
        options,
    }
}

/// `count` identical routes along the sample trace.
pub(crate) fn direct_response(count: usize) -> RouteResponse {
    let points = sample_points();
    let route = route_along(points.clone(), 120.0);
    RouteResponse {
        waypoints: crate::response::leg_boundaries(&route.legs),
        routes: vec![route; count],
        options: build_direct_request(points[0], points[5], Profile::Automobile).options,
    }
}

/// A raw match of the sample trace with `count` matchings of one step-less leg.
pub(crate) fn raw_match(count: usize) -> RawMatchResponse {
    let points = sample_points();
    let distance = line_length(&points);
    let last = points.len() - 1;

    let tracepoints = points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            Some(Tracepoint {
                location: *point,
                name: Some(format!("Strada {i}")),
                matching_index: 0,
                waypoint_index: match i {
                    0 => Some(0),
                    i if i == last => Some(1),
                    _ => None,
                },
                alternatives_count: 0,
            })
        })
        .collect();

    let matching = Matching {
        confidence: 0.9,
        geometry: points,
        distance_m: distance,
        duration_s: 95.0,
        legs: vec![RawLeg {
            distance_m: distance,
            duration_s: 95.0,
            summary: "Strada 0, Strada 5".into(),
            steps: vec![],
        }],
    };

    RawMatchResponse {
        matchings: vec![matching; count],
        tracepoints,
    }
}

/// Answers every call with canned results and counts calls per operation.
pub(crate) struct FakeDirections {
    pub route: Result<RouteResponse, ServiceError>,
    pub raw: Result<RawMatchResponse, ServiceError>,
    pub calls: Mutex<Vec<&'static str>>,
}

impl FakeDirections {
    pub fn new(route: Result<RouteResponse, ServiceError>, raw: Result<RawMatchResponse, ServiceError>) -> Self {
        Self {
            route,
            raw,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

impl DirectionsClient for FakeDirections {
    async fn calculate_route(&self, _request: &RouteRequest) -> Result<RouteResponse, ServiceError> {
        self.calls.lock().unwrap().push("route");
        self.route.clone()
    }

    async fn calculate_match(&self, request: &MatchRequest) -> Result<MatchResponse, ServiceError> {
        self.calls.lock().unwrap().push("match");
        let raw = self.raw.clone()?;
        Ok(match_response_from_raw(raw, &request.options))
    }

    async fn calculate_raw_match(&self, _request: &MatchRequest) -> Result<RawMatchResponse, ServiceError> {
        self.calls.lock().unwrap().push("raw_match");
        self.raw.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Progress(f64),
    ShouldReroute,
    WillReroute(bool),
    Rerouted,
    Arrive(Option<String>),
    Dismiss(bool),
}

/// Records every callback; clones share the same log.
#[derive(Debug, Clone)]
pub(crate) struct RecordingObserver {
    events: Arc<Mutex<Vec<Event>>>,
    allow_reroute: bool,
    accept_arrival: bool,
}

impl RecordingObserver {
    pub fn new(allow_reroute: bool, accept_arrival: bool) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            allow_reroute,
            accept_arrival,
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress_remaining(&self) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Progress(remaining) => Some(remaining),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl NavigationObserver for RecordingObserver {
    fn on_progress(&mut self, _router: &Router, progress: &RouteProgress, _location: &Location, _raw: &Location) {
        self.push(Event::Progress(progress.distance_remaining_m));
    }

    fn should_reroute(&mut self, _router: &Router, _from: &Location) -> bool {
        self.push(Event::ShouldReroute);
        self.allow_reroute
    }

    fn on_will_reroute(&mut self, _router: &Router, from: Option<&Location>) {
        self.push(Event::WillReroute(from.is_some()));
    }

    fn on_rerouted(&mut self, _router: &Router, _route: &Route) {
        self.push(Event::Rerouted);
    }

    fn on_arrive(&mut self, _router: &Router, waypoint: &Waypoint) -> bool {
        self.push(Event::Arrive(waypoint.name.clone()));
        self.accept_arrival
    }

    fn on_dismiss(&mut self, _router: &Router, cancelled: bool) {
        self.push(Event::Dismiss(cancelled));
    }
}
