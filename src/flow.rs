//! Trigger entry points.
//!
//! Each trigger runs one independent acquisition flow over a trace:
//! build the request, call the directions client, reconcile the answer
//! and create a session. Any failure aborts the flow before a session
//! exists and is logged here before being returned.

use std::fmt;
use std::str::FromStr;

use crate::client::DirectionsClient;
use crate::config::NavigationConfig;
use crate::error::NavError;
use crate::observer::NavigationObserver;
use crate::reconcile::{reconcile, Acquired};
use crate::request::{
    build_direct_request_from_trace, build_match_request, build_reroute_request, Profile, RouteOptions,
};
use crate::response::{IndexedRouteResponse, RouteResponse};
use crate::session::{NavigationSession, SessionFactory, SessionState};
use crate::simulation::SimulationMode;
use crate::trace::CoordinateTrace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Direct route between the first and last trace point.
    Route,
    /// Route-shaped match of the whole trace.
    MatchedRoute,
    /// Route-shaped match, with the route re-applied after the session started.
    MatchedRouteWithOverride,
    /// Raw match converted locally, with the route re-applied after the session started.
    RawMatchedRoute,
}

impl Trigger {
    pub const ALL: [Trigger; 4] = [
        Trigger::Route,
        Trigger::MatchedRoute,
        Trigger::MatchedRouteWithOverride,
        Trigger::RawMatchedRoute,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Trigger::Route => "route",
            Trigger::MatchedRoute => "matched-route",
            Trigger::MatchedRouteWithOverride => "matched-route-override",
            Trigger::RawMatchedRoute => "raw-matched-route",
        }
    }

    /// Whether the flow replaces the session's route right after creating it.
    pub fn overrides_route(self) -> bool {
        matches!(self, Trigger::MatchedRouteWithOverride | Trigger::RawMatchedRoute)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Trigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Trigger::ALL
            .into_iter()
            .find(|trigger| trigger.name() == s)
            .ok_or_else(|| {
                let names: Vec<_> = Trigger::ALL.iter().map(|t| t.name()).collect();
                format!("unknown trigger {s:?}, expected one of {}", names.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSettings {
    pub profile: Profile,
    pub simulation: SimulationMode,
    pub route_index: usize,
    pub navigation: NavigationConfig,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            profile: Profile::Automobile,
            simulation: SimulationMode::OnPoorGps,
            route_index: 0,
            navigation: NavigationConfig::default(),
        }
    }
}

/// Request and reconcile a route for a trigger.
///
/// Returns the navigable response and the route options a session over
/// it must use.
pub async fn acquire<C: DirectionsClient>(
    client: &C,
    trace: &CoordinateTrace,
    trigger: Trigger,
    profile: Profile,
) -> Result<(RouteResponse, RouteOptions), NavError> {
    match trigger {
        Trigger::Route => {
            let request = build_direct_request_from_trace(trace, profile)?;
            let response = client.calculate_route(&request).await?;
            Ok((reconcile(Acquired::Route(response))?, request.options))
        }
        Trigger::MatchedRoute | Trigger::MatchedRouteWithOverride => {
            let request = build_match_request(trace, profile)?;
            let response = client.calculate_match(&request).await?;
            let options = RouteOptions::from(&request.options);
            Ok((reconcile(Acquired::Match(response))?, options))
        }
        Trigger::RawMatchedRoute => {
            let request = build_match_request(trace, profile)?;
            let response = client.calculate_raw_match(&request).await?;
            let options = RouteOptions::from(&request.options);
            let acquired = Acquired::RawMatch {
                response,
                options: request.options,
            };
            Ok((reconcile(acquired)?, options))
        }
    }
}

/// Run one trigger flow end to end and hand back the started session.
pub async fn start_navigation<C: DirectionsClient>(
    client: &C,
    trace: &CoordinateTrace,
    trigger: Trigger,
    settings: &FlowSettings,
    observer: Box<dyn NavigationObserver + Send>,
) -> Result<NavigationSession, NavError> {
    let result = present(client, trace, trigger, settings, observer).await;
    if let Err(err) = &result {
        log::error!("{trigger} flow aborted: {err}");
    }
    result
}

async fn present<C: DirectionsClient>(
    client: &C,
    trace: &CoordinateTrace,
    trigger: Trigger,
    settings: &FlowSettings,
    observer: Box<dyn NavigationObserver + Send>,
) -> Result<NavigationSession, NavError> {
    log::info!("{trigger}: requesting with {} trace points", trace.len());
    let (response, options) = acquire(client, trace, trigger, settings.profile).await?;

    let replacement = if trigger.overrides_route() {
        Some(IndexedRouteResponse::new(response.clone(), settings.route_index)?)
    } else {
        None
    };

    let session = SessionFactory::new(settings.navigation).create(
        response,
        settings.route_index,
        options.clone(),
        settings.simulation,
        observer,
    )?;

    if let Some(route) = replacement {
        // outcome is logged by the session; nobody waits for it here
        drop(session.update_route(route, options));
    }

    Ok(session)
}

/// Fetch a replacement route for a rerouting session and apply it.
///
/// The new route starts at the last known location, or at the current
/// leg's origin before any location arrived, and visits the remaining
/// leg destinations. Sessions that are not rerouting are left alone.
pub async fn reroute<C: DirectionsClient>(
    client: &C,
    session: &mut NavigationSession,
) -> Result<(), NavError> {
    if session.state() != SessionState::Rerouting {
        log::debug!("Reroute skipped, session is {:?}", session.state());
        return Ok(());
    }

    let router = session.router();
    let from = match router.last_location() {
        Some(location) => location.point,
        None => router
            .route()
            .and_then(|r| r.route().legs.get(router.leg_index()))
            .map(|leg| leg.source.point)
            .ok_or(NavError::EmptyRoute)?,
    };
    let request = build_reroute_request(from, &router.remaining_waypoints(), router.options())?;

    let replacement = async {
        let response = client.calculate_route(&request).await?;
        IndexedRouteResponse::new(reconcile(Acquired::Route(response))?, 0)
    }
    .await;

    match replacement {
        Ok(route) => session.apply_reroute(route),
        Err(err) => {
            log::error!("Reroute failed: {err}");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::fixtures::{direct_response, raw_match, straight_response, Event, FakeDirections, RecordingObserver};
    use crate::progress::Location;
    use crate::trace::GeoPoint;

    fn observer() -> Box<RecordingObserver> {
        Box::new(RecordingObserver::new(false, true))
    }

    #[test]
    fn trigger_names_parse_back() {
        for trigger in Trigger::ALL {
            assert_eq!(trigger.to_string().parse::<Trigger>(), Ok(trigger));
        }
        assert!("teleport".parse::<Trigger>().is_err());
        assert!(!Trigger::MatchedRoute.overrides_route());
        assert!(Trigger::RawMatchedRoute.overrides_route());
    }

    #[tokio::test]
    async fn direct_route_flow_starts_session() {
        let client = FakeDirections::new(Ok(direct_response(1)), Ok(raw_match(1)));
        let session = start_navigation(
            &client,
            &CoordinateTrace::sample(),
            Trigger::Route,
            &FlowSettings::default(),
            observer(),
        )
        .await
        .unwrap();

        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.router().route().map(|r| r.route_index()), Some(0));
        assert_eq!(session.router().route().map(|r| r.route().legs.len()), Some(1));
        assert_eq!(session.simulation(), SimulationMode::OnPoorGps);
        assert_eq!(client.calls(), vec!["route"]);
    }

    #[tokio::test]
    async fn raw_match_without_routes_creates_no_session() {
        let client = FakeDirections::new(Ok(direct_response(1)), Ok(raw_match(0)));
        let result = start_navigation(
            &client,
            &CoordinateTrace::sample(),
            Trigger::RawMatchedRoute,
            &FlowSettings::default(),
            observer(),
        )
        .await;

        assert!(matches!(result, Err(NavError::MatchConversion(_))));
        assert_eq!(client.calls(), vec!["raw_match"]);
    }

    #[tokio::test]
    async fn shaped_match_without_routes_is_empty_route() {
        for trigger in [Trigger::MatchedRoute, Trigger::MatchedRouteWithOverride] {
            let client = FakeDirections::new(Ok(direct_response(1)), Ok(raw_match(0)));
            let result = start_navigation(
                &client,
                &CoordinateTrace::sample(),
                trigger,
                &FlowSettings::default(),
                observer(),
            )
            .await;

            assert_eq!(result.unwrap_err(), NavError::EmptyRoute, "{trigger}");
            assert_eq!(client.calls(), vec!["match"]);
        }
    }

    #[tokio::test]
    async fn every_match_trigger_starts_a_session() {
        for trigger in [Trigger::MatchedRoute, Trigger::MatchedRouteWithOverride, Trigger::RawMatchedRoute] {
            let client = FakeDirections::new(Ok(direct_response(1)), Ok(raw_match(1)));
            let mut session = start_navigation(
                &client,
                &CoordinateTrace::sample(),
                trigger,
                &FlowSettings::default(),
                observer(),
            )
            .await
            .unwrap();

            assert_eq!(session.state(), SessionState::Active, "{trigger}");
            assert_eq!(session.router().options().waypoint_indices(), vec![0, 5]);

            session.update_location(Location::new(CoordinateTrace::sample().points[1], 5.0, 0.0));
            assert_eq!(session.state(), SessionState::Active, "{trigger}");
        }
    }

    #[tokio::test]
    async fn service_errors_abort_the_flow() {
        let error = ServiceError::with_code("InvalidInput", "bad coordinates");
        let client = FakeDirections::new(Err(error.clone()), Err(error.clone()));

        for trigger in Trigger::ALL {
            let result = start_navigation(
                &client,
                &CoordinateTrace::sample(),
                trigger,
                &FlowSettings::default(),
                observer(),
            )
            .await;
            assert_eq!(result.unwrap_err(), NavError::Service(error.clone()));
        }
    }

    #[tokio::test]
    async fn short_trace_never_reaches_the_service() {
        let client = FakeDirections::new(Ok(direct_response(1)), Ok(raw_match(1)));
        let trace = CoordinateTrace::new(vec![GeoPoint::new(47.0, 27.0)]);

        for trigger in Trigger::ALL {
            let result = start_navigation(&client, &trace, trigger, &FlowSettings::default(), observer()).await;
            assert_eq!(result.unwrap_err(), NavError::InvalidTrace { len: 1 });
        }
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn route_index_out_of_range() {
        let client = FakeDirections::new(Ok(direct_response(1)), Ok(raw_match(1)));
        let settings = FlowSettings {
            route_index: 3,
            ..FlowSettings::default()
        };

        for trigger in Trigger::ALL {
            let result = start_navigation(&client, &CoordinateTrace::sample(), trigger, &settings, observer()).await;
            assert_eq!(result.unwrap_err(), NavError::IndexOutOfRange { index: 3, count: 1 });
        }
    }

    #[tokio::test]
    async fn reroute_replaces_route() {
        let client = FakeDirections::new(Ok(straight_response()), Ok(raw_match(1)));
        let recorder = RecordingObserver::new(true, true);
        let mut session = start_navigation(
            &client,
            &CoordinateTrace::new(vec![GeoPoint::new(47.0, 27.0), GeoPoint::new(47.01, 27.0)]),
            Trigger::Route,
            &FlowSettings {
                simulation: SimulationMode::Never,
                ..FlowSettings::default()
            },
            Box::new(recorder.clone()),
        )
        .await
        .unwrap();

        // not rerouting yet: nothing happens
        reroute(&client, &mut session).await.unwrap();
        assert_eq!(client.calls(), vec!["route"]);

        session.update_location(Location::new(GeoPoint::new(47.002, 27.01), 5.0, 0.0));
        assert_eq!(session.state(), SessionState::Rerouting);

        reroute(&client, &mut session).await.unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(client.calls(), vec!["route", "route"]);
        assert_eq!(recorder.events().last(), Some(&Event::Rerouted));
    }

    #[tokio::test]
    async fn failed_reroute_keeps_rerouting() {
        let client = FakeDirections::new(Ok(straight_response()), Ok(raw_match(1)));
        let mut session = start_navigation(
            &client,
            &CoordinateTrace::new(vec![GeoPoint::new(47.0, 27.0), GeoPoint::new(47.01, 27.0)]),
            Trigger::Route,
            &FlowSettings::default(),
            Box::new(RecordingObserver::new(true, true)),
        )
        .await
        .unwrap();
        session.reroute_now();

        let failing = FakeDirections::new(Err(ServiceError::new("offline")), Ok(raw_match(1)));
        let result = reroute(&failing, &mut session).await;
        assert!(matches!(result, Err(NavError::Service(_))));
        assert_eq!(session.state(), SessionState::Rerouting);
    }
}
