//! Navigation sessions.
//!
//! A session is created from a reconciled route response bound to one of
//! its routes. It consumes location updates and reports progress,
//! reroute and arrival events to its observer:
//!
//! ```text
//! Idle -> Active -> { Rerouting -> Active } -> Arrived | Cancelled
//! ```
//!
//! The route can also be replaced after construction through a
//! fire-and-forget override. Overrides are queued and installed at the
//! start of the next location update; their outcome is logged and, if
//! anyone still listens, reported on a oneshot channel.

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::config::NavigationConfig;
use crate::error::NavError;
use crate::observer::NavigationObserver;
use crate::progress::{Location, RouteProgress};
use crate::request::RouteOptions;
use crate::response::{IndexedRouteResponse, Route, RouteResponse};
use crate::simulation::{LocationSimulator, SimulationMode};
use crate::trace::Waypoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Active,
    Rerouting,
    Arrived,
    Cancelled,
}

impl SessionState {
    /// Whether location updates still produce progress.
    pub fn is_navigating(self) -> bool {
        matches!(self, SessionState::Active | SessionState::Rerouting)
    }
}

/// The active route and progress, handed to every observer callback.
#[derive(Debug)]
pub struct Router {
    state: SessionState,
    route: Option<IndexedRouteResponse>,
    options: RouteOptions,
    leg_index: usize,
    progress: Option<RouteProgress>,
    last_location: Option<Location>,
    arrival_reported: bool,
}

impl Router {
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// None once the session was dismissed.
    pub fn route(&self) -> Option<&IndexedRouteResponse> {
        self.route.as_ref()
    }

    pub fn options(&self) -> &RouteOptions {
        &self.options
    }

    pub fn leg_index(&self) -> usize {
        self.leg_index
    }

    pub fn progress(&self) -> Option<&RouteProgress> {
        self.progress.as_ref()
    }

    pub fn last_location(&self) -> Option<&Location> {
        self.last_location.as_ref()
    }

    /// Destinations of the current and all following legs.
    pub fn remaining_waypoints(&self) -> Vec<Waypoint> {
        self.route
            .as_ref()
            .map(|indexed| {
                indexed
                    .route()
                    .legs
                    .iter()
                    .skip(self.leg_index)
                    .map(|leg| leg.destination.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn install(&mut self, route: IndexedRouteResponse, options: RouteOptions) {
        self.route = Some(route);
        self.options = options;
        self.leg_index = 0;
        self.progress = None;
        self.arrival_reported = false;
    }

    fn release(&mut self) {
        self.route = None;
        self.progress = None;
    }
}

struct RouteOverride {
    route: IndexedRouteResponse,
    options: RouteOptions,
    completion: oneshot::Sender<Result<(), NavError>>,
}

/// Submits route overrides to a session from anywhere.
#[derive(Debug, Clone)]
pub struct RouteOverrideHandle {
    tx: mpsc::UnboundedSender<RouteOverride>,
}

impl std::fmt::Debug for RouteOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteOverride")
            .field("route_index", &self.route.route_index())
            .finish()
    }
}

impl RouteOverrideHandle {
    /// Queue a replacement route. Awaiting the receiver is optional;
    /// failures are logged either way.
    pub fn update_route(
        &self,
        route: IndexedRouteResponse,
        options: RouteOptions,
    ) -> oneshot::Receiver<Result<(), NavError>> {
        let (completion, rx) = oneshot::channel();
        let request = RouteOverride {
            route,
            options,
            completion,
        };
        if let Err(mpsc::error::SendError(rejected)) = self.tx.send(request) {
            log::error!("Route override dropped: session no longer exists");
            let _ = rejected.completion.send(Err(NavError::SessionEnded));
        }
        rx
    }
}

/// Builds sessions with shared thresholds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionFactory {
    pub config: NavigationConfig,
}

impl SessionFactory {
    pub fn new(config: NavigationConfig) -> Self {
        Self { config }
    }

    /// Bind a new session to `response.routes[route_index]`.
    ///
    /// Fails without constructing anything if the index is out of range,
    /// the route cannot be navigated, or the options disagree with the
    /// route's legs.
    pub fn create(
        &self,
        response: RouteResponse,
        route_index: usize,
        options: RouteOptions,
        simulation: SimulationMode,
        observer: Box<dyn NavigationObserver + Send>,
    ) -> Result<NavigationSession, NavError> {
        let indexed = IndexedRouteResponse::new(response, route_index)?;
        check_compatible(indexed.route(), &options)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut router = Router {
            state: SessionState::Idle,
            route: None,
            options: options.clone(),
            leg_index: 0,
            progress: None,
            last_location: None,
            arrival_reported: false,
        };
        router.install(indexed, options);
        router.state = SessionState::Active;

        log::info!(
            "Navigation session started on route {} ({:.0} m, {} leg(s), simulation {:?})",
            route_index,
            router.route().map_or(0.0, |r| r.route().distance_m),
            router.route().map_or(0, |r| r.route().legs.len()),
            simulation
        );

        Ok(NavigationSession {
            router,
            observer,
            simulator: LocationSimulator::new(simulation, &self.config),
            config: self.config,
            overrides_tx: tx,
            overrides_rx: rx,
        })
    }
}

/// Create a session with default thresholds.
pub fn create_session(
    response: RouteResponse,
    route_index: usize,
    options: RouteOptions,
    simulation: SimulationMode,
    observer: Box<dyn NavigationObserver + Send>,
) -> Result<NavigationSession, NavError> {
    SessionFactory::default().create(response, route_index, options, simulation, observer)
}

/// A route can be navigated with some options only if it has legs and
/// geometry, and the options mark exactly as many legs as it has.
fn check_compatible(route: &Route, options: &RouteOptions) -> Result<(), NavError> {
    if route.legs.is_empty() || route.geometry.len() < 2 {
        return Err(NavError::EmptyRoute);
    }
    options.validate()?;
    if options.leg_count() != route.legs.len() {
        return Err(NavError::MatchConversion(format!(
            "route has {} legs but the options mark {}",
            route.legs.len(),
            options.leg_count()
        )));
    }
    Ok(())
}

pub struct NavigationSession {
    router: Router,
    observer: Box<dyn NavigationObserver + Send>,
    simulator: LocationSimulator,
    config: NavigationConfig,
    overrides_tx: mpsc::UnboundedSender<RouteOverride>,
    overrides_rx: mpsc::UnboundedReceiver<RouteOverride>,
}

impl NavigationSession {
    pub fn state(&self) -> SessionState {
        self.router.state
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn simulation(&self) -> SimulationMode {
        self.simulator.mode()
    }

    pub fn override_handle(&self) -> RouteOverrideHandle {
        RouteOverrideHandle {
            tx: self.overrides_tx.clone(),
        }
    }

    /// Replace the active route after construction. See [`RouteOverrideHandle::update_route`].
    pub fn update_route(
        &self,
        route: IndexedRouteResponse,
        options: RouteOptions,
    ) -> oneshot::Receiver<Result<(), NavError>> {
        self.override_handle().update_route(route, options)
    }

    /// Install every queued route override.
    pub fn apply_pending_overrides(&mut self) {
        while let Ok(request) = self.overrides_rx.try_recv() {
            let result = self.install_override(request.route, request.options);
            match &result {
                Ok(()) => log::info!("Route override applied"),
                Err(err) => log::error!("Route override rejected: {err}"),
            }
            let _ = request.completion.send(result);
        }
    }

    /// An override applied while rerouting completes the reroute.
    fn install_override(&mut self, route: IndexedRouteResponse, options: RouteOptions) -> Result<(), NavError> {
        if !self.router.state.is_navigating() {
            return Err(NavError::SessionEnded);
        }
        check_compatible(route.route(), &options)?;
        self.router.install(route, options);
        self.simulator.reset();

        if self.router.state == SessionState::Rerouting {
            self.router.state = SessionState::Active;
            log::info!("Reroute completed by route override");
            if let Some(indexed) = self.router.route.as_ref() {
                self.observer.on_rerouted(&self.router, indexed.route());
            }
        }
        Ok(())
    }

    /// Feed one location fix.
    pub fn update_location(&mut self, raw: Location) {
        self.apply_pending_overrides();
        if !self.router.state.is_navigating() {
            return;
        }

        let (location, progress, passed, destination, leg_count) = {
            let Some(indexed) = self.router.route.as_ref() else {
                return;
            };
            let route = indexed.route();
            let previous = self
                .router
                .progress
                .as_ref()
                .map(|p| p.distance_along_geometry_m);

            let location = self.simulator.next(&raw, &route.geometry, previous.unwrap_or(0.0));
            let Some(progress) = RouteProgress::measure_after(route, &location.point, previous) else {
                return;
            };

            let passed: Vec<Waypoint> = route
                .legs
                .iter()
                .take(progress.leg_index)
                .skip(self.router.leg_index)
                .map(|leg| leg.destination.clone())
                .collect();
            let destination = route.destination().cloned();
            (location, progress, passed, destination, route.legs.len())
        };

        self.router.last_location = Some(location);
        self.router.leg_index = progress.leg_index;
        self.router.progress = Some(progress.clone());

        log::debug!(
            "Progress: {:.0} m remaining, {:.1} m from route",
            progress.distance_remaining_m,
            progress.distance_from_route_m
        );
        self.observer.on_progress(&self.router, &progress, &location, &raw);

        if self.router.state != SessionState::Active {
            return;
        }

        if progress.distance_from_route_m > self.config.off_route_threshold_m {
            if self.observer.should_reroute(&self.router, &location) {
                self.begin_reroute(Some(location));
                return;
            }
            log::debug!("Deviation of {:.0} m ignored", progress.distance_from_route_m);
        }

        for waypoint in &passed {
            log::info!("Reached intermediate waypoint {:?}", waypoint.name);
            self.observer.on_arrive(&self.router, waypoint);
        }

        let on_last_leg = progress.leg_index + 1 >= leg_count;
        if on_last_leg
            && !self.router.arrival_reported
            && progress.distance_remaining_m <= self.config.arrival_threshold_m
        {
            self.router.arrival_reported = true;
            let Some(destination) = destination else {
                return;
            };
            if self.observer.on_arrive(&self.router, &destination) {
                self.router.state = SessionState::Arrived;
                log::info!("Arrived at final destination");
            } else {
                log::info!("Arrival pending confirmation");
            }
        }
    }

    /// Start rerouting without waiting for a deviation.
    pub fn reroute_now(&mut self) {
        if self.router.state == SessionState::Active {
            let from = self.router.last_location;
            self.begin_reroute(from);
        }
    }

    fn begin_reroute(&mut self, from: Option<Location>) {
        self.router.state = SessionState::Rerouting;
        log::info!("Session rerouting");
        self.observer.on_will_reroute(&self.router, from.as_ref());
    }

    /// Install the replacement route obtained while rerouting.
    pub fn apply_reroute(&mut self, route: IndexedRouteResponse) -> Result<(), NavError> {
        if !self.router.state.is_navigating() {
            return Err(NavError::SessionEnded);
        }
        let options = route.response().options.clone();
        check_compatible(route.route(), &options)?;

        self.router.install(route, options);
        self.simulator.reset();
        self.router.state = SessionState::Active;
        log::info!("Reroute applied");

        if let Some(indexed) = self.router.route.as_ref() {
            self.observer.on_rerouted(&self.router, indexed.route());
        }
        Ok(())
    }

    /// Accept an arrival the observer left open.
    ///
    /// Fails with [`NavError::ArrivalNotReached`] unless the final
    /// waypoint was already reported to the observer.
    pub fn confirm_arrival(&mut self) -> Result<(), NavError> {
        match self.router.state {
            SessionState::Arrived => Ok(()),
            SessionState::Cancelled => Err(NavError::SessionEnded),
            _ if !self.router.arrival_reported => Err(NavError::ArrivalNotReached),
            _ => {
                self.router.state = SessionState::Arrived;
                log::info!("Arrival confirmed");
                Ok(())
            }
        }
    }

    /// Close the session and release its route.
    ///
    /// `cancelled` distinguishes a user cancelling from the caller
    /// finishing the trip. A session that has not arrived ends up
    /// cancelled either way.
    pub fn dismiss(&mut self, cancelled: bool) {
        if self.router.route.is_none() {
            return;
        }
        if self.router.state != SessionState::Arrived {
            self.router.state = SessionState::Cancelled;
        }
        self.router.release();
        log::info!("Session dismissed (cancelled: {cancelled})");

        self.observer.on_dismiss(&self.router, cancelled);
        self.apply_pending_overrides();
    }
}

impl Drop for NavigationSession {
    fn drop(&mut self) {
        self.overrides_rx.close();
        while let Ok(request) = self.overrides_rx.try_recv() {
            log::error!("Route override dropped: session closed before applying it");
            let _ = request.completion.send(Err(NavError::SessionEnded));
        }
    }
}

impl std::fmt::Debug for NavigationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationSession")
            .field("router", &self.router)
            .field("simulator", &self.simulator)
            .finish_non_exhaustive()
    }
}
