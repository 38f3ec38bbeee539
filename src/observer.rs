//! Navigation session callbacks.
//!
//! Every callback has a default, so observers implement only what they
//! care about. The session never depends on who is observing.

use crate::progress::{Location, RouteProgress};
use crate::response::Route;
use crate::session::Router;
use crate::trace::Waypoint;

pub trait NavigationObserver {
    /// Called for every location update while the session is active or rerouting.
    fn on_progress(
        &mut self,
        _router: &Router,
        _progress: &RouteProgress,
        _location: &Location,
        _raw_location: &Location,
    ) {
    }

    /// Whether to leave the route after the consumer deviated from it.
    /// Returning false keeps the session on the current route.
    fn should_reroute(&mut self, _router: &Router, _from: &Location) -> bool {
        true
    }

    /// Rerouting is about to begin.
    fn on_will_reroute(&mut self, _router: &Router, _from: Option<&Location>) {}

    fn on_rerouted(&mut self, _router: &Router, _route: &Route) {}

    /// A leg destination was reached. For the final waypoint, returning
    /// false keeps the session open until the arrival is confirmed.
    fn on_arrive(&mut self, _router: &Router, _waypoint: &Waypoint) -> bool {
        true
    }

    fn on_dismiss(&mut self, _router: &Router, _cancelled: bool) {}
}

/// Logs every event. Declines reroutes unless told otherwise and accepts arrivals.
#[derive(Debug, Default)]
pub struct LoggingObserver {
    pub allow_reroute: bool,
}

impl NavigationObserver for LoggingObserver {
    fn on_progress(
        &mut self,
        _router: &Router,
        progress: &RouteProgress,
        location: &Location,
        _raw_location: &Location,
    ) {
        log::info!(
            "Distance remaining: {:.0} m (leg {}, step {}) at {:.6},{:.6}",
            progress.distance_remaining_m,
            progress.leg_index,
            progress.step_index,
            location.point.lat,
            location.point.lon
        );
    }

    fn should_reroute(&mut self, _router: &Router, from: &Location) -> bool {
        log::info!(
            "Off route at {:.6},{:.6}, reroute {}",
            from.point.lat,
            from.point.lon,
            if self.allow_reroute { "accepted" } else { "declined" }
        );
        self.allow_reroute
    }

    fn on_will_reroute(&mut self, _router: &Router, from: Option<&Location>) {
        match from {
            Some(location) => log::info!("Rerouting from longitude {:.6}", location.point.lon),
            None => log::info!("Rerouting"),
        }
    }

    fn on_rerouted(&mut self, _router: &Router, route: &Route) {
        log::info!(
            "Rerouted along {:.0} m / {:.0} s with {} leg(s)",
            route.distance_m,
            route.duration_s,
            route.legs.len()
        );
    }

    fn on_arrive(&mut self, _router: &Router, waypoint: &Waypoint) -> bool {
        log::info!(
            "Arrived at {}",
            waypoint.name.as_deref().unwrap_or("waypoint")
        );
        true
    }

    fn on_dismiss(&mut self, _router: &Router, cancelled: bool) {
        log::info!(
            "Navigation dismissed ({})",
            if cancelled { "cancelled" } else { "completed" }
        );
    }
}
