//! Location updates and route progress snapshots.

use serde::Serialize;

use crate::nav::{line_length, project_on_line_within};
use crate::response::Route;
use crate::trace::GeoPoint;

/// A position fix fed to the navigation session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub point: GeoPoint,
    /// Horizontal accuracy radius in meters; negative means the fix is invalid.
    pub horizontal_accuracy_m: f64,
    /// Seconds since an arbitrary epoch, monotonically increasing.
    pub timestamp_s: f64,
}

impl Location {
    pub fn new(point: GeoPoint, horizontal_accuracy_m: f64, timestamp_s: f64) -> Self {
        Self {
            point,
            horizontal_accuracy_m,
            timestamp_s,
        }
    }
}

/// Where the consumer is along the active route.
///
/// Handed to the observer once per location update and not retained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteProgress {
    pub leg_index: usize,
    pub step_index: usize,
    pub distance_traveled_m: f64,
    pub distance_remaining_m: f64,
    pub duration_remaining_s: f64,
    pub fraction_traveled: f64,
    /// The location snapped onto the route geometry.
    pub snapped: GeoPoint,
    pub distance_from_route_m: f64,
    /// Distance along the route geometry to the snapped point.
    pub distance_along_geometry_m: f64,
}

/// How far behind the previous fix a new one may snap.
const BACKTRACK_M: f64 = 50.0;
/// Stretch ahead of the previous fix searched first.
const LOOKAHEAD_M: f64 = 1_000.0;
/// Beyond this distance from the searched stretch, the rest of the route ahead is searched too.
const REJOIN_M: f64 = 50.0;

impl RouteProgress {
    /// Measure a position against a route with no earlier progress.
    pub fn measure(route: &Route, position: &GeoPoint) -> Option<Self> {
        Self::measure_after(route, position, None)
    }

    /// Measure a position against a route.
    ///
    /// The position is snapped to the stretch just ahead of
    /// `previous_along_m` (the start of the route without one), so loops
    /// and out-and-back routes do not jump to a later pass over the same
    /// place. Geometry length gives the traveled fraction, which is then
    /// applied to the route's reported distance and duration. Returns None
    /// for geometries shorter than 2 points.
    pub fn measure_after(route: &Route, position: &GeoPoint, previous_along_m: Option<f64>) -> Option<Self> {
        let previous = previous_along_m.unwrap_or(0.0);
        let from = (previous - BACKTRACK_M).max(0.0);

        let near = project_on_line_within(position, &route.geometry, from, previous + LOOKAHEAD_M)?;
        let projection = if near.distance_m > REJOIN_M {
            match project_on_line_within(position, &route.geometry, from, f64::INFINITY) {
                Some(ahead) if ahead.distance_m < near.distance_m => ahead,
                _ => near,
            }
        } else {
            near
        };
        let geometry_length = line_length(&route.geometry);

        let fraction = if geometry_length > 0.0 {
            (projection.distance_along_m / geometry_length).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let total = if route.distance_m > 0.0 {
            route.distance_m
        } else {
            geometry_length
        };
        let traveled = fraction * total;

        let leg_lengths: Vec<f64> = route.legs.iter().map(|leg| leg.distance_m).collect();
        let (leg_index, into_leg) = locate(&leg_lengths, traveled, total);

        let step_index = match route.legs.get(leg_index) {
            Some(leg) if !leg.steps.is_empty() => {
                let leg_total = scaled_length(&leg_lengths, total, leg_index);
                let step_lengths: Vec<f64> = leg.steps.iter().map(|s| s.distance_m).collect();
                locate(&step_lengths, into_leg, leg_total).0
            }
            _ => 0,
        };

        Some(Self {
            leg_index,
            step_index,
            distance_traveled_m: traveled,
            distance_remaining_m: (total - traveled).max(0.0),
            duration_remaining_s: route.duration_s * (1.0 - fraction),
            fraction_traveled: fraction,
            snapped: projection.point,
            distance_from_route_m: projection.distance_m,
            distance_along_geometry_m: projection.distance_along_m,
        })
    }
}

/// Length of part `index` once all parts are rescaled to sum to `total`.
/// Parts without any reported length share `total` evenly.
fn scaled_length(lengths: &[f64], total: f64, index: usize) -> f64 {
    let sum: f64 = lengths.iter().sum();
    if sum > 0.0 {
        lengths[index] * total / sum
    } else {
        total / lengths.len() as f64
    }
}

/// Index of the part containing `distance` and how far into it it lies.
fn locate(lengths: &[f64], distance: f64, total: f64) -> (usize, f64) {
    if lengths.is_empty() {
        return (0, distance);
    }

    let mut start = 0.0;
    for i in 0..lengths.len() {
        let len = scaled_length(lengths, total, i);
        if distance < start + len || i == lengths.len() - 1 {
            return (i, distance - start);
        }
        start += len;
    }
    (lengths.len() - 1, distance - start)
}
