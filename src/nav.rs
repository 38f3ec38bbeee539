//! Polyline geometry on WGS84 coordinates.
//!
//! Distances, projection of a position onto route geometry and
//! interpolation along it. Used for progress tracking, off-route
//! detection and synthetic location updates.

use serde::Serialize;

use crate::trace::GeoPoint;

/// Result of projecting a position onto a polyline.
#[derive(Debug, Clone, Serialize)]
pub struct Projection {
    /// Nearest point on the polyline.
    pub point: GeoPoint,
    /// Index of the segment start point (0-based).
    pub segment_index: usize,
    /// Distance from the position to the nearest point, in meters.
    pub distance_m: f64,
    /// Distance along the polyline from its start to the projected point, in meters.
    pub distance_along_m: f64,
}

/// Earth radius in meters (WGS84 mean).
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Haversine distance between two points in meters.
pub fn haversine(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Initial bearing from A to B in degrees [0, 360).
pub fn bearing(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Total length of a polyline in meters.
pub fn line_length(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine(&w[0], &w[1]))
        .sum()
}

/// Project a position onto the nearest segment of a polyline.
///
/// Returns None if the polyline has fewer than 2 points.
pub fn project_on_line(position: &GeoPoint, line: &[GeoPoint]) -> Option<Projection> {
    project_on_line_within(position, line, 0.0, f64::INFINITY)
}

/// Like [`project_on_line`], but only segments overlapping the stretch
/// between `from_m` and `to_m` along the polyline are considered.
///
/// Returns None if no segment lies in that stretch.
pub fn project_on_line_within(
    position: &GeoPoint,
    line: &[GeoPoint],
    from_m: f64,
    to_m: f64,
) -> Option<Projection> {
    if line.len() < 2 {
        return None;
    }

    let mut best: Option<Projection> = None;
    let mut cumulative = 0.0;

    for (i, segment) in line.windows(2).enumerate() {
        let a = &segment[0];
        let b = &segment[1];
        let length = haversine(a, b);

        if cumulative + length < from_m || cumulative > to_m {
            cumulative += length;
            continue;
        }

        let projected = project_on_segment(position, a, b);
        let dist = haversine(position, &projected);

        let is_better = match &best {
            Some(prev) => dist < prev.distance_m,
            None => true,
        };

        if is_better {
            best = Some(Projection {
                point: projected,
                segment_index: i,
                distance_m: dist,
                distance_along_m: cumulative + haversine(a, &projected),
            });
        }

        cumulative += length;
    }

    best
}

/// The point `distance_m` meters along a polyline, clamped to its ends.
///
/// Returns None for an empty polyline.
pub fn point_at_distance(line: &[GeoPoint], distance_m: f64) -> Option<GeoPoint> {
    let first = *line.first()?;
    if distance_m <= 0.0 {
        return Some(first);
    }

    let mut remaining = distance_m;
    for segment in line.windows(2) {
        let len = haversine(&segment[0], &segment[1]);
        if remaining <= len && len > 0.0 {
            let t = remaining / len;
            return Some(GeoPoint::new(
                segment[0].lat + t * (segment[1].lat - segment[0].lat),
                segment[0].lon + t * (segment[1].lon - segment[0].lon),
            ));
        }
        remaining -= len;
    }

    line.last().copied()
}

/// Planar projection scaled by latitude cosine. Accurate for short segments (< 10 km).
fn project_on_segment(p: &GeoPoint, a: &GeoPoint, b: &GeoPoint) -> GeoPoint {
    let cos_lat = ((a.lat + b.lat) / 2.0).to_radians().cos();

    let dx = (b.lon - a.lon) * cos_lat;
    let dy = b.lat - a.lat;
    let px = (p.lon - a.lon) * cos_lat;
    let py = p.lat - a.lat;

    let seg_len_sq = dx * dx + dy * dy;

    if seg_len_sq < 1e-20 {
        return *a;
    }

    let t = ((px * dx + py * dy) / seg_len_sq).clamp(0.0, 1.0);

    GeoPoint::new(a.lat + t * (b.lat - a.lat), a.lon + t * (b.lon - a.lon))
}
