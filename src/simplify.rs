//! Trace thinning.
//!
//! The map-matching service accepts a bounded number of coordinates per
//! request. Dense recordings are thinned with Ramer-Douglas-Peucker,
//! which always keeps both endpoints and the sharpest direction changes.

use crate::trace::{CoordinateTrace, GeoPoint};

/// Maximum number of coordinates one match request may carry.
pub const MAX_MATCH_COORDINATES: usize = 100;

/// Simplify a trace, dropping points closer than `tolerance_m` to the
/// line through their neighbours.
pub fn thin_trace(trace: &CoordinateTrace, tolerance_m: f64) -> CoordinateTrace {
    CoordinateTrace {
        name: trace.name.clone(),
        points: rdp_simplify(&trace.points, tolerance_m),
    }
}

/// Thin a trace until it fits in `max_points`, doubling the tolerance
/// from `initial_tolerance_m` on every pass.
///
/// Traces already within the limit are returned unchanged.
pub fn thin_to_limit(
    trace: &CoordinateTrace,
    max_points: usize,
    initial_tolerance_m: f64,
) -> CoordinateTrace {
    if trace.len() <= max_points {
        return trace.clone();
    }

    let mut tolerance = initial_tolerance_m.max(1.0);
    loop {
        let thinned = thin_trace(trace, tolerance);
        if thinned.len() <= max_points || thinned.len() <= 2 {
            log::debug!(
                "Thinned trace from {} to {} points at {:.0} m tolerance",
                trace.len(),
                thinned.len(),
                tolerance
            );
            return thinned;
        }
        tolerance *= 2.0;
    }
}

fn rdp_simplify(points: &[GeoPoint], tolerance_m: f64) -> Vec<GeoPoint> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let first = &points[0];
    let last = &points[points.len() - 1];

    let mut max_dist = 0.0;
    let mut max_idx = 0;

    for (i, p) in points.iter().enumerate().skip(1).take(points.len() - 2) {
        let dist = perpendicular_distance_m(p, first, last);
        if dist > max_dist {
            max_dist = dist;
            max_idx = i;
        }
    }

    if max_dist > tolerance_m {
        let mut left = rdp_simplify(&points[..=max_idx], tolerance_m);
        let right = rdp_simplify(&points[max_idx..], tolerance_m);

        // junction point appears in both halves
        left.pop();
        left.extend(right);
        left
    } else {
        vec![*first, *last]
    }
}

/// Distance from P to the line through A and B, in meters, using a
/// latitude-cosine scaled planar approximation.
fn perpendicular_distance_m(p: &GeoPoint, a: &GeoPoint, b: &GeoPoint) -> f64 {
    let cos_lat = ((a.lat + b.lat) / 2.0).to_radians().cos();

    let m_per_deg_lat = 111_320.0;
    let m_per_deg_lon = 111_320.0 * cos_lat;

    let ax = a.lon * m_per_deg_lon;
    let ay = a.lat * m_per_deg_lat;
    let bx = b.lon * m_per_deg_lon;
    let by = b.lat * m_per_deg_lat;
    let px = p.lon * m_per_deg_lon;
    let py = p.lat * m_per_deg_lat;

    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;

    if len_sq < 1e-10 {
        return ((px - ax).powi(2) + (py - ay).powi(2)).sqrt();
    }

    let cross = ((px - ax) * dy - (py - ay) * dx).abs();
    cross / len_sq.sqrt()
}
