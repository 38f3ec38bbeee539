//! Maneuvers and step synthesis.
//!
//! Classifies the bearing change at each vertex of a leg's geometry and
//! turns the significant ones into steps. Used when the matching service
//! returns legs without steps but the options ask for them.

use serde::{Deserialize, Serialize};

use crate::nav::{bearing, haversine, line_length};
use crate::request::MeasurementSystem;
use crate::response::Step;
use crate::trace::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Maneuver {
    Depart,
    Straight,
    SlightLeft,
    Left,
    SharpLeft,
    SlightRight,
    Right,
    SharpRight,
    UTurn,
    Arrive,
}

impl Maneuver {
    /// Map the service's maneuver `type` and `modifier` fields.
    pub fn from_wire(kind: &str, modifier: Option<&str>) -> Self {
        match kind {
            "depart" => return Maneuver::Depart,
            "arrive" => return Maneuver::Arrive,
            _ => {}
        }
        match modifier {
            Some("uturn") => Maneuver::UTurn,
            Some("sharp right") => Maneuver::SharpRight,
            Some("right") => Maneuver::Right,
            Some("slight right") => Maneuver::SlightRight,
            Some("slight left") => Maneuver::SlightLeft,
            Some("left") => Maneuver::Left,
            Some("sharp left") => Maneuver::SharpLeft,
            _ => Maneuver::Straight,
        }
    }

    fn text(self) -> &'static str {
        match self {
            Maneuver::Depart => "Head out",
            Maneuver::Straight => "Continue straight",
            Maneuver::SlightLeft => "Keep slightly left",
            Maneuver::Left => "Turn left",
            Maneuver::SharpLeft => "Turn sharp left",
            Maneuver::SlightRight => "Keep slightly right",
            Maneuver::Right => "Turn right",
            Maneuver::SharpRight => "Turn sharp right",
            Maneuver::UTurn => "Make a U-turn",
            Maneuver::Arrive => "You have arrived at your destination",
        }
    }
}

/// Build steps for one leg from its geometry.
///
/// Vertices where the path keeps going straight are folded into the
/// preceding step. The leg duration is spread over the steps in
/// proportion to their length. Returns no steps for fewer than 2 points.
pub fn generate_steps(points: &[GeoPoint], duration_s: f64, units: MeasurementSystem) -> Vec<Step> {
    if points.len() < 2 {
        return Vec::new();
    }

    let mut maneuvers = vec![(0, Maneuver::Depart)];
    for i in 1..points.len() - 1 {
        let turn = compute_turn(&points[i - 1], &points[i], &points[i + 1]);
        if turn != Maneuver::Straight {
            maneuvers.push((i, turn));
        }
    }
    let last = points.len() - 1;

    let total = line_length(points);
    let mut steps = Vec::with_capacity(maneuvers.len() + 1);

    for (k, &(start, maneuver)) in maneuvers.iter().enumerate() {
        let end = maneuvers.get(k + 1).map_or(last, |&(next, _)| next);
        let distance = line_length(&points[start..=end]);
        let duration = if total > 0.0 { duration_s * distance / total } else { 0.0 };

        steps.push(Step {
            maneuver,
            instruction: format!(
                "{}, then continue for {}",
                maneuver.text(),
                format_distance(distance, units)
            ),
            location: points[start],
            distance_m: distance,
            duration_s: duration,
        });
    }

    steps.push(Step {
        maneuver: Maneuver::Arrive,
        instruction: Maneuver::Arrive.text().to_string(),
        location: points[last],
        distance_m: 0.0,
        duration_s: 0.0,
    });

    steps
}

/// Turn at B given the approach from A and the exit toward C.
/// Degenerate (zero length) segments count as straight.
fn compute_turn(a: &GeoPoint, b: &GeoPoint, c: &GeoPoint) -> Maneuver {
    if haversine(a, b) < 0.5 || haversine(b, c) < 0.5 {
        return Maneuver::Straight;
    }

    // positive = right turn, negative = left turn
    let mut angle = bearing(b, c) - bearing(a, b);
    while angle > 180.0 {
        angle -= 360.0;
    }
    while angle < -180.0 {
        angle += 360.0;
    }

    classify_turn(angle)
}

fn classify_turn(angle: f64) -> Maneuver {
    let abs_angle = angle.abs();

    if abs_angle > 170.0 {
        Maneuver::UTurn
    } else if abs_angle > 120.0 {
        if angle > 0.0 { Maneuver::SharpRight } else { Maneuver::SharpLeft }
    } else if abs_angle > 60.0 {
        if angle > 0.0 { Maneuver::Right } else { Maneuver::Left }
    } else if abs_angle > 20.0 {
        if angle > 0.0 { Maneuver::SlightRight } else { Maneuver::SlightLeft }
    } else {
        Maneuver::Straight
    }
}

pub fn format_distance(meters: f64, units: MeasurementSystem) -> String {
    match units {
        MeasurementSystem::Metric => {
            if meters >= 1000.0 {
                format!("{:.1} km", meters / 1000.0)
            } else {
                format!("{} m", (meters / 10.0).round() as i64 * 10)
            }
        }
        MeasurementSystem::Imperial => {
            let feet = meters * 3.280_84;
            if feet >= 528.0 {
                format!("{:.1} mi", feet / 5280.0)
            } else {
                format!("{} ft", (feet / 50.0).round() as i64 * 50)
            }
        }
    }
}
