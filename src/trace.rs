//! Coordinate traces and waypoints.
//!
//! A trace is either a pair of endpoints or a dense recorded GPS path
//! that will be snapped onto the road network by the map-matching
//! service. Traces can be built in code or read from GPX 1.1 files
//! through the `gpx` crate.

use serde::{Deserialize, Serialize};
use std::io::Read;

use crate::error::NavError;

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A routable point that may mark a leg boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub point: GeoPoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the route must split into a new leg at this point.
    /// Interior trace points used only for matching carry `false`.
    pub separates_legs: bool,
}

impl Waypoint {
    pub fn new(point: GeoPoint) -> Self {
        Self {
            point,
            name: None,
            separates_legs: true,
        }
    }

    pub fn named(point: GeoPoint, name: impl Into<String>) -> Self {
        Self {
            point,
            name: Some(name.into()),
            separates_legs: true,
        }
    }
}

/// An ordered sequence of coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateTrace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub points: Vec<GeoPoint>,
}

/// The demo loop used by the trigger entry points when no trace is given.
const SAMPLE_LOOP: [GeoPoint; 6] = [
    GeoPoint::new(47.18714396691307, 27.564500233819288),
    GeoPoint::new(47.18733343526054, 27.564257657289705),
    GeoPoint::new(47.186476694193814, 27.563533460855684),
    GeoPoint::new(47.18607201594545, 27.56264296746274),
    GeoPoint::new(47.182431877449886, 27.565717449890503),
    GeoPoint::new(47.17925426005481, 27.568436759360026),
];

impl CoordinateTrace {
    pub fn new(points: Vec<GeoPoint>) -> Self {
        Self { name: None, points }
    }

    /// The fixed six point trace the demo triggers operate on.
    pub fn sample() -> Self {
        Self {
            name: Some("Sample loop".to_string()),
            points: SAMPLE_LOOP.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<GeoPoint> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<GeoPoint> {
        self.points.last().copied()
    }

    /// First and last point, or `InvalidTrace` for traces shorter than two points.
    pub fn endpoints(&self) -> Result<(GeoPoint, GeoPoint), NavError> {
        match (self.first(), self.last()) {
            (Some(origin), Some(destination)) if self.len() >= 2 => Ok((origin, destination)),
            _ => Err(NavError::InvalidTrace { len: self.len() }),
        }
    }

    /// Read a trace from a GPX file.
    ///
    /// All segments of the first track are flattened into one point list.
    /// Files without tracks fall back to their first route.
    pub fn from_gpx<R: Read>(reader: R) -> Result<Self, NavError> {
        let gpx = gpx::read(reader).map_err(|e| NavError::Gpx(e.to_string()))?;

        if let Some(track) = gpx.tracks.first() {
            let points = track
                .segments
                .iter()
                .flat_map(|seg| seg.points.iter())
                .map(|wp| GeoPoint::new(wp.point().y(), wp.point().x()))
                .collect();
            return Ok(Self {
                name: track.name.clone(),
                points,
            });
        }

        if let Some(route) = gpx.routes.first() {
            let points = route
                .points
                .iter()
                .map(|wp| GeoPoint::new(wp.point().y(), wp.point().x()))
                .collect();
            return Ok(Self {
                name: route.name.clone(),
                points,
            });
        }

        Err(NavError::Gpx("file contains no track or route".to_string()))
    }
}
