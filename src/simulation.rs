//! Synthetic location updates.
//!
//! The simulation mode decides when the session ignores real fixes and
//! instead advances a synthetic position along the route at a constant
//! speed. Routing logic never sees the difference.

use serde::{Deserialize, Serialize};

use crate::config::NavigationConfig;
use crate::nav::point_at_distance;
use crate::progress::Location;
use crate::trace::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    Always,
    /// Substitute synthetic fixes only while real ones are poor.
    #[default]
    OnPoorGps,
    Never,
}

#[derive(Debug, Clone)]
pub struct LocationSimulator {
    mode: SimulationMode,
    speed_mps: f64,
    poor_accuracy_m: f64,
    distance_m: f64,
    last_timestamp_s: Option<f64>,
    active: bool,
}

impl LocationSimulator {
    pub fn new(mode: SimulationMode, config: &NavigationConfig) -> Self {
        Self {
            mode,
            speed_mps: config.simulation_speed_mps,
            poor_accuracy_m: config.poor_accuracy_m,
            distance_m: 0.0,
            last_timestamp_s: None,
            active: false,
        }
    }

    pub fn mode(&self) -> SimulationMode {
        self.mode
    }

    pub fn is_simulating(&self) -> bool {
        self.active
    }

    pub fn is_poor(&self, raw: &Location) -> bool {
        raw.horizontal_accuracy_m < 0.0 || raw.horizontal_accuracy_m > self.poor_accuracy_m
    }

    /// Forget the synthetic position, e.g. after the route changed.
    pub fn reset(&mut self) {
        self.active = false;
        self.distance_m = 0.0;
    }

    /// The location the session should navigate with.
    ///
    /// `traveled_m` is the distance along `geometry` reached so far; a
    /// simulation that starts mid-route continues from there.
    pub fn next(&mut self, raw: &Location, geometry: &[GeoPoint], traveled_m: f64) -> Location {
        let elapsed = self
            .last_timestamp_s
            .map_or(0.0, |last| (raw.timestamp_s - last).max(0.0));
        self.last_timestamp_s = Some(raw.timestamp_s);

        let simulate = match self.mode {
            SimulationMode::Always => true,
            SimulationMode::OnPoorGps => self.is_poor(raw),
            SimulationMode::Never => false,
        };

        if !simulate {
            if self.active {
                log::info!("Real location fixes resumed");
            }
            self.active = false;
            return *raw;
        }

        if !self.active {
            log::info!("Switching to simulated locations at {:.0} m along the route", traveled_m);
            self.distance_m = traveled_m;
            self.active = true;
        }
        self.distance_m += self.speed_mps * elapsed;

        Location {
            point: point_at_distance(geometry, self.distance_m).unwrap_or(raw.point),
            horizontal_accuracy_m: 0.0,
            timestamp_s: raw.timestamp_s,
        }
    }
}
