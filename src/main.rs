use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};

use tracenav::config::{DirectionsConfig, NavigationConfig};
use tracenav::flow::{reroute, start_navigation, FlowSettings, Trigger};
use tracenav::mapbox::MapboxDirections;
use tracenav::nav::point_at_distance;
use tracenav::observer::LoggingObserver;
use tracenav::progress::Location;
use tracenav::request::Profile;
use tracenav::session::{NavigationSession, SessionState};
use tracenav::simplify::{thin_to_limit, MAX_MATCH_COORDINATES};
use tracenav::simulation::SimulationMode;
use tracenav::{CoordinateTrace, DirectionsClient, NavError};

/// Distance between two replayed fixes.
const REPLAY_STEP_M: f64 = 25.0;
const MAX_FIXES: usize = 100_000;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Simulation {
    Always,
    OnPoorGps,
    Never,
}

impl From<Simulation> for SimulationMode {
    fn from(value: Simulation) -> Self {
        match value {
            Simulation::Always => SimulationMode::Always,
            Simulation::OnPoorGps => SimulationMode::OnPoorGps,
            Simulation::Never => SimulationMode::Never,
        }
    }
}

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// route, matched-route, matched-route-override or raw-matched-route
    trigger: Trigger,

    /// GPX file whose first track is used as the trace; a built-in loop otherwise
    #[arg(long)]
    gpx: Option<PathBuf>,

    /// Initial thinning tolerance in meters for traces above the match limit
    #[arg(long, default_value_t = 5.0)]
    tolerance: f64,

    #[arg(long, value_enum, default_value_t = Simulation::OnPoorGps)]
    simulation: Simulation,

    /// Index of the candidate route to navigate
    #[arg(long, default_value_t = 0)]
    route_index: usize,

    /// Accept reroute requests when the replay leaves the route
    #[arg(long)]
    allow_reroute: bool,

    /// Delay between replayed fixes in milliseconds
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    colog::init();
    log::info!("tracenav {}", tracenav::VERSION);

    let trace = match &cli.gpx {
        Some(path) => load_trace(path)?,
        None => CoordinateTrace::sample(),
    };
    let trace = thin_to_limit(&trace, MAX_MATCH_COORDINATES, cli.tolerance);

    let client = MapboxDirections::new(DirectionsConfig::from_env()?)?;
    let settings = FlowSettings {
        profile: Profile::Automobile,
        simulation: cli.simulation.into(),
        route_index: cli.route_index,
        navigation: NavigationConfig::default(),
    };
    let observer = Box::new(LoggingObserver {
        allow_reroute: cli.allow_reroute,
    });

    let mut session = start_navigation(&client, &trace, cli.trigger, &settings, observer).await?;
    replay(&client, &mut session, &settings, Duration::from_millis(cli.interval_ms)).await?;

    let cancelled = session.state() != SessionState::Arrived;
    session.dismiss(cancelled);
    Ok(())
}

fn load_trace(path: &Path) -> Result<CoordinateTrace, Box<dyn Error>> {
    let file = File::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let trace = CoordinateTrace::from_gpx(BufReader::new(file))?;
    log::info!("Loaded {} points from {}", trace.len(), path.display());
    Ok(trace)
}

/// Drive the session along its own route until it stops navigating.
async fn replay<C: DirectionsClient>(
    client: &C,
    session: &mut NavigationSession,
    settings: &FlowSettings,
    interval: Duration,
) -> Result<(), NavError> {
    let seconds_per_fix = REPLAY_STEP_M / settings.navigation.simulation_speed_mps;
    let mut timestamp = 0.0;

    for _ in 0..MAX_FIXES {
        match session.state() {
            SessionState::Rerouting => {
                reroute(client, session).await?;
                continue;
            }
            state if !state.is_navigating() => break,
            _ => {}
        }

        let Some(indexed) = session.router().route() else {
            break;
        };
        let traveled = session
            .router()
            .progress()
            .map_or(0.0, |p| p.distance_along_geometry_m);
        let Some(point) = point_at_distance(&indexed.route().geometry, traveled + REPLAY_STEP_M) else {
            break;
        };

        session.update_location(Location::new(point, 5.0, timestamp));
        timestamp += seconds_per_fix;
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }

    log::info!("Replay finished in state {:?}", session.state());
    Ok(())
}
