pub mod client;
pub mod config;
pub mod error;
pub mod flow;
pub mod instructions;
#[cfg(feature = "mapbox")]
pub mod mapbox;
pub mod nav;
pub mod observer;
pub mod progress;
pub mod reconcile;
pub mod request;
pub mod response;
pub mod session;
pub mod simplify;
pub mod simulation;
pub mod trace;

#[cfg(test)]
pub(crate) mod fixtures;

pub use client::DirectionsClient;
pub use error::{NavError, ServiceError};
pub use flow::{start_navigation, FlowSettings, Trigger};
pub use session::{create_session, NavigationSession, SessionFactory, SessionState};
pub use trace::{CoordinateTrace, GeoPoint, Waypoint};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
