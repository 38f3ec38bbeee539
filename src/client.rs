//! The directions service boundary.

use std::future::Future;

use crate::error::ServiceError;
use crate::request::{MatchRequest, RouteRequest};
use crate::response::{MatchResponse, RawMatchResponse, RouteResponse};

/// Remote routing and map-matching.
///
/// Every call completes exactly once. Failures are terminal for the
/// request that caused them; callers do not retry.
pub trait DirectionsClient: Send + Sync {
    /// Route between the request's waypoints.
    fn calculate_route(
        &self,
        request: &RouteRequest,
    ) -> impl Future<Output = Result<RouteResponse, ServiceError>> + Send;

    /// Match a trace and return the matchings already shaped as routes.
    fn calculate_match(
        &self,
        request: &MatchRequest,
    ) -> impl Future<Output = Result<MatchResponse, ServiceError>> + Send;

    /// Match a trace and return the matchings as the service sent them.
    fn calculate_raw_match(
        &self,
        request: &MatchRequest,
    ) -> impl Future<Output = Result<RawMatchResponse, ServiceError>> + Send;
}
