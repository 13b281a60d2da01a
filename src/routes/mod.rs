//! Route tables, split by who may reach them. Each module only lists routes; the gates are
//! attached here so a route cannot end up in the wrong group by accident.
use axum::{Router, middleware};

use crate::{AppState, middleware as mw};

/// Routes outside the session stack (probes, API docs).
pub mod public;

/// Login and registration, for visitors who are not signed in.
pub mod guest;

/// Everything that needs a signed-in user.
pub mod authenticated;

/// guest_routes behind the guest gate: signed-in users are sent to `/`.
pub fn gated_guest_routes(state: AppState) -> Router<AppState> {
    guest::guest_routes().route_layer(middleware::from_fn_with_state(state, mw::guest))
}

/// authenticated_routes behind the auth gate: anonymous users are sent to `/login`.
pub fn gated_authenticated_routes(state: AppState) -> Router<AppState> {
    authenticated::authenticated_routes()
        .route_layer(middleware::from_fn_with_state(state, mw::require_auth))
}
