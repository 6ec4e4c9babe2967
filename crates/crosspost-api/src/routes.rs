use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::session::require_session;
use crate::state::AppState;
use crate::telegram;

/// All `/api` routes. CORS and tracing layers are added by the server binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(telegram::health))
        .route("/api/telegram/verify", post(telegram::verify))
        .route("/api/telegram/link-channel", post(telegram::link_channel))
        // Bearer is a setup token or a session; the handler sorts it out.
        .route("/api/telegram/check-connection", get(telegram::check_connection))
        .with_state(state.clone());

    let session_routes = Router::new()
        .route("/api/telegram/setup", get(telegram::setup))
        .route("/api/telegram/disconnect", post(telegram::disconnect))
        .route("/api/telegram/disconnect-all", post(telegram::disconnect_all))
        .route("/api/telegram/disconnect-channel", post(telegram::disconnect_channel))
        .route("/api/telegram/check-channel", get(telegram::check_channel))
        .route("/api/telegram/channels", get(telegram::list_channels))
        .layer(middleware::from_fn_with_state(state.clone(), require_session))
        .with_state(state);

    Router::new().merge(public_routes).merge(session_routes)
}
