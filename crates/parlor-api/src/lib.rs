pub mod auth;
pub mod conversations;
pub mod error;
pub mod middleware;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::auth::AppState;

/// REST routes: public auth endpoints plus the JWT-protected conversation API.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route(
            "/conversations",
            get(conversations::get_conversations).post(conversations::new_conversation),
        )
        .route("/conversations/blocked", get(conversations::blocked_conversations))
        .route("/conversations/{id}/block", post(conversations::block_conversation))
        .route("/conversations/{id}/unblock", post(conversations::unblock_conversation))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
