//! Route definitions

use crate::{
    auth,
    handlers::{auth as auth_handlers, users},
    AppState,
};
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    routing::{delete, get, post, put},
    Router,
};

/// Authentication routes, open to anonymous callers
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth_handlers::login))
        .route("/register", post(auth_handlers::register))
        .route("/logout", post(auth_handlers::logout))
        .route("/refresh-token", post(auth_handlers::refresh_token))
}

/// User management routes
///
/// Claim mutation is restricted to administrators; the guard layer only
/// wraps the routes registered before it.
pub fn user_routes(state: AppState) -> Router<AppState> {
    let admin_guard = middleware::from_fn_with_state(
        state,
        |State(state): State<AppState>, request: Request, next: Next| async move {
            auth::authorize(state, "AdminOnly", request, next).await
        },
    );

    Router::new()
        .route("/add-claim", post(users::add_claim))
        .route("/remove-claim", delete(users::remove_claim))
        .route_layer(admin_guard)
        .route("/users", get(users::list_users))
        .route("/create", post(users::create_user))
        .route("/update/{user_id}", put(users::update_user))
        .route("/delete/{user_id}", delete(users::delete_user))
        .route("/roles", get(users::list_roles))
        .route("/add-role", post(users::add_role))
        .route("/remove-role", post(users::remove_role))
        .route("/claims/{email}", get(users::get_claims))
}
