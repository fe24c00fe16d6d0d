//! Route table
//!
//! Protected routes declare their [`AuthorizationRequirement`] where they are
//! registered; the gate middleware hands it to the access guard.

use crate::auth::{handlers as auth, CurrentUser};
use crate::error::ApiError;
use crate::handlers::{cars, health, users};
use crate::session::Session;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use carlot_auth::{AuthorizationRequirement, RoleId};
use std::sync::Arc;

/// Guard configuration for one group of routes
#[derive(Clone)]
struct Gate {
    state: AppState,
    requirement: Arc<AuthorizationRequirement>,
}

/// Put every route in `router` behind the access guard
pub fn guarded(
    router: Router<AppState>,
    state: &AppState,
    requirement: AuthorizationRequirement,
) -> Router<AppState> {
    let gate = Gate {
        state: state.clone(),
        requirement: Arc::new(requirement),
    };
    router.route_layer(middleware::from_fn_with_state(gate, require_access))
}

async fn require_access(
    State(gate): State<Gate>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = request
        .extensions()
        .get::<Session>()
        .cloned()
        .ok_or_else(|| ApiError::Internal("session layer is not installed".to_string()))?;

    let mut ctx = session.guard_context().await;
    let outcome = gate.state.guard.check_auth(&mut ctx, &gate.requirement).await;
    if ctx.was_invalidated() {
        session.invalidate().await;
    }
    let identity = outcome?;

    request.extensions_mut().insert(CurrentUser(identity));
    Ok(next.run(request).await)
}

/// Requirement of the record-management operations
fn admin_only() -> AuthorizationRequirement {
    AuthorizationRequirement::roles([RoleId::ADMIN])
}

pub fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .merge(auth_routes(state))
        .merge(user_routes(state))
        .merge(car_routes(state))
}

pub fn auth_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/auth/signIn", post(auth::sign_in))
        .route("/auth/signUp", post(auth::sign_up));

    let protected = Router::new()
        .route("/auth/logOut", get(auth::log_out))
        .route("/auth/profile", get(auth::profile));

    public.merge(guarded(
        protected,
        state,
        AuthorizationRequirement::authenticated(),
    ))
}

pub fn user_routes(state: &AppState) -> Router<AppState> {
    let routes = Router::new()
        .route("/user", post(users::create_user).get(users::list_users))
        .route("/user/without", get(users::list_users_without_cars))
        .route(
            "/user/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/user/findByEmail/{email}", get(users::cars_by_email));

    guarded(routes, state, admin_only())
}

pub fn car_routes(state: &AppState) -> Router<AppState> {
    let routes = Router::new()
        .route("/car", post(cars::create_car).get(cars::list_cars))
        .route("/car/myCars", get(cars::my_cars))
        .route("/car/without", get(cars::cars_without_owner))
        .route("/car/getOneById/{id}", get(cars::get_car))
        // GET reads the segment as a brand; PATCH and DELETE as an id
        .route(
            "/car/{id}",
            get(cars::cars_by_brand)
                .patch(cars::update_car)
                .delete(cars::delete_car),
        );

    guarded(routes, state, admin_only())
}
