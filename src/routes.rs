// src/routes.rs

use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    http::Method,
    middleware,
    routing::{get, post},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::{
    handlers::{courses, learners, progress},
    state::AppState,
    utils::jwt::auth_middleware,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        learners::register_learner,
        courses::list_courses,
        courses::get_course,
        progress::open_session,
        progress::get_session,
        progress::close_session,
        progress::advance,
        progress::go_back,
        progress::select_answer,
        progress::submit_quiz,
        progress::jump_to_content,
        progress::progress_overview,
    ),
    tags((name = "learnpath", description = "Course progress API"))
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Assembles the main application router.
///
/// * Merges all sub-routers (learners, courses, progress).
/// * Applies global middleware (Trace, CORS, optional rate limiting).
/// * Injects global state.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
        "http://localhost:5173".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let learner_routes = Router::new().route("/", post(learners::register_learner));

    let course_routes = Router::new()
        .route("/", get(courses::list_courses))
        .route("/{id}", get(courses::get_course))
        // Protected session routes
        .merge(
            Router::new()
                .route(
                    "/{id}/session",
                    post(progress::open_session)
                        .get(progress::get_session)
                        .delete(progress::close_session),
                )
                .route("/{id}/session/advance", post(progress::advance))
                .route("/{id}/session/back", post(progress::go_back))
                .route("/{id}/session/answer", post(progress::select_answer))
                .route("/{id}/session/submit", post(progress::submit_quiz))
                .route("/{id}/session/jump", post(progress::jump_to_content))
                .layer(auth.clone()),
        );

    let progress_routes = Router::new()
        .route("/", get(progress::progress_overview))
        .layer(auth);

    let mut router = Router::new()
        .nest("/api/learners", learner_routes)
        .nest("/api/courses", course_routes)
        .nest("/api/progress", progress_routes)
        .route("/api-docs/openapi.json", get(openapi_json))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    if let Some(per_second) = state.config.rate_limit_per_second {
        // One request is replenished every `1 / per_second` seconds; bursts up to twice the rate.
        let period = Duration::from_nanos((1_000_000_000 / per_second.max(1)).max(1));
        let burst = u32::try_from(per_second.saturating_mul(2)).unwrap_or(u32::MAX);

        match GovernorConfigBuilder::default()
            .period(period)
            .burst_size(burst)
            .finish()
        {
            Some(governor_conf) => {
                tracing::info!(burst, "Rate limiting enabled ({} req/s per IP)", per_second);
                router = router.layer(GovernorLayer::new(Arc::new(governor_conf)));
            }
            None => tracing::warn!("Invalid rate limit settings, rate limiting disabled"),
        }
    }

    router.with_state(state)
}
