// src/handlers/learners.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::{config::Config, error::AppError, persistence, utils::jwt::sign_jwt};

/// DTO returned when a learner identity is issued.
#[derive(Debug, Serialize, ToSchema)]
pub struct LearnerToken {
    pub learner_id: String,
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: String,
    /// Seconds until the token expires.
    pub expires_in: u64,
}

/// Issues an anonymous learner identity.
///
/// Progress is namespaced per learner, the way a browser keeps its own local
/// storage. The returned bearer token is required by every progress route.
#[utoipa::path(
    post,
    path = "/api/learners",
    responses((status = 201, description = "Learner created", body = LearnerToken))
)]
pub async fn register_learner(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
) -> Result<impl IntoResponse, AppError> {
    let learner_id = uuid::Uuid::new_v4().to_string();

    persistence::create_learner(&pool, &learner_id).await?;
    let token = sign_jwt(&learner_id, &config.jwt_secret, config.jwt_expiration)?;

    tracing::info!(learner = %learner_id, "Issued learner identity");

    Ok((
        StatusCode::CREATED,
        Json(LearnerToken {
            learner_id,
            token,
            token_type: "Bearer".to_string(),
            expires_in: config.jwt_expiration,
        }),
    ))
}
