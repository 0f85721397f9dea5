// src/handlers/progress.rs

use std::{collections::HashMap, sync::Arc};

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    catalog::CourseCatalog,
    engine::{
        CourseProgressEngine,
        content::CourseOutline,
        scoring,
        store::{MemoryStore, PersistedProgress, completed_key, xp_key},
    },
    error::AppError,
    models::progress::{
        CourseProgressSummary, IndexRequest, IntentResponse, OpenSessionRequest,
        ProgressOverview, ProgressSnapshot,
    },
    persistence::{self, BufferedStore},
    session::{Intent, SessionKey, SessionRegistry},
    utils::jwt::Claims,
};

fn no_session() -> AppError {
    AppError::NotFound("No open session for this course".to_string())
}

/// Applies one intent to the learner's live engine and flushes whatever it
/// wrote to the store before answering.
///
/// The intent runs against a copy of the engine. The copy replaces the live
/// engine only once its writes are committed, so a failed flush leaves the
/// session exactly as it was.
async fn run_intent(
    pool: &SqlitePool,
    sessions: &SessionRegistry,
    learner_id: &str,
    course_id: &str,
    intent: Intent,
) -> Result<Json<IntentResponse>, AppError> {
    let handle = sessions
        .get(&SessionKey::new(learner_id, course_id))
        .ok_or_else(no_session)?;
    let mut live = handle.lock().await;

    let mut draft = live.clone();
    let transition = intent.apply(&mut draft).map_err(|e| {
        tracing::debug!(course = course_id, ?intent, "Intent rejected: {}", e);
        AppError::from(e)
    })?;

    let pending = draft.store_mut().take_pending();
    if let Err(e) = persistence::write_entries(pool, learner_id, &pending).await {
        tracing::warn!(course = course_id, ?intent, "Progress flush failed, intent discarded");
        return Err(e);
    }

    *live = draft;

    Ok(Json(IntentResponse {
        transition,
        snapshot: live.snapshot(),
    }))
}

/// Opens a course for the current learner, replacing any session already open
/// for it. Progress is seeded from storage.
#[utoipa::path(
    post,
    path = "/api/courses/{id}/session",
    params(
        ("id" = String, Path, description = "Course id"),
        OpenSessionRequest
    ),
    responses(
        (status = 201, description = "Session opened", body = ProgressSnapshot),
        (status = 404, description = "Unknown course")
    )
)]
pub async fn open_session(
    State(pool): State<SqlitePool>,
    State(catalog): State<Arc<CourseCatalog>>,
    State(sessions): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Query(params): Query<OpenSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let course = catalog
        .get(&id)
        .ok_or(AppError::NotFound("Course not found".to_string()))?;

    let entries = persistence::load_course_entries(&pool, &claims.sub, &course.id).await?;
    let engine = CourseProgressEngine::new(
        course,
        params.initial_section.unwrap_or(0),
        BufferedStore::seeded(entries),
    )?;

    let snapshot = engine.snapshot();
    sessions.open(SessionKey::new(&claims.sub, &id), engine);

    tracing::info!(learner = %claims.sub, course = %id, xp = snapshot.xp, "Course session opened");

    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Current state of the open session.
#[utoipa::path(
    get,
    path = "/api/courses/{id}/session",
    params(("id" = String, Path, description = "Course id")),
    responses(
        (status = 200, description = "Current progress", body = ProgressSnapshot),
        (status = 404, description = "No open session")
    )
)]
pub async fn get_session(
    State(sessions): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let handle = sessions
        .get(&SessionKey::new(&claims.sub, &id))
        .ok_or_else(no_session)?;
    let snapshot = handle.lock().await.snapshot();

    Ok(Json(snapshot))
}

/// Closes the session. Stored progress is kept.
#[utoipa::path(
    delete,
    path = "/api/courses/{id}/session",
    params(("id" = String, Path, description = "Course id")),
    responses(
        (status = 204, description = "Session closed"),
        (status = 404, description = "No open session")
    )
)]
pub async fn close_session(
    State(sessions): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !sessions.close(&SessionKey::new(&claims.sub, &id)) {
        return Err(no_session());
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Moves to the next card, or submits the selected quiz answer.
#[utoipa::path(
    post,
    path = "/api/courses/{id}/session/advance",
    params(("id" = String, Path, description = "Course id")),
    responses(
        (status = 200, description = "Intent applied", body = IntentResponse),
        (status = 409, description = "Quiz not answered")
    )
)]
pub async fn advance(
    State(pool): State<SqlitePool>,
    State(sessions): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    run_intent(&pool, &sessions, &claims.sub, &id, Intent::Advance).await
}

/// Moves to the previous card.
#[utoipa::path(
    post,
    path = "/api/courses/{id}/session/back",
    params(("id" = String, Path, description = "Course id")),
    responses((status = 200, description = "Intent applied", body = IntentResponse))
)]
pub async fn go_back(
    State(pool): State<SqlitePool>,
    State(sessions): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    run_intent(&pool, &sessions, &claims.sub, &id, Intent::GoBack).await
}

/// Selects a quiz answer on the current card.
#[utoipa::path(
    post,
    path = "/api/courses/{id}/session/answer",
    params(("id" = String, Path, description = "Course id")),
    request_body = IndexRequest,
    responses(
        (status = 200, description = "Intent applied", body = IntentResponse),
        (status = 400, description = "Answer out of range"),
        (status = 409, description = "Not on an open quiz")
    )
)]
pub async fn select_answer(
    State(pool): State<SqlitePool>,
    State(sessions): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<IndexRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    run_intent(&pool, &sessions, &claims.sub, &id, Intent::SelectAnswer(payload.index)).await
}

/// Submits the selected quiz answer without moving on.
#[utoipa::path(
    post,
    path = "/api/courses/{id}/session/submit",
    params(("id" = String, Path, description = "Course id")),
    responses(
        (status = 200, description = "Intent applied", body = IntentResponse),
        (status = 409, description = "Nothing to submit")
    )
)]
pub async fn submit_quiz(
    State(pool): State<SqlitePool>,
    State(sessions): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    run_intent(&pool, &sessions, &claims.sub, &id, Intent::SubmitQuiz).await
}

/// Jumps to a card in the current section (tab strip navigation).
#[utoipa::path(
    post,
    path = "/api/courses/{id}/session/jump",
    params(("id" = String, Path, description = "Course id")),
    request_body = IndexRequest,
    responses(
        (status = 200, description = "Intent applied", body = IntentResponse),
        (status = 400, description = "Card out of range")
    )
)]
pub async fn jump_to_content(
    State(pool): State<SqlitePool>,
    State(sessions): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    Json(payload): Json<IndexRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    run_intent(&pool, &sessions, &claims.sub, &id, Intent::JumpToContent(payload.index)).await
}

/// Read-only projection of the learner's stored progress across the catalog.
///
/// Decoded with the same codec the engine writes, so this view never diverges
/// from what a reopened session would see.
#[utoipa::path(
    get,
    path = "/api/progress",
    responses((status = 200, description = "Stored progress", body = ProgressOverview))
)]
pub async fn progress_overview(
    State(pool): State<SqlitePool>,
    State(catalog): State<Arc<CourseCatalog>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let rows = persistence::load_learner_entries(&pool, &claims.sub).await?;

    let updated: HashMap<&str, chrono::DateTime<chrono::Utc>> = rows
        .iter()
        .map(|row| (row.key.as_str(), row.updated_at))
        .collect();
    let store: MemoryStore = rows
        .iter()
        .map(|row| (row.key.clone(), row.value.clone()))
        .collect();

    let courses: Vec<CourseProgressSummary> = catalog
        .iter()
        .map(|course| {
            let progress = PersistedProgress::load(&store, &course.id);
            let last_activity = [xp_key(&course.id), completed_key(&course.id)]
                .iter()
                .filter_map(|key| updated.get(key.as_str()).copied())
                .max();

            CourseProgressSummary {
                course_id: course.id.clone(),
                title: course.title.clone(),
                xp: progress.xp,
                level: scoring::level(progress.xp),
                completed_items: progress.completed_items(),
                total_items: CourseOutline::resolve(course).total_items(),
                course_completed: progress.is_course_completed(),
                last_activity,
            }
        })
        .collect();

    let total_xp = courses.iter().map(|c| c.xp).sum();

    Ok(Json(ProgressOverview { total_xp, courses }))
}
