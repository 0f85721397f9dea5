// src/handlers/courses.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    catalog::CourseCatalog,
    error::AppError,
    models::course::{CourseDetail, CourseSummary},
};

/// Lists all courses in the catalog.
#[utoipa::path(
    get,
    path = "/api/courses",
    responses((status = 200, description = "Course list", body = [CourseSummary]))
)]
pub async fn list_courses(
    State(catalog): State<Arc<CourseCatalog>>,
) -> Result<impl IntoResponse, AppError> {
    let courses: Vec<CourseSummary> = catalog
        .iter()
        .map(|course| CourseSummary::from(course.as_ref()))
        .collect();

    Ok(Json(courses))
}

/// Retrieves a single course with its card sequences. Quiz answers are not
/// included.
#[utoipa::path(
    get,
    path = "/api/courses/{id}",
    params(("id" = String, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course detail", body = CourseDetail),
        (status = 404, description = "Unknown course")
    )
)]
pub async fn get_course(
    State(catalog): State<Arc<CourseCatalog>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = catalog
        .get(&id)
        .ok_or(AppError::NotFound("Course not found".to_string()))?;

    Ok(Json(CourseDetail::from(course.as_ref())))
}
