// src/models/progress.rs

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::engine::{Transition, content::ContentKind};

use super::course::QuizQuestion;

/// Quiz as shown to the learner (no answer key).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicQuiz {
    pub question: String,
    pub options: Vec<String>,
}

impl From<&QuizQuestion> for PublicQuiz {
    fn from(quiz: &QuizQuestion) -> Self {
        Self {
            question: quiz.question.clone(),
            options: quiz.options.clone(),
        }
    }
}

/// Everything the presentation layer needs to render the current card.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProgressSnapshot {
    pub course_id: String,
    pub section_index: usize,
    pub section_title: String,
    pub content_index: usize,
    pub content_kind: ContentKind,
    pub available_content_kinds: Vec<ContentKind>,
    pub selected_answer: Option<usize>,
    pub quiz_submitted: bool,
    /// Set once the current quiz has been submitted.
    pub answer_correct: Option<bool>,
    pub quiz: Option<PublicQuiz>,
    pub xp: u64,
    pub level: u64,
    /// Percentage through the current level.
    pub level_progress: f64,
    /// Percentage through the course, for display.
    pub overall_progress: f64,
    /// Completed content keys ("{section}-{content}", "course-complete").
    pub completed: Vec<String>,
    pub course_completed: bool,
}

/// Result of a navigation or quiz intent.
#[derive(Debug, Serialize, ToSchema)]
pub struct IntentResponse {
    pub transition: Transition,
    pub snapshot: ProgressSnapshot,
}

/// Query parameters for opening a course.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OpenSessionRequest {
    /// Section to jump in at. Out-of-range values start at the first section.
    pub initial_section: Option<usize>,
}

/// DTO carrying an answer or card index.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct IndexRequest {
    #[validate(range(max = 1000))]
    pub index: usize,
}

/// Read-only view of stored progress for one course.
#[derive(Debug, Serialize, ToSchema)]
pub struct CourseProgressSummary {
    pub course_id: String,
    pub title: String,
    pub xp: u64,
    pub level: u64,
    pub completed_items: usize,
    pub total_items: usize,
    pub course_completed: bool,
    pub last_activity: Option<chrono::DateTime<chrono::Utc>>,
}

/// Stored progress across every course in the catalog.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProgressOverview {
    pub total_xp: u64,
    pub courses: Vec<CourseProgressSummary>,
}
