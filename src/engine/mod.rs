// src/engine/mod.rs

//! Course progress state machine.
//!
//! One [`CourseProgressEngine`] owns the learner's position in a single course,
//! quiz answer state, XP and the completed-card set. Every intent runs to
//! completion synchronously; XP and completion changes are written through to a
//! [`PersistenceStore`] before the intent returns.

pub mod content;
pub mod scoring;
pub mod store;

use std::{collections::BTreeSet, fmt, sync::Arc};

use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{
    course::{Course, QuizQuestion},
    progress::{ProgressSnapshot, PublicQuiz},
};

use self::{
    content::{ContentKind, CourseOutline},
    store::{ContentKey, PersistedProgress, PersistenceStore},
};

/// Rejected intents. The engine state is unchanged whenever one is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressError {
    /// The course has no sections to progress through.
    EmptyCourse,

    /// `advance` or `submit_quiz` on a quiz without a selected answer.
    QuizNotAnswered,

    /// The intent does not apply to the current card.
    InvalidState(&'static str),

    /// The selected answer is not one of the quiz options.
    AnswerOutOfRange { index: usize, options: usize },

    /// The requested card is outside the current section.
    ContentOutOfRange { index: usize, len: usize },
}

impl fmt::Display for ProgressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressError::EmptyCourse => write!(f, "Course has no sections"),
            ProgressError::QuizNotAnswered => write!(f, "Select an answer before continuing"),
            ProgressError::InvalidState(reason) => write!(f, "Invalid state: {}", reason),
            ProgressError::AnswerOutOfRange { index, options } => write!(
                f,
                "Answer {} is out of range (quiz has {} options)",
                index, options
            ),
            ProgressError::ContentOutOfRange { index, len } => write!(
                f,
                "Content {} is out of range (section has {} cards)",
                index, len
            ),
        }
    }
}

impl std::error::Error for ProgressError {}

/// What an intent did to the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transition {
    /// The pending quiz answer was submitted; the position did not move.
    Submitted,
    /// The position changed.
    Moved,
    /// Nothing moved.
    Stayed,
    /// The last card of the last section was completed.
    CourseCompleted { bonus_awarded: bool },
}

#[derive(Clone)]
pub struct CourseProgressEngine<S> {
    course: Arc<Course>,
    outline: CourseOutline,
    store: S,
    section_index: usize,
    content_index: usize,
    selected_answer: Option<usize>,
    quiz_submitted: bool,
    progress: PersistedProgress,
}

impl<S: PersistenceStore> CourseProgressEngine<S> {
    /// Opens a course at the first card of `initial_section`, seeded from
    /// whatever progress `store` already holds for the course.
    ///
    /// An out-of-range section index only affects the jump-in point and is
    /// clamped to the first section.
    pub fn new(course: Arc<Course>, initial_section: usize, store: S) -> Result<Self, ProgressError> {
        let outline = CourseOutline::resolve(&course);
        if outline.section_count() == 0 {
            return Err(ProgressError::EmptyCourse);
        }

        let section_index = if initial_section < outline.section_count() {
            initial_section
        } else {
            tracing::warn!(
                course = %course.id,
                initial_section,
                sections = outline.section_count(),
                "Initial section out of range, starting at the first section"
            );
            0
        };

        let progress = PersistedProgress::load(&store, &course.id);
        tracing::debug!(
            course = %course.id,
            xp = progress.xp,
            completed = progress.completed.len(),
            "Opened course progress"
        );

        Ok(Self {
            course,
            outline,
            store,
            section_index,
            content_index: 0,
            selected_answer: None,
            quiz_submitted: false,
            progress,
        })
    }

    /// Moves forward one card.
    ///
    /// On an unsubmitted quiz this submits the selected answer instead of
    /// moving, or is rejected when nothing is selected. Otherwise the current
    /// card is completed (XP is paid the first time a card is completed) and the
    /// position advances, rolling into the next section when needed.
    pub fn advance(&mut self) -> Result<Transition, ProgressError> {
        if self.current_kind() == ContentKind::Quiz && !self.quiz_submitted {
            return match self.selected_answer {
                Some(_) => {
                    self.quiz_submitted = true;
                    Ok(Transition::Submitted)
                }
                None => Err(ProgressError::QuizNotAnswered),
            };
        }

        let kind = self.current_kind();
        let reward = scoring::reward_for(kind, self.answer_correct() == Some(true));
        let mut changed = self.record_completion(
            ContentKey::item(self.section_index, self.content_index),
            reward,
        );

        let transition = if self.content_index + 1 < self.available_kinds().len() {
            self.content_index += 1;
            self.reset_answer();
            Transition::Moved
        } else if self.section_index + 1 < self.outline.section_count() {
            self.section_index += 1;
            self.content_index = 0;
            self.reset_answer();
            Transition::Moved
        } else {
            let bonus_awarded =
                self.record_completion(ContentKey::CourseComplete, scoring::COMPLETION_BONUS);
            changed |= bonus_awarded;
            tracing::info!(
                course = %self.course.id,
                xp = self.progress.xp,
                bonus_awarded,
                "Course completed"
            );
            Transition::CourseCompleted { bonus_awarded }
        };

        if changed {
            self.persist();
        }

        Ok(transition)
    }

    /// Moves back one card, into the last card of the previous section when at
    /// the start of a section. A no-op on the very first card.
    pub fn go_back(&mut self) -> Transition {
        if self.content_index > 0 {
            self.content_index -= 1;
        } else if self.section_index > 0 {
            self.section_index -= 1;
            self.content_index = self.available_kinds().len().saturating_sub(1);
        } else {
            return Transition::Stayed;
        }

        self.reset_answer();
        Transition::Moved
    }

    pub fn select_answer(&mut self, index: usize) -> Result<(), ProgressError> {
        if self.current_kind() != ContentKind::Quiz {
            return Err(ProgressError::InvalidState("current content is not a quiz"));
        }
        if self.quiz_submitted {
            return Err(ProgressError::InvalidState("quiz already submitted"));
        }

        let options = self.current_quiz().map(|quiz| quiz.options.len()).unwrap_or(0);
        if index >= options {
            return Err(ProgressError::AnswerOutOfRange { index, options });
        }

        self.selected_answer = Some(index);
        Ok(())
    }

    /// Locks in the selected answer. Scoring happens on the following
    /// `advance`.
    pub fn submit_quiz(&mut self) -> Result<(), ProgressError> {
        if self.current_kind() != ContentKind::Quiz {
            return Err(ProgressError::InvalidState("current content is not a quiz"));
        }
        if self.quiz_submitted {
            return Err(ProgressError::InvalidState("quiz already submitted"));
        }
        if self.selected_answer.is_none() {
            return Err(ProgressError::QuizNotAnswered);
        }

        self.quiz_submitted = true;
        Ok(())
    }

    /// Free navigation within the current section. Completes nothing.
    pub fn jump_to_content(&mut self, index: usize) -> Result<(), ProgressError> {
        let len = self.available_kinds().len();
        if index >= len {
            return Err(ProgressError::ContentOutOfRange { index, len });
        }

        self.content_index = index;
        self.reset_answer();
        Ok(())
    }

    fn record_completion(&mut self, key: ContentKey, reward: u64) -> bool {
        if !self.progress.completed.insert(key) {
            return false;
        }

        self.progress.xp = self.progress.xp.saturating_add(reward);
        tracing::debug!(course = %self.course.id, %key, reward, "Content completed");
        true
    }

    fn persist(&mut self) {
        self.progress.save(&mut self.store, &self.course.id);
    }

    fn reset_answer(&mut self) {
        self.selected_answer = None;
        self.quiz_submitted = false;
    }
}

impl<S> CourseProgressEngine<S> {
    pub fn course(&self) -> &Course {
        &self.course
    }

    pub fn section_index(&self) -> usize {
        self.section_index
    }

    pub fn content_index(&self) -> usize {
        self.content_index
    }

    pub fn available_kinds(&self) -> &[ContentKind] {
        self.outline.kinds(self.section_index)
    }

    pub fn current_kind(&self) -> ContentKind {
        self.available_kinds()
            .get(self.content_index)
            .copied()
            .unwrap_or(ContentKind::Introduction)
    }

    pub fn selected_answer(&self) -> Option<usize> {
        self.selected_answer
    }

    pub fn quiz_submitted(&self) -> bool {
        self.quiz_submitted
    }

    pub fn xp(&self) -> u64 {
        self.progress.xp
    }

    pub fn completed(&self) -> &BTreeSet<ContentKey> {
        &self.progress.completed
    }

    pub fn is_course_completed(&self) -> bool {
        self.progress.is_course_completed()
    }

    pub fn level(&self) -> u64 {
        scoring::level(self.progress.xp)
    }

    pub fn level_progress(&self) -> f64 {
        scoring::level_progress(self.progress.xp)
    }

    pub fn overall_progress(&self) -> f64 {
        scoring::overall_progress(
            self.section_index,
            self.content_index,
            self.available_kinds().len(),
            self.outline.section_count(),
        )
    }

    /// The question asked by the current card, if it is a quiz.
    pub fn current_quiz(&self) -> Option<&QuizQuestion> {
        if self.current_kind() != ContentKind::Quiz {
            return None;
        }

        let ordinal = self.outline.quiz_ordinal(self.section_index, self.content_index);
        self.course
            .sections
            .get(self.section_index)
            .and_then(|section| section.quiz(ordinal))
    }

    /// Whether the submitted answer was right. `None` until a quiz is submitted.
    pub fn answer_correct(&self) -> Option<bool> {
        if !self.quiz_submitted {
            return None;
        }

        let quiz = self.current_quiz()?;
        Some(self.selected_answer == Some(quiz.correct_answer_index))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let section_title = self
            .course
            .sections
            .get(self.section_index)
            .map(|section| section.title.clone())
            .unwrap_or_default();

        ProgressSnapshot {
            course_id: self.course.id.clone(),
            section_index: self.section_index,
            section_title,
            content_index: self.content_index,
            content_kind: self.current_kind(),
            available_content_kinds: self.available_kinds().to_vec(),
            selected_answer: self.selected_answer,
            quiz_submitted: self.quiz_submitted,
            answer_correct: self.answer_correct(),
            quiz: self.current_quiz().map(PublicQuiz::from),
            xp: self.progress.xp,
            level: self.level(),
            level_progress: self.level_progress(),
            overall_progress: self.overall_progress(),
            completed: self
                .progress
                .completed
                .iter()
                .map(ContentKey::to_string)
                .collect(),
            course_completed: self.is_course_completed(),
        }
    }
}
