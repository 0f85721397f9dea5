// src/session.rs

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    engine::{CourseProgressEngine, ProgressError, Transition},
    persistence::BufferedStore,
};

pub type LiveEngine = CourseProgressEngine<BufferedStore>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub learner_id: String,
    pub course_id: String,
}

impl SessionKey {
    pub fn new(learner_id: &str, course_id: &str) -> Self {
        Self {
            learner_id: learner_id.to_owned(),
            course_id: course_id.to_owned(),
        }
    }
}

/// A learner intent against the open course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Advance,
    GoBack,
    SelectAnswer(usize),
    SubmitQuiz,
    JumpToContent(usize),
}

impl Intent {
    pub fn apply(self, engine: &mut LiveEngine) -> Result<Transition, ProgressError> {
        match self {
            Intent::Advance => engine.advance(),
            Intent::GoBack => Ok(engine.go_back()),
            Intent::SelectAnswer(index) => engine.select_answer(index).map(|_| Transition::Stayed),
            Intent::SubmitQuiz => engine.submit_quiz().map(|_| Transition::Submitted),
            Intent::JumpToContent(index) => {
                engine.jump_to_content(index).map(|_| Transition::Moved)
            }
        }
    }
}

/// Shared handle to one live engine.
///
/// The async lock is held for the whole intent, flush included, so writes for
/// one session reach the database in the order the intents were applied.
pub type SessionHandle = Arc<tokio::sync::Mutex<LiveEngine>>;

/// Live engines, at most one per (learner, course).
///
/// The registry lock only guards the map and is never held across an await
/// point. Engine state is guarded per session by [`SessionHandle`].
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionKey, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionKey, SessionHandle>> {
        // The map is never left half-updated; poisoning is ignored.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Installs an engine, replacing any previous one for the same key.
    pub fn open(&self, key: SessionKey, engine: LiveEngine) {
        let handle = Arc::new(tokio::sync::Mutex::new(engine));
        if self.lock().insert(key.clone(), handle).is_some() {
            tracing::debug!(
                learner = %key.learner_id,
                course = %key.course_id,
                "Replaced open course session"
            );
        }
    }

    pub fn close(&self, key: &SessionKey) -> bool {
        self.lock().remove(key).is_some()
    }

    /// The live engine for `key`, if a session is open.
    pub fn get(&self, key: &SessionKey) -> Option<SessionHandle> {
        self.lock().get(key).cloned()
    }
}
