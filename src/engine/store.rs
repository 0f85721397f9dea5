// src/engine/store.rs

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    str::FromStr,
};

/// Sentinel completion key recorded once the final card of a course is done.
pub const COURSE_COMPLETE_KEY: &str = "course-complete";

/// Key-value capability the engine writes progress through.
///
/// Writes are synchronous from the engine's point of view; what "durable"
/// means is up to the implementation.
pub trait PersistenceStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
}

/// Plain in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }
}

impl FromIterator<(String, String)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl PersistenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_owned(), value);
    }
}

/// Identifies one completed card, or the whole course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContentKey {
    Item { section: usize, content: usize },
    CourseComplete,
}

impl ContentKey {
    pub fn item(section: usize, content: usize) -> Self {
        ContentKey::Item { section, content }
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKey::Item { section, content } => write!(f, "{}-{}", section, content),
            ContentKey::CourseComplete => f.write_str(COURSE_COMPLETE_KEY),
        }
    }
}

impl FromStr for ContentKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == COURSE_COMPLETE_KEY {
            return Ok(ContentKey::CourseComplete);
        }

        let (section, content) = s
            .split_once('-')
            .ok_or_else(|| format!("malformed content key '{}'", s))?;

        let section = section
            .parse()
            .map_err(|_| format!("malformed section index in '{}'", s))?;
        let content = content
            .parse()
            .map_err(|_| format!("malformed content index in '{}'", s))?;

        Ok(ContentKey::Item { section, content })
    }
}

pub fn xp_key(course_id: &str) -> String {
    format!("{}-xp", course_id)
}

pub fn completed_key(course_id: &str) -> String {
    format!("{}-completed", course_id)
}

/// Decodes a stored XP value. Anything that is not a non-negative integer
/// counts as absent.
pub fn decode_xp(raw: Option<&str>) -> u64 {
    let Some(raw) = raw else {
        return 0;
    };

    match raw.trim().parse::<u64>() {
        Ok(xp) => xp,
        Err(_) => {
            tracing::warn!(value = raw, "Ignoring malformed stored XP");
            0
        }
    }
}

/// Decodes a stored completion list (a JSON array of content keys).
pub fn decode_completed(raw: Option<&str>) -> BTreeSet<ContentKey> {
    let Some(raw) = raw else {
        return BTreeSet::new();
    };

    let entries: Vec<String> = match serde_json::from_str(raw) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Ignoring malformed stored completion list: {}", e);
            return BTreeSet::new();
        }
    };

    entries
        .iter()
        .filter_map(|entry| match entry.parse::<ContentKey>() {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!("Dropping stored completion entry: {}", e);
                None
            }
        })
        .collect()
}

pub fn encode_completed(completed: &BTreeSet<ContentKey>) -> String {
    let entries: Vec<serde_json::Value> = completed
        .iter()
        .map(|key| serde_json::Value::String(key.to_string()))
        .collect();

    serde_json::Value::Array(entries).to_string()
}

/// The durable part of a learner's progress through one course.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedProgress {
    pub xp: u64,
    pub completed: BTreeSet<ContentKey>,
}

impl PersistedProgress {
    pub fn load<S: PersistenceStore + ?Sized>(store: &S, course_id: &str) -> Self {
        let xp = decode_xp(store.get(&xp_key(course_id)).as_deref());
        let completed = decode_completed(store.get(&completed_key(course_id)).as_deref());

        Self { xp, completed }
    }

    pub fn save<S: PersistenceStore + ?Sized>(&self, store: &mut S, course_id: &str) {
        store.set(&xp_key(course_id), self.xp.to_string());
        store.set(&completed_key(course_id), encode_completed(&self.completed));
    }

    pub fn is_course_completed(&self) -> bool {
        self.completed.contains(&ContentKey::CourseComplete)
    }

    /// Completed cards, not counting the course sentinel.
    pub fn completed_items(&self) -> usize {
        self.completed
            .iter()
            .filter(|key| matches!(key, ContentKey::Item { .. }))
            .count()
    }
}
