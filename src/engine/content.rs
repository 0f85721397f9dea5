// src/engine/content.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::course::{Course, Section};

/// The type tag of one learning card within a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ContentKind {
    Introduction,
    Video,
    KeyPoints,
    ShortVideo,
    Image,
    Quiz,
    Bonus,
    Playground,
    FunFacts,
    VisualGallery,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Introduction => "introduction",
            ContentKind::Video => "video",
            ContentKind::KeyPoints => "keyPoints",
            ContentKind::ShortVideo => "shortVideo",
            ContentKind::Image => "image",
            ContentKind::Quiz => "quiz",
            ContentKind::Bonus => "bonus",
            ContentKind::Playground => "playground",
            ContentKind::FunFacts => "funFacts",
            ContentKind::VisualGallery => "visualGallery",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A usable card sequence is non-empty and ends in a quiz.
pub fn is_valid_sequence(kinds: &[ContentKind]) -> bool {
    kinds.last() == Some(&ContentKind::Quiz)
}

/// Derives the ordered card sequence for a section.
///
/// A hand-authored override wins when it is a valid sequence. Otherwise the
/// sequence is `[introduction, video]`, followed by whichever optional cards the
/// section carries media for (in a fixed order), and always closed by `quiz`.
pub fn derive_content_kinds(
    section: &Section,
    override_kinds: Option<&[ContentKind]>,
) -> Vec<ContentKind> {
    if let Some(kinds) = override_kinds {
        if is_valid_sequence(kinds) {
            return kinds.to_vec();
        }
        tracing::warn!(
            section = %section.id,
            "Ignoring content override that does not end in a quiz"
        );
    }

    let mut kinds = vec![ContentKind::Introduction, ContentKind::Video];

    if section.short_video_url.is_some() {
        kinds.push(ContentKind::ShortVideo);
    }
    if section.image_url.is_some() {
        kinds.push(ContentKind::Image);
    }
    if section.playground_url.is_some() {
        kinds.push(ContentKind::Playground);
    }
    if !section.bonus_videos.is_empty() {
        kinds.push(ContentKind::Bonus);
    }
    if !section.fun_fact_links.is_empty() {
        kinds.push(ContentKind::FunFacts);
    }
    if section.gallery_url.is_some() {
        kinds.push(ContentKind::VisualGallery);
    }

    kinds.push(ContentKind::Quiz);
    kinds
}

/// Card sequences of every section of a course, resolved once when the course
/// is opened.
#[derive(Debug, Clone)]
pub struct CourseOutline {
    sections: Vec<Vec<ContentKind>>,
}

impl CourseOutline {
    pub fn resolve(course: &Course) -> Self {
        let sections = course
            .sections
            .iter()
            .map(|section| {
                let override_kinds = course
                    .content_overrides
                    .get(&section.id)
                    .map(|kinds| kinds.as_slice());
                derive_content_kinds(section, override_kinds)
            })
            .collect();

        Self { sections }
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Card kinds of a section. Empty for an out-of-range index.
    pub fn kinds(&self, section: usize) -> &[ContentKind] {
        self.sections
            .get(section)
            .map(|kinds| kinds.as_slice())
            .unwrap_or(&[])
    }

    /// Number of cards across all sections.
    pub fn total_items(&self) -> usize {
        self.sections.iter().map(Vec::len).sum()
    }

    /// How many quiz cards precede `content` in the section. Selects which of
    /// the section's questions a quiz card asks.
    pub fn quiz_ordinal(&self, section: usize, content: usize) -> usize {
        self.kinds(section)
            .iter()
            .take(content)
            .filter(|kind| **kind == ContentKind::Quiz)
            .count()
    }
}
