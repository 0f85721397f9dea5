// src/models/course.rs

use std::{
    collections::{BTreeMap, HashSet},
    sync::LazyLock,
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;
use validator::Validate;

use crate::engine::content::{ContentKind, CourseOutline, is_valid_sequence};

use super::progress::PublicQuiz;

/// Course and section ids are lowercase slugs; they become part of storage keys.
static SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap());

/// A course definition, as authored in the course catalog.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Course {
    /// Stable identifier. Also the namespace of the learner's stored progress.
    #[validate(length(min = 1, max = 64), regex(path = *SLUG))]
    pub id: String,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,

    /// Ordered sections; the order defines linear progression.
    #[validate(length(min = 1), nested)]
    pub sections: Vec<Section>,

    /// Hand-authored card sequences, keyed by section id. Consulted before the
    /// default derivation rule.
    #[serde(default)]
    pub content_overrides: BTreeMap<String, Vec<ContentKind>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Section {
    #[validate(length(min = 1, max = 64), regex(path = *SLUG))]
    pub id: String,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    /// Introduction card text.
    #[serde(default)]
    #[validate(length(max = 20000))]
    pub introduction: String,

    #[serde(default)]
    pub key_points: Vec<String>,

    #[validate(custom(function = validate_url_string))]
    pub video_url: Option<String>,

    #[serde(default)]
    #[validate(custom(function = validate_url_string))]
    pub short_video_url: Option<String>,

    #[serde(default)]
    #[validate(custom(function = validate_url_string))]
    pub image_url: Option<String>,

    /// Interactive visualisation shown on the playground card.
    #[serde(default)]
    #[validate(custom(function = validate_url_string))]
    pub playground_url: Option<String>,

    #[serde(default)]
    #[validate(custom(function = validate_url_list))]
    pub bonus_videos: Vec<String>,

    #[serde(default)]
    #[validate(custom(function = validate_url_list))]
    pub fun_fact_links: Vec<String>,

    #[serde(default)]
    #[validate(custom(function = validate_url_string))]
    pub gallery_url: Option<String>,

    #[validate(length(min = 1), nested)]
    pub quizzes: Vec<QuizQuestion>,
}

impl Section {
    /// The question for the `ordinal`-th quiz card. Sections with more quiz
    /// cards than questions reuse the last question.
    pub fn quiz(&self, ordinal: usize) -> Option<&QuizQuestion> {
        self.quizzes.get(ordinal).or_else(|| self.quizzes.last())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuizQuestion {
    #[validate(length(min = 1, max = 1000))]
    pub question: String,

    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,

    pub correct_answer_index: usize,

    #[serde(default)]
    #[validate(length(max = 2000))]
    pub explanation: Option<String>,
}

impl Course {
    /// Cross-field checks that field validators cannot express: unique
    /// section ids, answer indices inside their option lists, and overrides
    /// that name real sections with usable card sequences.
    pub fn check_structure(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for section in &self.sections {
            if !seen.insert(section.id.as_str()) {
                return Err(format!("duplicate section id '{}'", section.id));
            }

            for (i, quiz) in section.quizzes.iter().enumerate() {
                if quiz.correct_answer_index >= quiz.options.len() {
                    return Err(format!(
                        "section '{}' quiz {}: correct answer {} is outside {} options",
                        section.id,
                        i,
                        quiz.correct_answer_index,
                        quiz.options.len()
                    ));
                }
            }
        }

        for (section_id, kinds) in &self.content_overrides {
            if !seen.contains(section_id.as_str()) {
                return Err(format!("override for unknown section '{}'", section_id));
            }
            if !is_valid_sequence(kinds) {
                return Err(format!(
                    "override for section '{}' must be non-empty and end in a quiz",
                    section_id
                ));
            }
        }

        Ok(())
    }
}

/// Validates that a string is a correctly formatted URL.
fn validate_url_string(url: &str) -> Result<(), validator::ValidationError> {
    if url.len() > 500 {
        return Err(validator::ValidationError::new("url_too_long"));
    }
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}

fn validate_url_list(urls: &[String]) -> Result<(), validator::ValidationError> {
    for url in urls {
        validate_url_string(url)?;
    }
    Ok(())
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 {
        return Err(validator::ValidationError::new("quiz_needs_two_options"));
    }
    for opt in options {
        if opt.is_empty() || opt.len() > 500 {
            return Err(validator::ValidationError::new("invalid_option_length"));
        }
    }
    Ok(())
}

/// Catalog listing entry.
#[derive(Debug, Serialize, ToSchema)]
pub struct CourseSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub section_count: usize,
    pub content_count: usize,
}

/// DTO for one course with its resolved card sequences (answers hidden).
#[derive(Debug, Serialize, ToSchema)]
pub struct CourseDetail {
    pub id: String,
    pub title: String,
    pub description: String,
    pub sections: Vec<SectionView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SectionView {
    pub id: String,
    pub title: String,
    pub introduction: String,
    pub key_points: Vec<String>,
    pub content_kinds: Vec<ContentKind>,
    pub video_url: Option<String>,
    pub short_video_url: Option<String>,
    pub image_url: Option<String>,
    pub playground_url: Option<String>,
    pub bonus_videos: Vec<String>,
    pub fun_fact_links: Vec<String>,
    pub gallery_url: Option<String>,
    pub quizzes: Vec<PublicQuiz>,
}

impl From<&Course> for CourseSummary {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id.clone(),
            title: course.title.clone(),
            description: course.description.clone(),
            section_count: course.sections.len(),
            content_count: CourseOutline::resolve(course).total_items(),
        }
    }
}

impl From<&Course> for CourseDetail {
    fn from(course: &Course) -> Self {
        let outline = CourseOutline::resolve(course);
        let sections = course
            .sections
            .iter()
            .enumerate()
            .map(|(i, section)| SectionView {
                id: section.id.clone(),
                title: section.title.clone(),
                introduction: section.introduction.clone(),
                key_points: section.key_points.clone(),
                content_kinds: outline.kinds(i).to_vec(),
                video_url: section.video_url.clone(),
                short_video_url: section.short_video_url.clone(),
                image_url: section.image_url.clone(),
                playground_url: section.playground_url.clone(),
                bonus_videos: section.bonus_videos.clone(),
                fun_fact_links: section.fun_fact_links.clone(),
                gallery_url: section.gallery_url.clone(),
                quizzes: section.quizzes.iter().map(PublicQuiz::from).collect(),
            })
            .collect();

        Self {
            id: course.id.clone(),
            title: course.title.clone(),
            description: course.description.clone(),
            sections,
        }
    }
}
