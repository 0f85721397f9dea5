// src/engine/scoring.rs

use super::content::ContentKind;

pub const XP_PER_LEVEL: u64 = 50;

/// One-time reward for finishing the last card of a course.
pub const COMPLETION_BONUS: u64 = 50;

pub const CORRECT_QUIZ_XP: u64 = 20;
pub const PLAYGROUND_XP: u64 = 15;
pub const VIDEO_XP: u64 = 10;
pub const DEFAULT_XP: u64 = 5;

/// XP earned for completing a card. A quiz only pays the full reward when it
/// was answered correctly; a wrong answer earns the default amount.
pub fn reward_for(kind: ContentKind, answered_correctly: bool) -> u64 {
    match kind {
        ContentKind::Quiz if answered_correctly => CORRECT_QUIZ_XP,
        ContentKind::Playground => PLAYGROUND_XP,
        ContentKind::Video => VIDEO_XP,
        _ => DEFAULT_XP,
    }
}

pub fn level(xp: u64) -> u64 {
    xp / XP_PER_LEVEL + 1
}

/// Percentage through the current level band.
pub fn level_progress(xp: u64) -> f64 {
    let into_level = xp - (level(xp) - 1) * XP_PER_LEVEL;
    into_level as f64 / XP_PER_LEVEL as f64 * 100.0
}

/// Display-only course progress percentage. Reaches 100 on the last card of
/// the last section.
pub fn overall_progress(
    section_index: usize,
    content_index: usize,
    section_len: usize,
    section_count: usize,
) -> f64 {
    if section_len == 0 || section_count == 0 {
        return 0.0;
    }

    let within_section = (content_index + 1) as f64 * 100.0 / section_len as f64;
    (section_index as f64 * 100.0 + within_section) / section_count as f64
}
