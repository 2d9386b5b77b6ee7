//! crates/story_engine_core/src/title.rs
//!
//! Splits raw backend output into a title and a body. Backends are asked to put
//! "Chapter N: <Title>" on the first line, but that is not trusted.

use crate::domain::ChapterDraft;

/// Candidate title lines must be shorter than this many characters.
pub const MAX_TITLE_CHARS: usize = 70;

/// The title used when no usable title line is found.
pub fn default_title(chapter_number: u32) -> String {
    format!("Chapter {chapter_number}: A New Adventure")
}

fn clean_title_line(line: &str) -> &str {
    line.trim()
        .trim_start_matches(['#', '*', '_', ' '])
        .trim_end_matches(['*', '_', ' '])
        .trim()
        .trim_matches('"')
        .trim()
}

fn looks_like_title(line: &str) -> bool {
    !line.is_empty()
        && line.chars().count() < MAX_TITLE_CHARS
        && (line.to_lowercase().contains("chapter") || line.contains(':'))
}

/// Extracts the title heuristically from the first non-blank line.
///
/// When that line is used as the title it is removed from the body; otherwise the
/// whole text is kept as the body under a generic title.
pub fn extract_title(raw: &str, chapter_number: u32) -> ChapterDraft {
    let text = raw.trim();
    let mut lines = text.lines();
    let first = lines.next().map(clean_title_line).unwrap_or_default();

    if looks_like_title(first) {
        let content = lines.collect::<Vec<_>>().join("\n").trim().to_string();
        ChapterDraft {
            title: first.to_string(),
            content,
        }
    } else {
        ChapterDraft {
            title: default_title(chapter_number),
            content: text.to_string(),
        }
    }
}
