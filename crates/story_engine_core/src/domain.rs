//! crates/story_engine_core/src/domain.rs
//!
//! Defines the pure, core data structures for the story engine.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Themes and Age Brackets
//=========================================================================================

/// Returned when a stored theme or age bracket string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseDomainError {
    pub kind: &'static str,
    pub value: String,
}

/// The narrative setting a child's story progression belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Theme {
    SpaceAdventure,
    MagicalForest,
    OceanExplorer,
    DinosaurValley,
    SuperheroCity,
}

impl Theme {
    pub const ALL: [Theme; 5] = [
        Theme::SpaceAdventure,
        Theme::MagicalForest,
        Theme::OceanExplorer,
        Theme::DinosaurValley,
        Theme::SuperheroCity,
    ];

    /// The identifier used for storage and over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::SpaceAdventure => "space_adventure",
            Theme::MagicalForest => "magical_forest",
            Theme::OceanExplorer => "ocean_explorer",
            Theme::DinosaurValley => "dinosaur_valley",
            Theme::SuperheroCity => "superhero_city",
        }
    }

    /// A short description of the setting, used when prompting a backend.
    pub fn setting(&self) -> &'static str {
        match self {
            Theme::SpaceAdventure => "a space adventure among friendly planets and twinkling stars",
            Theme::MagicalForest => "a magical forest full of talking animals and glowing flowers",
            Theme::OceanExplorer => "an undersea voyage past coral reefs and curious sea creatures",
            Theme::DinosaurValley => "a sunny valley where gentle dinosaurs still roam",
            Theme::SuperheroCity => "a bright city where young heroes help their neighbours",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Theme::ALL
            .into_iter()
            .find(|theme| theme.as_str() == s.trim())
            .ok_or_else(|| ParseDomainError {
                kind: "theme",
                value: s.to_string(),
            })
    }
}

/// The three reading tiers that drive tone and vocabulary guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeBracket {
    /// Ages 3 to 5.
    Preschool,
    /// Ages 6 to 8.
    EarlyReader,
    /// Ages 9 to 12.
    Independent,
}

impl AgeBracket {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeBracket::Preschool => "3-5",
            AgeBracket::EarlyReader => "6-8",
            AgeBracket::Independent => "9-12",
        }
    }

    /// Buckets an age in years. Anything under 6 is treated as preschool and
    /// anything over 8 as an independent reader.
    pub fn from_age(age: u8) -> Self {
        match age {
            0..=5 => AgeBracket::Preschool,
            6..=8 => AgeBracket::EarlyReader,
            _ => AgeBracket::Independent,
        }
    }
}

impl fmt::Display for AgeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgeBracket {
    type Err = ParseDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "3-5" => Ok(AgeBracket::Preschool),
            "6-8" => Ok(AgeBracket::EarlyReader),
            "9-12" => Ok(AgeBracket::Independent),
            other => other
                .parse::<u8>()
                .map(AgeBracket::from_age)
                .map_err(|_| ParseDomainError {
                    kind: "age bracket",
                    value: s.to_string(),
                }),
        }
    }
}

//=========================================================================================
// Persisted Records
//=========================================================================================

/// The attributes of a child that the engine needs to write their story.
#[derive(Debug, Clone)]
pub struct ChildProfile {
    pub id: Uuid,
    pub name: String,
    pub age_bracket: AgeBracket,
    pub theme: Theme,
}

/// One persisted unit of serialized narrative content.
///
/// Immutable once created, apart from `is_read`.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub id: Uuid,
    pub child_id: Uuid,
    pub theme: Theme,
    pub chapter_number: u32,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub unlocked_at: DateTime<Utc>,
    pub is_read: bool,
    /// True when the body came from the curated table rather than a backend.
    pub fallback_used: bool,
}

/// Cached per-(child, theme) counters. Advisory only: numbering is always
/// recomputed from the chapters themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub child_id: Uuid,
    pub theme: Theme,
    pub current_chapter: u32,
    pub total_chapters_unlocked: u32,
}

//=========================================================================================
// Transient Generation Types
//=========================================================================================

/// Whether a chapter starts the story or carries on from a previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterKind {
    Origin,
    Continuation,
}

/// How long the backend is asked to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPolicy {
    /// 100 to 200 words, an upbeat daytime update.
    Short,
    /// 300 to 500 words with a calming close, used from 18:00 local time.
    Bedtime,
}

/// A backend-agnostic description of the chapter to write.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub child_name: String,
    pub age_bracket: AgeBracket,
    pub theme: Theme,
    pub task_titles: Vec<String>,
    pub continuity_tail: Option<String>,
    pub chapter_number: u32,
    pub kind: ChapterKind,
    pub length: LengthPolicy,
    /// Standing instructions (tone, safety, title convention).
    pub system_prompt: String,
    /// The chapter-specific narrative prompt.
    pub prompt: String,
}

/// The title and body produced for a chapter, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterDraft {
    pub title: String,
    pub content: String,
}

/// The outcome of running the fallback tiers for one request.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub success: bool,
    pub chapter: Option<ChapterDraft>,
    /// Summary of every tier failure seen before the winning tier.
    pub error: Option<String>,
    pub fallback_used: bool,
    /// Name of the backend that produced the chapter, if any did.
    pub backend: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_identifiers_parse_back() {
        for theme in Theme::ALL {
            assert_eq!(theme.as_str().parse::<Theme>().unwrap(), theme);
        }
        assert!("haunted_castle".parse::<Theme>().is_err());
    }

    #[test]
    fn age_bracket_accepts_ranges_and_plain_ages() {
        assert_eq!("3-5".parse::<AgeBracket>().unwrap(), AgeBracket::Preschool);
        assert_eq!("7".parse::<AgeBracket>().unwrap(), AgeBracket::EarlyReader);
        assert_eq!("11".parse::<AgeBracket>().unwrap(), AgeBracket::Independent);
        assert!("toddler".parse::<AgeBracket>().is_err());
    }
}
