//! crates/story_engine_core/src/safety.rs
//!
//! Local content-safety gate applied to every candidate chapter, whichever
//! backend produced it. A coarse keyword check; it never calls out to a service.

use regex::Regex;
use std::sync::OnceLock;

/// Stems associated with violence, fear, danger and anger. Any word that
/// starts with one of them is rejected, so "fights", "killer" and
/// "screaming" are caught along with the stem itself.
pub const DENYLIST_STEMS: &[&str] = &[
    // violence
    "kill", "murder", "blood", "weapon", "knife", "knives", "attack", "fight", "hurt", "death",
    // fear
    "terrif", "terror", "horror", "nightmare", "frighten", "scream",
    // danger
    "danger", "explod", "explosi",
    // anger
    "angr", "enrag", "furious", "hate", "hatred",
];

/// Short terms whose stems would also catch gentle words ("diet", "warm",
/// "stable"), so only these exact forms are rejected.
pub const DENYLIST_WORDS: &[&str] = &[
    "gun", "guns", "gunfire", "stab", "stabs", "stabbed", "stabbing", "wound", "wounds",
    "wounded", "war", "wars", "warfare", "dead", "deadly", "die", "dies", "died", "dying",
    "scare", "scared", "scares", "scaring", "scary", "scarier", "scariest", "rage", "rages",
    "raged", "raging",
];

/// Gentle words that happen to start with a denylisted stem.
const ALLOWED_WORDS: &[&str] = &[
    "terrific", "terrifically", "hurtle", "hurtles", "hurtled", "hurtling",
];

fn alternatives(terms: &[&str]) -> String {
    terms
        .iter()
        .map(|term| regex::escape(term))
        .collect::<Vec<_>>()
        .join("|")
}

fn denylist_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let stems = alternatives(DENYLIST_STEMS);
        let words = alternatives(DENYLIST_WORDS);
        Regex::new(&format!(r"(?i)\b(?:(?:{stems})\w*|(?:{words})\b)"))
            .expect("denylist compiles to a valid regex")
    })
}

/// Returns the first denylisted word found in `text`, lowercased.
pub fn find_unsafe_term(text: &str) -> Option<String> {
    denylist_pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .find(|word| !ALLOWED_WORDS.contains(&word.as_str()))
}

/// True when `text` contains none of the denylisted terms.
pub fn is_safe(text: &str) -> bool {
    find_unsafe_term(text).is_none()
}
