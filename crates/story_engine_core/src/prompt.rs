//! crates/story_engine_core/src/prompt.rs
//!
//! Assembles the backend-agnostic `GenerationRequest` for a chapter: tone for the
//! child's age bracket, a length policy that depends on the time of day, and the
//! continuity context carried forward from the previous chapter.

use crate::domain::{AgeBracket, ChapterKind, ChildProfile, GenerationRequest, LengthPolicy};

/// From this local hour onward chapters are written as longer bedtime stories.
pub const BEDTIME_HOUR: u32 = 18;

pub const ORIGIN_TASK_FRAMING: &str =
    "Start the story by celebrating these first real-world accomplishments";
pub const ORIGIN_NO_TASKS: &str = "Begin the adventure";
pub const CONTINUATION_TASK_FRAMING: &str =
    "Weave these newly completed real-world tasks into the next part of the adventure";
pub const CONTINUATION_NO_TASKS: &str = "Continue the adventure";

const SYSTEM_INSTRUCTIONS: &str = r#"You are a warm, imaginative storyteller writing a serialized adventure for a child, one chapter at a time.

Rules for every chapter:
- Keep it kind, cheerful and reassuring. No violence and nothing that could upset a young child.
- The child is the hero of the story and real chores they finish become heroic deeds in the story world.
- Write in plain prose. No lists, no markdown headings, no notes to the reader.
- The FIRST line must be the title, in exactly this form: "Chapter {number}: <Title>".
- After the title line, write the chapter itself."#;

/// Chooses the length policy for the given local hour (0-23).
pub fn length_policy_for_hour(local_hour: u32) -> LengthPolicy {
    if local_hour >= BEDTIME_HOUR {
        LengthPolicy::Bedtime
    } else {
        LengthPolicy::Short
    }
}

fn tone_guidance(age_bracket: AgeBracket) -> &'static str {
    match age_bracket {
        AgeBracket::Preschool => {
            "Use very simple words and short sentences that a 3 to 5 year old can follow. \
             Gentle repetition and playful sound words are welcome. Keep paragraphs to two or three sentences."
        }
        AgeBracket::EarlyReader => {
            "Use clear, everyday vocabulary for a 6 to 8 year old, with the occasional fun new word \
             explained by context. Use short paragraphs of three or four sentences."
        }
        AgeBracket::Independent => {
            "Write for a confident 9 to 12 year old reader: richer vocabulary, some dialogue and a light \
             touch of mystery. Paragraphs may run to five or six sentences."
        }
    }
}

fn length_guidance(length: LengthPolicy, child_name: &str) -> String {
    match length {
        LengthPolicy::Short => {
            "Length: 100-200 words. Make it a short, punchy update full of energy.".to_string()
        }
        LengthPolicy::Bedtime => format!(
            "Length: 300-500 words. It is evening, so close with a calming, cozy resolution that helps {child_name} wind down for sleep."
        ),
    }
}

fn task_section(kind: ChapterKind, task_titles: &[String], child_name: &str) -> String {
    if task_titles.is_empty() {
        return match kind {
            ChapterKind::Origin => format!(
                "{ORIGIN_NO_TASKS}: introduce {child_name} and the world they are about to explore."
            ),
            ChapterKind::Continuation => {
                format!("{CONTINUATION_NO_TASKS} with a fresh discovery for {child_name}.")
            }
        };
    }

    let list = task_titles
        .iter()
        .map(|title| format!("- {title}"))
        .collect::<Vec<_>>()
        .join("\n");
    let framing = match kind {
        ChapterKind::Origin => ORIGIN_TASK_FRAMING,
        ChapterKind::Continuation => CONTINUATION_TASK_FRAMING,
    };
    format!("{framing} that {child_name} just completed:\n{list}")
}

/// Builds the request for `chapter_number`.
///
/// Chapter 1 is an origin chapter unless a non-blank `continuity_tail` is
/// given. Every later chapter is a continuation, with or without a tail, so a
/// missing previous chapter never restarts the story.
pub fn build_request(
    profile: &ChildProfile,
    completed_task_titles: &[String],
    continuity_tail: Option<String>,
    chapter_number: u32,
    local_hour: u32,
) -> GenerationRequest {
    let continuity_tail = continuity_tail.filter(|tail| !tail.trim().is_empty());
    let kind = if continuity_tail.is_some() || chapter_number > 1 {
        ChapterKind::Continuation
    } else {
        ChapterKind::Origin
    };
    let length = length_policy_for_hour(local_hour);
    let task_titles: Vec<String> = completed_task_titles
        .iter()
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .collect();
    let name = profile.name.as_str();

    let opening = match (&kind, &continuity_tail) {
        (ChapterKind::Continuation, Some(tail)) => format!(
            "This is chapter {chapter_number}, a continuation of an ongoing story set in {setting}. \
             Do not re-introduce {name} and do not restart the setting; pick up right where the previous chapter left off.\n\n\
             The previous chapter began:\n\"\"\"\n{tail}\n\"\"\"",
            setting = profile.theme.setting(),
        ),
        (ChapterKind::Continuation, None) => format!(
            "This is chapter {chapter_number}, a continuation of an ongoing story set in {setting}. \
             Do not re-introduce {name} and do not restart the setting; carry the adventure forward from where it last left off.",
            setting = profile.theme.setting(),
        ),
        (ChapterKind::Origin, _) => format!(
            "This is chapter {chapter_number}, the very first chapter of a new story. \
             {name} is the hero, and the story is set in {setting}.",
            setting = profile.theme.setting(),
        ),
    };

    let prompt = [
        opening,
        task_section(kind, &task_titles, name),
        tone_guidance(profile.age_bracket).to_string(),
        length_guidance(length, name),
        format!("Remember: the first line must be \"Chapter {chapter_number}: <Title>\"."),
    ]
    .join("\n\n");

    GenerationRequest {
        child_name: profile.name.clone(),
        age_bracket: profile.age_bracket,
        theme: profile.theme,
        task_titles,
        continuity_tail,
        chapter_number,
        kind,
        length,
        system_prompt: SYSTEM_INSTRUCTIONS.replace("{number}", &chapter_number.to_string()),
        prompt,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Theme;
    use uuid::Uuid;

    fn mia() -> ChildProfile {
        ChildProfile {
            id: Uuid::new_v4(),
            name: "Mia".to_string(),
            age_bracket: AgeBracket::EarlyReader,
            theme: Theme::SpaceAdventure,
        }
    }

    #[test]
    fn first_chapter_with_tasks_uses_origin_framing() {
        let request = build_request(&mia(), &["Feed the cat".to_string()], None, 1, 10);

        assert_eq!(request.kind, ChapterKind::Origin);
        assert_eq!(request.chapter_number, 1);
        assert_eq!(request.length, LengthPolicy::Short);
        assert!(request.prompt.contains(ORIGIN_TASK_FRAMING));
        assert!(request.prompt.contains("Feed the cat"));
        assert!(request.prompt.contains("100-200 words"));
        assert!(!request.prompt.contains(ORIGIN_NO_TASKS));
        assert!(request.system_prompt.contains("Chapter 1: <Title>"));
    }

    #[test]
    fn first_chapter_without_tasks_begins_the_adventure() {
        let request = build_request(&mia(), &[], None, 1, 9);

        assert_eq!(request.kind, ChapterKind::Origin);
        assert!(request.prompt.contains(ORIGIN_NO_TASKS));
        assert!(!request.prompt.contains(ORIGIN_TASK_FRAMING));
    }

    #[test]
    fn continuity_tail_marks_a_continuation() {
        let tail = "Mia floated past the rings of a purple planet.".to_string();
        let request = build_request(&mia(), &["Tidy room".to_string()], Some(tail.clone()), 4, 12);

        assert_eq!(request.kind, ChapterKind::Continuation);
        assert_eq!(request.continuity_tail.as_deref(), Some(tail.as_str()));
        assert!(request.prompt.contains(&tail));
        assert!(request.prompt.contains("Do not re-introduce Mia"));
        assert!(request.prompt.contains(CONTINUATION_TASK_FRAMING));
    }

    #[test]
    fn continuation_without_tasks_continues_the_adventure() {
        let request = build_request(&mia(), &[], Some("Earlier...".to_string()), 2, 8);
        assert!(request.prompt.contains(CONTINUATION_NO_TASKS));
        assert!(!request.prompt.contains(ORIGIN_NO_TASKS));
    }

    #[test]
    fn later_chapters_continue_even_without_a_tail() {
        let request = build_request(&mia(), &[], None, 3, 10);

        assert_eq!(request.kind, ChapterKind::Continuation);
        assert!(request.continuity_tail.is_none());
        assert!(request.prompt.contains("Do not re-introduce Mia"));
        assert!(request.prompt.contains(CONTINUATION_NO_TASKS));
        assert!(!request.prompt.contains("very first chapter"));
        assert!(!request.prompt.contains("The previous chapter began"));
    }

    #[test]
    fn blank_tail_is_treated_as_origin() {
        let request = build_request(&mia(), &[], Some("   ".to_string()), 1, 8);
        assert_eq!(request.kind, ChapterKind::Origin);
        assert!(request.continuity_tail.is_none());
    }

    #[test]
    fn evening_requests_run_longer_with_a_calm_close() {
        let evening = build_request(&mia(), &[], None, 1, 18);
        assert_eq!(evening.length, LengthPolicy::Bedtime);
        assert!(evening.prompt.contains("300-500 words"));
        assert!(evening.prompt.contains("calming"));

        let afternoon = build_request(&mia(), &[], None, 1, 17);
        assert_eq!(afternoon.length, LengthPolicy::Short);
        assert!(afternoon.prompt.contains("100-200 words"));
        assert!(afternoon.prompt.contains("punchy"));
    }

    #[test]
    fn tone_follows_the_age_bracket() {
        let mut profile = mia();
        profile.age_bracket = AgeBracket::Preschool;
        let young = build_request(&profile, &[], None, 1, 10);
        profile.age_bracket = AgeBracket::Independent;
        let older = build_request(&profile, &[], None, 1, 10);

        assert!(young.prompt.contains("3 to 5 year old"));
        assert!(older.prompt.contains("9 to 12 year old"));
    }

    #[test]
    fn blank_task_titles_are_dropped() {
        let request = build_request(&mia(), &["  ".to_string()], None, 1, 10);
        assert!(request.task_titles.is_empty());
        assert!(request.prompt.contains(ORIGIN_NO_TASKS));
    }
}
