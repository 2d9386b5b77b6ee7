//! crates/story_engine_core/src/progress.rs
//!
//! Chapter numbering and per-theme progress counters.
//!
//! The chapter history is the source of truth for numbering. The progress record
//! is a cache for display and may lag behind after a partial failure; numbering
//! heals itself because it never reads that cache.

use crate::domain::Theme;
use crate::ports::{PortResult, ProfileStore};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Maximum number of characters of the previous chapter carried forward.
pub const CONTINUITY_TAIL_CHARS: usize = 600;

/// Returns a prefix of `body` holding at most `max_chars` characters.
pub fn bounded_prefix(body: &str, max_chars: usize) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => trimmed[..cut].trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

#[derive(Clone)]
pub struct ProgressTracker {
    store: Arc<dyn ProfileStore>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// `max(existing chapter number) + 1`, or 1 for a new story.
    pub async fn next_chapter_number(&self, child_id: Uuid, theme: Theme) -> PortResult<u32> {
        let max = self.store.get_max_chapter_number(child_id, theme).await?;
        Ok(max + 1)
    }

    /// The opening of the chapter before `chapter_number`, or `None` for chapter 1.
    pub async fn continuity_tail(
        &self,
        child_id: Uuid,
        theme: Theme,
        chapter_number: u32,
    ) -> PortResult<Option<String>> {
        if chapter_number <= 1 {
            return Ok(None);
        }
        let previous = chapter_number - 1;
        let body = self
            .store
            .get_chapter_body(child_id, theme, previous)
            .await?;

        match body {
            Some(body) if !body.trim().is_empty() => {
                Ok(Some(bounded_prefix(&body, CONTINUITY_TAIL_CHARS)))
            }
            _ => {
                warn!(
                    %child_id,
                    %theme,
                    previous,
                    "Previous chapter has no body; continuing without a tail"
                );
                Ok(None)
            }
        }
    }

    /// Records that `chapter_number` was unlocked. Failures are logged and
    /// swallowed; the chapter itself already exists.
    pub async fn commit_progress(&self, child_id: Uuid, theme: Theme, chapter_number: u32) {
        match self
            .store
            .upsert_progress(child_id, theme, chapter_number)
            .await
        {
            Ok(()) => debug!(%child_id, %theme, chapter_number, "Progress committed"),
            Err(e) => warn!(
                %child_id,
                %theme,
                chapter_number,
                error = %e,
                "Failed to commit story progress; numbering will recover from chapter history"
            ),
        }
    }
}
