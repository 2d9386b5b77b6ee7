//! crates/story_engine_core/src/engine.rs
//!
//! The public entry point of the story engine: resolves the child, numbers the
//! next chapter, generates it through the fallback tiers, persists it and
//! announces it.

use crate::domain::{Chapter, ChildProfile, Theme};
use crate::orchestrator::{BackendRegistry, FallbackOrchestrator, OrchestratorSettings};
use crate::ports::{Clock, NotificationSink, PortError, PortResult, ProfileStore};
use crate::progress::ProgressTracker;
use crate::prompt::build_request;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

/// How many times a chapter insert is retried after losing a numbering race.
pub const MAX_PERSIST_ATTEMPTS: u32 = 3;

type StoryKey = (Uuid, Theme);

pub struct StoryEngine {
    store: Arc<dyn ProfileStore>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    tracker: ProgressTracker,
    orchestrator: FallbackOrchestrator,
    /// One async lock per (child, theme) so two requests cannot claim the same number.
    story_locks: Mutex<HashMap<StoryKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl StoryEngine {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        registry: BackendRegistry,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            tracker: ProgressTracker::new(store.clone()),
            orchestrator: FallbackOrchestrator::new(registry, settings),
            store,
            notifier,
            clock,
            story_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Unlocks the next chapter for a batch of completed tasks.
    ///
    /// Returns `None` when the child cannot be resolved or none of the tasks is
    /// approved. Otherwise always returns a chapter; if saving it failed, the
    /// returned chapter is the unsaved in-memory value.
    pub async fn unlock_chapter_for_completed_tasks(
        &self,
        child_id: Uuid,
        completed_task_ids: &[Uuid],
    ) -> Option<Chapter> {
        let profile = self.resolve_profile(child_id).await?;

        let titles = match self.store.get_approved_task_titles(completed_task_ids).await {
            Ok(titles) => titles,
            Err(e) => {
                error!(%child_id, error = %e, "Failed to resolve completed task titles");
                return None;
            }
        };
        if titles.is_empty() {
            info!(
                %child_id,
                requested = completed_task_ids.len(),
                "No approved tasks; no chapter unlocked"
            );
            return None;
        }

        self.generate_and_store(&profile, &titles).await
    }

    /// Unlocks the next chapter without any new tasks, e.g. from a
    /// "read me the next chapter" button.
    pub async fn request_next_chapter(&self, child_id: Uuid) -> Option<Chapter> {
        let profile = self.resolve_profile(child_id).await?;
        self.generate_and_store(&profile, &[]).await
    }

    /// The child's chapters for their current theme, in order.
    pub async fn list_chapters(&self, child_id: Uuid) -> PortResult<Vec<Chapter>> {
        let profile = self.store.get_child_profile(child_id).await?;
        self.store.list_chapters(child_id, profile.theme).await
    }

    pub async fn mark_chapter_read(&self, chapter_id: Uuid) -> PortResult<()> {
        self.store.mark_chapter_read(chapter_id).await
    }

    async fn resolve_profile(&self, child_id: Uuid) -> Option<ChildProfile> {
        match self.store.get_child_profile(child_id).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                error!(%child_id, error = %e, "Failed to resolve child profile");
                None
            }
        }
    }

    fn story_lock(&self, key: StoryKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .story_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(key).or_default().clone()
    }

    /// Drops the entry for `key` once no other caller holds or awaits its lock.
    fn release_story_lock(&self, key: StoryKey, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self
            .story_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // One reference lives in the map, the other is `lock`.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&key);
        }
    }

    async fn generate_and_store(
        &self,
        profile: &ChildProfile,
        titles: &[String],
    ) -> Option<Chapter> {
        let key = (profile.id, profile.theme);
        let lock = self.story_lock(key);
        let outcome = {
            let _guard = lock.lock().await;
            self.generate_and_persist(profile, titles).await
        };
        self.release_story_lock(key, lock);
        outcome
    }

    async fn generate_and_persist(
        &self,
        profile: &ChildProfile,
        titles: &[String],
    ) -> Option<Chapter> {
        let (child_id, theme) = (profile.id, profile.theme);
        let mut attempt = 1;
        loop {
            let chapter_number = match self.tracker.next_chapter_number(child_id, theme).await {
                Ok(number) => number,
                Err(e) => {
                    error!(
                        %child_id,
                        %theme,
                        error = %e,
                        "Failed to compute the next chapter number"
                    );
                    return None;
                }
            };
            let tail = self
                .tracker
                .continuity_tail(child_id, theme, chapter_number)
                .await
                .unwrap_or_else(|e| {
                    warn!(
                        %child_id,
                        %theme,
                        chapter_number,
                        error = %e,
                        "Failed to fetch continuity tail"
                    );
                    None
                });

            let request = build_request(
                profile,
                titles,
                tail,
                chapter_number,
                self.clock.local_hour(),
            );
            let result = self.orchestrator.generate(&request).await;
            let Some(draft) = result.chapter else {
                error!(%child_id, %theme, chapter_number, "Generation produced no chapter");
                return None;
            };

            let now = self.clock.now();
            let chapter = Chapter {
                id: Uuid::new_v4(),
                child_id,
                theme,
                chapter_number,
                title: draft.title,
                content: draft.content,
                created_at: now,
                unlocked_at: now,
                is_read: false,
                fallback_used: result.fallback_used,
            };

            match self.store.create_chapter(chapter.clone()).await {
                Ok(saved) => {
                    info!(
                        %child_id,
                        %theme,
                        chapter_number,
                        fallback_used = saved.fallback_used,
                        backend = result.backend.as_deref().unwrap_or("curated"),
                        "Chapter unlocked"
                    );
                    self.tracker
                        .commit_progress(child_id, theme, chapter_number)
                        .await;
                    self.announce(&saved).await;
                    return Some(saved);
                }
                Err(PortError::Conflict(reason)) if attempt < MAX_PERSIST_ATTEMPTS => {
                    warn!(
                        %child_id,
                        %theme,
                        chapter_number,
                        attempt,
                        %reason,
                        "Chapter number already taken; renumbering"
                    );
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        %child_id,
                        %theme,
                        chapter_number,
                        error = %e,
                        "Failed to save chapter; returning it unsaved"
                    );
                    return Some(chapter);
                }
            }
        }
    }

    async fn announce(&self, chapter: &Chapter) {
        if let Err(e) = self
            .notifier
            .notify_chapter_unlocked(chapter.child_id, &chapter.title)
            .await
        {
            warn!(
                child_id = %chapter.child_id,
                error = %e,
                "Failed to send chapter notification"
            );
        }
    }
}
