//! In-memory implementations of every port, with failure injection, for unit tests.

use crate::domain::{Chapter, ChildProfile, GenerationRequest, ProgressRecord, Theme};
use crate::ports::{Clock, NotificationSink, PortError, PortResult, ProfileStore, StoryBackend};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

//=========================================================================================
// Profile Store
//=========================================================================================

#[derive(Default)]
pub struct MemoryStore {
    children: Mutex<HashMap<Uuid, ChildProfile>>,
    tasks: Mutex<HashMap<Uuid, (String, bool)>>,
    chapters: Mutex<Vec<Chapter>>,
    progress: Mutex<HashMap<(Uuid, Theme), ProgressRecord>>,
    fail_profile: AtomicBool,
    fail_progress: AtomicBool,
    fail_create: AtomicBool,
    /// Number of upcoming inserts that lose a race to a rival writer.
    rival_inserts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_child(&self, name: &str, age_bracket: &str, theme: Theme) -> Uuid {
        let id = Uuid::new_v4();
        let profile = ChildProfile {
            id,
            name: name.to_string(),
            age_bracket: age_bracket.parse().unwrap(),
            theme,
        };
        self.children.lock().unwrap().insert(id, profile);
        id
    }

    pub fn add_task(&self, title: &str, approved: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.tasks
            .lock()
            .unwrap()
            .insert(id, (title.to_string(), approved));
        id
    }

    pub fn seed_chapter(&self, child_id: Uuid, theme: Theme, chapter_number: u32, body: &str) {
        let now = Utc::now();
        self.chapters.lock().unwrap().push(Chapter {
            id: Uuid::new_v4(),
            child_id,
            theme,
            chapter_number,
            title: format!("Chapter {chapter_number}: Seeded"),
            content: body.to_string(),
            created_at: now,
            unlocked_at: now,
            is_read: false,
            fallback_used: false,
        });
    }

    pub fn chapters(&self, child_id: Uuid, theme: Theme) -> Vec<Chapter> {
        let mut chapters: Vec<Chapter> = self
            .chapters
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.child_id == child_id && c.theme == theme)
            .cloned()
            .collect();
        chapters.sort_by_key(|c| c.chapter_number);
        chapters
    }

    pub fn fail_profile(&self, fail: bool) {
        self.fail_profile.store(fail, Ordering::SeqCst);
    }

    pub fn fail_progress(&self, fail: bool) {
        self.fail_progress.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// The next `count` inserts find their chapter number already claimed.
    pub fn lose_races(&self, count: usize) {
        self.rival_inserts.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_child_profile(&self, child_id: Uuid) -> PortResult<ChildProfile> {
        if self.fail_profile.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("profile store offline".to_string()));
        }
        self.children
            .lock()
            .unwrap()
            .get(&child_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Child {} not found", child_id)))
    }

    async fn get_approved_task_titles(&self, task_ids: &[Uuid]) -> PortResult<Vec<String>> {
        let tasks = self.tasks.lock().unwrap();
        Ok(task_ids
            .iter()
            .filter_map(|id| tasks.get(id))
            .filter(|(_, approved)| *approved)
            .map(|(title, _)| title.clone())
            .collect())
    }

    async fn get_max_chapter_number(&self, child_id: Uuid, theme: Theme) -> PortResult<u32> {
        Ok(self
            .chapters(child_id, theme)
            .iter()
            .map(|c| c.chapter_number)
            .max()
            .unwrap_or(0))
    }

    async fn get_chapter_body(
        &self,
        child_id: Uuid,
        theme: Theme,
        chapter_number: u32,
    ) -> PortResult<Option<String>> {
        Ok(self
            .chapters(child_id, theme)
            .into_iter()
            .find(|c| c.chapter_number == chapter_number)
            .map(|c| c.content))
    }

    async fn create_chapter(&self, chapter: Chapter) -> PortResult<Chapter> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("insert failed".to_string()));
        }
        if self
            .rival_inserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            self.seed_chapter(
                chapter.child_id,
                chapter.theme,
                chapter.chapter_number,
                "Rival chapter.",
            );
        }

        let mut chapters = self.chapters.lock().unwrap();
        let taken = chapters.iter().any(|c| {
            c.child_id == chapter.child_id
                && c.theme == chapter.theme
                && c.chapter_number == chapter.chapter_number
        });
        if taken {
            return Err(PortError::Conflict(format!(
                "chapter {} already exists",
                chapter.chapter_number
            )));
        }
        chapters.push(chapter.clone());
        Ok(chapter)
    }

    async fn list_chapters(&self, child_id: Uuid, theme: Theme) -> PortResult<Vec<Chapter>> {
        Ok(self.chapters(child_id, theme))
    }

    async fn mark_chapter_read(&self, chapter_id: Uuid) -> PortResult<()> {
        let mut chapters = self.chapters.lock().unwrap();
        let chapter = chapters
            .iter_mut()
            .find(|c| c.id == chapter_id)
            .ok_or_else(|| PortError::NotFound(format!("Chapter {} not found", chapter_id)))?;
        chapter.is_read = true;
        Ok(())
    }

    async fn upsert_progress(
        &self,
        child_id: Uuid,
        theme: Theme,
        chapter_number: u32,
    ) -> PortResult<()> {
        if self.fail_progress.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("progress table locked".to_string()));
        }
        let mut progress = self.progress.lock().unwrap();
        let record = progress
            .entry((child_id, theme))
            .or_insert_with(|| ProgressRecord {
                child_id,
                theme,
                current_chapter: 0,
                total_chapters_unlocked: 0,
            });
        record.current_chapter = record.current_chapter.max(chapter_number);
        record.total_chapters_unlocked = record.total_chapters_unlocked.max(chapter_number);
        Ok(())
    }

    async fn get_progress(
        &self,
        child_id: Uuid,
        theme: Theme,
    ) -> PortResult<Option<ProgressRecord>> {
        Ok(self.progress.lock().unwrap().get(&(child_id, theme)).cloned())
    }
}

//=========================================================================================
// Notification Sink
//=========================================================================================

#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<(Uuid, String)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify_chapter_unlocked(&self, child_id: Uuid, title: &str) -> PortResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("push service down".to_string()));
        }
        self.sent.lock().unwrap().push((child_id, title.to_string()));
        Ok(())
    }
}

//=========================================================================================
// Backends
//=========================================================================================

/// What a scripted backend does when asked for a chapter.
pub enum Script {
    /// Replies with this text; `{n}` is replaced by the requested chapter number.
    Reply(String),
    Fail(String),
    /// Never answers within any reasonable timeout.
    Hang,
}

pub struct ScriptedBackend {
    name: String,
    script: Script,
    /// `None` makes the moderation call itself fail.
    moderation: Option<bool>,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedBackend {
    pub fn new(name: &str, script: Script) -> Self {
        Self {
            name: name.to_string(),
            script,
            moderation: Some(true),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(name: &str, text: &str) -> Self {
        Self::new(name, Script::Reply(text.to_string()))
    }

    pub fn failing(name: &str) -> Self {
        Self::new(name, Script::Fail(format!("{name} is unavailable")))
    }

    pub fn with_moderation(mut self, verdict: Option<bool>) -> Self {
        self.moderation = verdict;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoryBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_chapter(&self, request: &GenerationRequest) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        match &self.script {
            Script::Reply(text) => Ok(text.replace("{n}", &request.chapter_number.to_string())),
            Script::Fail(reason) => Err(PortError::Unexpected(reason.clone())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(PortError::Unexpected("woke up".to_string()))
            }
        }
    }

    async fn moderate_content(&self, _text: &str) -> PortResult<bool> {
        self.moderation
            .ok_or_else(|| PortError::Unexpected("moderation endpoint down".to_string()))
    }
}

//=========================================================================================
// Clock
//=========================================================================================

pub struct FixedClock {
    pub hour: u32,
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 4, self.hour, 0, 0)
            .single()
            .unwrap()
    }

    fn local_hour(&self) -> u32 {
        self.hour
    }
}
