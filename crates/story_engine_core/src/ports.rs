//! crates/story_engine_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the story engine.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use crate::domain::{Chapter, ChildProfile, GenerationRequest, ProgressRecord, Theme};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint rejected the write, e.g. a chapter number already taken.
    #[error("Conflicting write: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ProfileStore: Send + Sync {
    // --- Child & Tasks ---
    async fn get_child_profile(&self, child_id: Uuid) -> PortResult<ChildProfile>;

    /// Titles of the given task records that are in the approved state, in input order.
    async fn get_approved_task_titles(&self, task_ids: &[Uuid]) -> PortResult<Vec<String>>;

    // --- Chapters ---
    /// Highest persisted chapter number for the pair, or 0 when there are none.
    async fn get_max_chapter_number(&self, child_id: Uuid, theme: Theme) -> PortResult<u32>;

    async fn get_chapter_body(
        &self,
        child_id: Uuid,
        theme: Theme,
        chapter_number: u32,
    ) -> PortResult<Option<String>>;

    /// Inserts a chapter. Returns `PortError::Conflict` if the
    /// (child, theme, chapter_number) triple already exists.
    async fn create_chapter(&self, chapter: Chapter) -> PortResult<Chapter>;

    async fn list_chapters(&self, child_id: Uuid, theme: Theme) -> PortResult<Vec<Chapter>>;

    async fn mark_chapter_read(&self, chapter_id: Uuid) -> PortResult<()>;

    // --- Progress ---
    /// Raises both counters to at least `chapter_number`, creating the record if needed.
    async fn upsert_progress(
        &self,
        child_id: Uuid,
        theme: Theme,
        chapter_number: u32,
    ) -> PortResult<()>;

    async fn get_progress(
        &self,
        child_id: Uuid,
        theme: Theme,
    ) -> PortResult<Option<ProgressRecord>>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Announces a newly unlocked chapter. Delivery is best-effort.
    async fn notify_chapter_unlocked(&self, child_id: Uuid, title: &str) -> PortResult<()>;
}

#[async_trait]
pub trait StoryBackend: Send + Sync {
    /// A short, stable name used in logs and on generation results.
    fn name(&self) -> &str;

    /// Writes the chapter text. The first line should be "Chapter N: <Title>".
    async fn generate_chapter(&self, request: &GenerationRequest) -> PortResult<String>;

    /// Asks the backend whether the text is suitable for a child.
    async fn moderate_content(&self, text: &str) -> PortResult<bool>;
}

/// Source of the current time, so the day-time length policy can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Hour of day (0-23) in the family's local time.
    fn local_hour(&self) -> u32;
}

/// Wall clock with a fixed offset for "local" time.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(Utc.fix())
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_hour(&self) -> u32 {
        Utc::now().with_timezone(&self.offset).hour()
    }
}
