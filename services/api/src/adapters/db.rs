//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ProfileStore` and `NotificationSink` ports from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use story_engine_core::domain::{Chapter, ChildProfile, ParseDomainError, ProgressRecord, Theme};
use story_engine_core::ports::{NotificationSink, PortError, PortResult, ProfileStore};
use uuid::Uuid;

/// Task status that makes a task count toward a chapter.
const APPROVED_STATUS: &str = "approved";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ProfileStore` and `NotificationSink` ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn to_i32(value: u32) -> PortResult<i32> {
    i32::try_from(value)
        .map_err(|_| PortError::Unexpected(format!("{} does not fit in INTEGER", value)))
}

fn parse_theme(value: &str) -> PortResult<Theme> {
    value
        .parse::<Theme>()
        .map_err(|e| PortError::Unexpected(e.to_string()))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ChildRecord {
    id: Uuid,
    name: String,
    age_bracket: String,
    theme: String,
}
impl ChildRecord {
    fn to_domain(self) -> PortResult<ChildProfile> {
        Ok(ChildProfile {
            id: self.id,
            name: self.name,
            age_bracket: self
                .age_bracket
                .parse()
                .map_err(|e: ParseDomainError| PortError::Unexpected(e.to_string()))?,
            theme: parse_theme(&self.theme)?,
        })
    }
}

#[derive(FromRow)]
struct TaskTitleRecord {
    id: Uuid,
    title: String,
}

#[derive(FromRow)]
struct ChapterRecord {
    id: Uuid,
    child_id: Uuid,
    theme: String,
    chapter_number: i32,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
    unlocked_at: DateTime<Utc>,
    is_read: bool,
    fallback_used: bool,
}
impl ChapterRecord {
    fn to_domain(self) -> PortResult<Chapter> {
        Ok(Chapter {
            id: self.id,
            child_id: self.child_id,
            theme: parse_theme(&self.theme)?,
            chapter_number: u32::try_from(self.chapter_number).map_err(|_| {
                PortError::Unexpected(format!("negative chapter number {}", self.chapter_number))
            })?,
            title: self.title,
            content: self.content,
            created_at: self.created_at,
            unlocked_at: self.unlocked_at,
            is_read: self.is_read,
            fallback_used: self.fallback_used,
        })
    }
}

#[derive(FromRow)]
struct ProgressRow {
    child_id: Uuid,
    theme: String,
    current_chapter: i32,
    total_chapters_unlocked: i32,
}
impl ProgressRow {
    fn to_domain(self) -> PortResult<ProgressRecord> {
        Ok(ProgressRecord {
            child_id: self.child_id,
            theme: parse_theme(&self.theme)?,
            current_chapter: self.current_chapter.max(0) as u32,
            total_chapters_unlocked: self.total_chapters_unlocked.max(0) as u32,
        })
    }
}

const CHAPTER_COLUMNS: &str =
    "id, child_id, theme, chapter_number, title, content, created_at, unlocked_at, is_read, fallback_used";

//=========================================================================================
// `ProfileStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProfileStore for DbAdapter {
    async fn get_child_profile(&self, child_id: Uuid) -> PortResult<ChildProfile> {
        let record = sqlx::query_as::<_, ChildRecord>(
            "SELECT id, name, age_bracket, theme FROM children WHERE id = $1",
        )
        .bind(child_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Child {} not found", child_id))
            }
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn get_approved_task_titles(&self, task_ids: &[Uuid]) -> PortResult<Vec<String>> {
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }
        let records = sqlx::query_as::<_, TaskTitleRecord>(
            "SELECT id, title FROM tasks WHERE id = ANY($1) AND status = $2",
        )
        .bind(task_ids)
        .bind(APPROVED_STATUS)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        // Keep the caller's ordering rather than the database's.
        let mut by_id: HashMap<Uuid, String> =
            records.into_iter().map(|r| (r.id, r.title)).collect();
        Ok(task_ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn get_max_chapter_number(&self, child_id: Uuid, theme: Theme) -> PortResult<u32> {
        let max = sqlx::query_scalar::<_, i32>(
            "SELECT COALESCE(MAX(chapter_number), 0) FROM chapters WHERE child_id = $1 AND theme = $2",
        )
        .bind(child_id)
        .bind(theme.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(max.max(0) as u32)
    }

    async fn get_chapter_body(
        &self,
        child_id: Uuid,
        theme: Theme,
        chapter_number: u32,
    ) -> PortResult<Option<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT content FROM chapters WHERE child_id = $1 AND theme = $2 AND chapter_number = $3",
        )
        .bind(child_id)
        .bind(theme.as_str())
        .bind(to_i32(chapter_number)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn create_chapter(&self, chapter: Chapter) -> PortResult<Chapter> {
        let record = sqlx::query_as::<_, ChapterRecord>(&format!(
            "INSERT INTO chapters ({CHAPTER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {CHAPTER_COLUMNS}"
        ))
        .bind(chapter.id)
        .bind(chapter.child_id)
        .bind(chapter.theme.as_str())
        .bind(to_i32(chapter.chapter_number)?)
        .bind(&chapter.title)
        .bind(&chapter.content)
        .bind(chapter.created_at)
        .bind(chapter.unlocked_at)
        .bind(chapter.is_read)
        .bind(chapter.fallback_used)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortError::Conflict(format!(
                    "Chapter {} already exists for child {} in {}",
                    chapter.chapter_number, chapter.child_id, chapter.theme
                ))
            }
            _ => unexpected(e),
        })?;
        record.to_domain()
    }

    async fn list_chapters(&self, child_id: Uuid, theme: Theme) -> PortResult<Vec<Chapter>> {
        let records = sqlx::query_as::<_, ChapterRecord>(&format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE child_id = $1 AND theme = $2 ORDER BY chapter_number ASC"
        ))
        .bind(child_id)
        .bind(theme.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn mark_chapter_read(&self, chapter_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("UPDATE chapters SET is_read = TRUE WHERE id = $1")
            .bind(chapter_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Chapter {} not found", chapter_id)));
        }
        Ok(())
    }

    async fn upsert_progress(
        &self,
        child_id: Uuid,
        theme: Theme,
        chapter_number: u32,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO story_progress (child_id, theme, current_chapter, total_chapters_unlocked) \
             VALUES ($1, $2, $3, $3) \
             ON CONFLICT (child_id, theme) DO UPDATE SET \
                 current_chapter = GREATEST(story_progress.current_chapter, EXCLUDED.current_chapter), \
                 total_chapters_unlocked = GREATEST(story_progress.total_chapters_unlocked, EXCLUDED.total_chapters_unlocked), \
                 updated_at = NOW()",
        )
        .bind(child_id)
        .bind(theme.as_str())
        .bind(to_i32(chapter_number)?)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_progress(
        &self,
        child_id: Uuid,
        theme: Theme,
    ) -> PortResult<Option<ProgressRecord>> {
        let record = sqlx::query_as::<_, ProgressRow>(
            "SELECT child_id, theme, current_chapter, total_chapters_unlocked FROM story_progress WHERE child_id = $1 AND theme = $2",
        )
        .bind(child_id)
        .bind(theme.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        record.map(|r| r.to_domain()).transpose()
    }
}

//=========================================================================================
// `NotificationSink` Trait Implementation
//=========================================================================================

#[async_trait]
impl NotificationSink for DbAdapter {
    /// Stores an in-app notification; push delivery is handled by whoever reads the table.
    async fn notify_chapter_unlocked(&self, child_id: Uuid, title: &str) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO notifications (id, child_id, kind, message) VALUES ($1, $2, 'chapter_unlocked', $3)",
        )
        .bind(Uuid::new_v4())
        .bind(child_id)
        .bind(format!("A new chapter is ready: {}", title))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}
