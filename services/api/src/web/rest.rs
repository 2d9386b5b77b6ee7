//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use story_engine_core::{Chapter, PortError};
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        unlock_chapter_handler,
        next_chapter_handler,
        list_chapters_handler,
        mark_chapter_read_handler,
    ),
    components(
        schemas(UnlockChapterRequest, ChapterResponse)
    ),
    tags(
        (name = "Story Engine API", description = "Unlocks and serves the chapters of each child's ongoing story.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The tasks whose completion should unlock a chapter.
#[derive(Deserialize, ToSchema)]
pub struct UnlockChapterRequest {
    pub task_ids: Vec<Uuid>,
}

/// A chapter as returned to clients.
#[derive(Serialize, ToSchema)]
pub struct ChapterResponse {
    id: Uuid,
    child_id: Uuid,
    theme: String,
    chapter_number: u32,
    title: String,
    content: String,
    created_at: DateTime<Utc>,
    unlocked_at: DateTime<Utc>,
    is_read: bool,
    fallback_used: bool,
}

impl From<Chapter> for ChapterResponse {
    fn from(chapter: Chapter) -> Self {
        Self {
            id: chapter.id,
            child_id: chapter.child_id,
            theme: chapter.theme.to_string(),
            chapter_number: chapter.chapter_number,
            title: chapter.title,
            content: chapter.content,
            created_at: chapter.created_at,
            unlocked_at: chapter.unlocked_at,
            is_read: chapter.is_read,
            fallback_used: chapter.fallback_used,
        }
    }
}

fn chapter_or_no_content(chapter: Option<Chapter>) -> Response {
    match chapter {
        Some(chapter) => {
            (StatusCode::CREATED, Json(ChapterResponse::from(chapter))).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

fn port_error_response(context: &str, e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        other => {
            error!("{}: {:?}", context, other);
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Unlock the next chapter for a batch of completed tasks.
///
/// Only approved tasks count. Responds 204 when no chapter was unlocked.
#[utoipa::path(
    post,
    path = "/children/{child_id}/chapters/unlock",
    request_body = UnlockChapterRequest,
    responses(
        (status = 201, description = "Chapter unlocked", body = ChapterResponse),
        (status = 204, description = "No chapter was unlocked (unknown child or no approved tasks)")
    ),
    params(
        ("child_id" = Uuid, Path, description = "The child whose story advances.")
    )
)]
pub async fn unlock_chapter_handler(
    State(app_state): State<Arc<AppState>>,
    Path(child_id): Path<Uuid>,
    Json(payload): Json<UnlockChapterRequest>,
) -> Response {
    let chapter = app_state
        .engine
        .unlock_chapter_for_completed_tasks(child_id, &payload.task_ids)
        .await;
    chapter_or_no_content(chapter)
}

/// Unlock the next chapter without new tasks.
#[utoipa::path(
    post,
    path = "/children/{child_id}/chapters/next",
    responses(
        (status = 201, description = "Chapter unlocked", body = ChapterResponse),
        (status = 204, description = "No chapter was unlocked (unknown child)")
    ),
    params(
        ("child_id" = Uuid, Path, description = "The child whose story advances.")
    )
)]
pub async fn next_chapter_handler(
    State(app_state): State<Arc<AppState>>,
    Path(child_id): Path<Uuid>,
) -> Response {
    let chapter = app_state.engine.request_next_chapter(child_id).await;
    chapter_or_no_content(chapter)
}

/// List the chapters of a child's current story.
#[utoipa::path(
    get,
    path = "/children/{child_id}/chapters",
    responses(
        (status = 200, description = "Chapters in order", body = [ChapterResponse]),
        (status = 404, description = "Child not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("child_id" = Uuid, Path, description = "The child whose story to list.")
    )
)]
pub async fn list_chapters_handler(
    State(app_state): State<Arc<AppState>>,
    Path(child_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let chapters = app_state
        .engine
        .list_chapters(child_id)
        .await
        .map_err(|e| port_error_response("Failed to list chapters", e))?;

    let body: Vec<ChapterResponse> = chapters.into_iter().map(ChapterResponse::from).collect();
    Ok(Json(body))
}

/// Mark a chapter as read.
#[utoipa::path(
    post,
    path = "/chapters/{chapter_id}/read",
    responses(
        (status = 204, description = "Chapter marked as read"),
        (status = 404, description = "Chapter not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("chapter_id" = Uuid, Path, description = "The chapter that was read.")
    )
)]
pub async fn mark_chapter_read_handler(
    State(app_state): State<Arc<AppState>>,
    Path(chapter_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    app_state
        .engine
        .mark_chapter_read(chapter_id)
        .await
        .map_err(|e| port_error_response("Failed to mark chapter as read", e))?;
    Ok(StatusCode::NO_CONTENT)
}
