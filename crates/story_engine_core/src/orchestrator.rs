//! crates/story_engine_core/src/orchestrator.rs
//!
//! Tries the configured backends in priority order and falls back to a curated
//! chapter when all of them fail. Backends are called one at a time; only the
//! first acceptable chapter matters.

use crate::curated::curated_chapter;
use crate::domain::{ChapterDraft, GenerationRequest, GenerationResult};
use crate::ports::{PortError, StoryBackend};
use crate::safety::find_unsafe_term;
use crate::title::extract_title;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

//=========================================================================================
// Backend Registry
//=========================================================================================

/// The ordered set of backends and which of them is the primary.
///
/// Built explicitly at startup and handed to the engine.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn StoryBackend>>,
    default_index: usize,
}

impl BackendRegistry {
    /// An out-of-range `default_index` falls back to the first backend.
    pub fn new(backends: Vec<Arc<dyn StoryBackend>>, default_index: usize) -> Self {
        let default_index = if default_index < backends.len() {
            default_index
        } else {
            0
        };
        Self {
            backends,
            default_index,
        }
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn primary(&self) -> Option<&Arc<dyn StoryBackend>> {
        self.backends.get(self.default_index)
    }

    /// The primary backend followed by every other backend in registration order.
    pub fn attempt_order(&self) -> impl Iterator<Item = &Arc<dyn StoryBackend>> {
        self.primary().into_iter().chain(
            self.backends
                .iter()
                .enumerate()
                .filter(move |(index, _)| *index != self.default_index)
                .map(|(_, backend)| backend),
        )
    }
}

//=========================================================================================
// Settings and Failures
//=========================================================================================

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Upper bound on a single backend call.
    pub attempt_timeout: Duration,
    /// Also ask the producing backend to moderate its own output.
    pub backend_moderation: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(45),
            backend_moderation: false,
        }
    }
}

/// Why a single backend tier did not yield a chapter.
#[derive(Debug, thiserror::Error)]
pub enum TierFailure {
    #[error("backend call failed: {0}")]
    Backend(#[from] PortError),
    #[error("backend returned an empty chapter")]
    Empty,
    #[error("rejected by the safety filter (matched '{0}')")]
    Unsafe(String),
    #[error("rejected by backend moderation")]
    ModerationRejected,
    #[error("moderation check failed: {0}")]
    ModerationFailed(PortError),
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

//=========================================================================================
// Orchestrator
//=========================================================================================

#[derive(Clone)]
pub struct FallbackOrchestrator {
    registry: BackendRegistry,
    settings: OrchestratorSettings,
}

impl FallbackOrchestrator {
    pub fn new(registry: BackendRegistry, settings: OrchestratorSettings) -> Self {
        Self { registry, settings }
    }

    /// Always produces a chapter. Backend failures are logged and collected into
    /// `GenerationResult::error`; they are never returned.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let mut failures = Vec::new();

        for (position, backend) in self.registry.attempt_order().enumerate() {
            let tier = if position == 0 { "primary" } else { "secondary" };
            match self.attempt(backend.as_ref(), request).await {
                Ok(draft) => {
                    info!(
                        backend = backend.name(),
                        tier,
                        chapter_number = request.chapter_number,
                        "Chapter generated"
                    );
                    return GenerationResult {
                        success: true,
                        chapter: Some(draft),
                        error: join_failures(&failures),
                        fallback_used: false,
                        backend: Some(backend.name().to_string()),
                    };
                }
                Err(failure) => {
                    warn!(
                        backend = backend.name(),
                        tier,
                        chapter_number = request.chapter_number,
                        error = %failure,
                        "Backend tier failed; trying the next one"
                    );
                    failures.push(format!("{}: {}", backend.name(), failure));
                }
            }
        }

        warn!(
            theme = %request.theme,
            chapter_number = request.chapter_number,
            attempted = failures.len(),
            "All backends failed; using the curated chapter"
        );
        GenerationResult {
            success: true,
            chapter: Some(curated_chapter(
                request.theme,
                &request.child_name,
                request.chapter_number,
            )),
            error: join_failures(&failures),
            fallback_used: true,
            backend: None,
        }
    }

    async fn attempt(
        &self,
        backend: &dyn StoryBackend,
        request: &GenerationRequest,
    ) -> Result<ChapterDraft, TierFailure> {
        let raw = tokio::time::timeout(
            self.settings.attempt_timeout,
            backend.generate_chapter(request),
        )
        .await
        .map_err(|_| TierFailure::Timeout(self.settings.attempt_timeout))??;

        let draft = extract_title(&raw, request.chapter_number);
        if draft.content.trim().is_empty() {
            return Err(TierFailure::Empty);
        }
        if let Some(term) =
            find_unsafe_term(&draft.title).or_else(|| find_unsafe_term(&draft.content))
        {
            return Err(TierFailure::Unsafe(term));
        }

        if self.settings.backend_moderation {
            let verdict = tokio::time::timeout(
                self.settings.attempt_timeout,
                backend.moderate_content(&draft.content),
            )
            .await
            .map_err(|_| TierFailure::Timeout(self.settings.attempt_timeout))?
            .map_err(TierFailure::ModerationFailed)?;
            if !verdict {
                return Err(TierFailure::ModerationRejected);
            }
        }

        Ok(draft)
    }
}

fn join_failures(failures: &[String]) -> Option<String> {
    if failures.is_empty() {
        None
    } else {
        Some(failures.join("; "))
    }
}
