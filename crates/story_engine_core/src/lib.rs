pub mod curated;
pub mod domain;
pub mod engine;
pub mod orchestrator;
pub mod ports;
pub mod progress;
pub mod prompt;
pub mod safety;
pub mod title;

#[cfg(test)]
pub(crate) mod testing;

pub use domain::{
    AgeBracket, Chapter, ChapterDraft, ChapterKind, ChildProfile, GenerationRequest,
    GenerationResult, LengthPolicy, ProgressRecord, Theme,
};
pub use engine::StoryEngine;
pub use orchestrator::{BackendRegistry, FallbackOrchestrator, OrchestratorSettings, TierFailure};
pub use ports::{
    Clock, NotificationSink, PortError, PortResult, ProfileStore, StoryBackend, SystemClock,
};
