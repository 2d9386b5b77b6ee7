pub mod db;
pub mod gemini_story;
pub mod openai_story;

pub use db::DbAdapter;
pub use gemini_story::GeminiStoryAdapter;
pub use openai_story::OpenAiStoryAdapter;

use std::future::Future;
use std::time::Duration;
use story_engine_core::domain::LengthPolicy;
use story_engine_core::ports::{PortError, PortResult};

/// Interprets a one-word moderation verdict. Anything other than SAFE is unsafe.
pub fn parse_verdict(reply: &str) -> bool {
    reply
        .trim()
        .trim_matches(|c: char| !c.is_ascii_alphabetic())
        .eq_ignore_ascii_case("SAFE")
}

pub fn max_output_tokens(length: LengthPolicy) -> u32 {
    match length {
        LengthPolicy::Short => 450,
        LengthPolicy::Bedtime => 1000,
    }
}

/// The share of a backend's attempt budget given to each option of its
/// cascade, so the last option is still reached when earlier ones hang.
pub fn option_timeout(attempt_budget: Duration, options: usize) -> Duration {
    let options = u32::try_from(options.max(1)).unwrap_or(u32::MAX);
    attempt_budget / options
}

/// Runs one cascade option, turning an expired `limit` into an ordinary failure.
pub async fn within<T>(
    limit: Duration,
    option: &str,
    call: impl Future<Output = PortResult<T>>,
) -> PortResult<T> {
    tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
        Err(PortError::Unexpected(format!(
            "{} did not answer within {:?}",
            option, limit
        )))
    })
}
