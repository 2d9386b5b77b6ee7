//! services/api/src/bin/openapi.rs
//!
//! Writes the story engine's OpenAPI document to disk for client generation.
//!
//! Usage: `openapi [OUTPUT]`, where `OUTPUT` defaults to `openapi.json`.

use api_lib::{error::ApiError, web::rest::ApiDoc};
use std::{env, fs, path::PathBuf};
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "openapi.json";

fn main() -> Result<(), ApiError> {
    let output = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    let document = ApiDoc::openapi().to_pretty_json().map_err(|e| {
        ApiError::Internal(format!("Failed to serialize the OpenAPI document: {}", e))
    })?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&output, document)?;
    println!("Story engine API document written to {}", output.display());
    Ok(())
}
