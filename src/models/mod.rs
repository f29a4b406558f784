//! Gemini model module
//!
//! This module provides the model side of the turn loop:
//! - The `ModelClient` trait the loop consumes
//! - The Gemini `generateContent` client
//! - The list of valid models

pub mod client;
pub mod types;

// Re-export key types for convenience
pub use client::{GeminiClient, ModelClient, API_KEY_ENV, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use types::{
    is_valid_model, ModelInfo, DEFAULT_API_BASE_URL, DEFAULT_MODEL, TITLE_MODEL, VALID_MODELS,
};
