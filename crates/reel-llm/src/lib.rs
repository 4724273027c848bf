//! reel-llm - Language model client
//!
//! Provides [`GeminiClient`], a [`LanguageModel`] backed by the Gemini
//! `generateContent` REST API, with retry and exponential backoff.

mod gemini;

pub use gemini::GeminiClient;

// Re-export the LanguageModel trait for convenience
pub use reel_core::LanguageModel;
