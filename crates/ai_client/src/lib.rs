//! Chat-completions client shared by the CLI and request handlers.
//!
//! Speaks the OpenAI wire format, which Groq and Gemini also accept. The
//! client only moves text; prompts and reply parsing live in the engine.

mod client;

pub use client::{AiClientError, OpenAiCompatibleClient};
