//! Language model clients

pub mod client;
pub mod gemini;
pub mod types;

pub use client::{AnthropicClient, AnthropicConfig};
pub use gemini::{GeminiClient, GeminiConfig};
pub use types::{ChatTurn, LanguageModel, ModelRequest, Role};
