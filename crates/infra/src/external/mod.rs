//! Adapters for external services.

pub mod ollama;

pub use ollama::OllamaTextGenerator;
