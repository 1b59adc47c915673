//! `procura-ai`
//!
//! **Responsibility:** text-generation boundary.
//!
//! This crate is intentionally **not** part of the domain model:
//! - It must not depend on procurement entities; prompts carry plain facts.
//! - It must not mutate state.
//! - Generated prose is advisory. Nothing downstream parses it.

pub mod error;
pub mod generator;
pub mod prompt;
pub mod template;

pub use error::AiError;
pub use generator::{TextGenerator, WithFallback};
pub use prompt::{Prompt, QuoteLine};
pub use template::TemplateTextGenerator;
