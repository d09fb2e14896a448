#![deny(missing_docs)]
//! # reasoning-prompt — prompt assembly and response parsing
//!
//! [`PromptAssembler`] turns an [`reasoning_core::model::AnalysisContext`]
//! into an injection-resistant prompt string; [`ResponseParser`] turns raw
//! LLM output back into a typed [`reasoning_core::model::AnalysisResult`].

pub mod assembler;
pub mod parser;

pub use assembler::{sanitize, PromptAssembler};
pub use parser::ResponseParser;
