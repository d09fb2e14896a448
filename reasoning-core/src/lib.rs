#![deny(missing_docs)]
//! # reasoning-core — shared data model for the reasoning-orchestration server
//!
//! Defines the protocol-level data that every other crate in this workspace
//! shares: the untrusted [`model::AnalysisContext`] input envelope, the
//! typed [`model::AnalysisResult`] output, session and tournament state,
//! typed ids, and the cross-cutting error taxonomy. No component here
//! performs I/O; everything is plain data and pure transforms.

pub mod error;
pub mod id;
pub mod location;
pub mod model;

pub use error::ReasoningError;
pub use id::{HypothesisId, ProviderName, SessionId, TournamentId};
pub use location::CodeLocation;
