//! Hypothesis tournaments (spec §4.7): bracket elimination over a set of
//! falsifiable hypotheses, each backed by its own evidence-gathering
//! session.

#![deny(missing_docs)]

mod engine;

pub use engine::{TournamentEngine, TournamentError};
