//! Priority-ordered provider selection: availability, rate-limit, cost, and
//! circuit-breaker gates with deterministic fallback (spec §4.5).

#![deny(missing_docs)]

mod arbiter;

pub use arbiter::{
    AllProvidersFailed, ArbiterConfig, ProviderArbiter, DEFAULT_CIRCUIT_FAILURE_THRESHOLD,
    DEFAULT_CIRCUIT_RESET_SECONDS,
};
