//! Health checks (spec §4.9): named probes, aggregated into one summary,
//! run on demand and on a schedule.

#![deny(missing_docs)]

mod builtin;
mod check;
mod registry;

pub use builtin::{
    EventBus, EventBusCheck, MemoryCheck, ProviderAvailabilityCheck, StartupCheck,
    MEMORY_FAIL_FRACTION, MEMORY_WARN_FRACTION,
};
pub use check::{CheckResult, CheckStatus, HealthCheck};
pub use registry::{CheckMap, HealthRegistry, HealthSummary, NamedCheckResult, DEFAULT_HEALTH_INTERVAL_SECONDS};
