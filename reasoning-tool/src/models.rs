//! Runtime provider selection, backing `get_model_info` / `set_model`
//! (spec §4.8).

use reasoning_provider::Provider;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A snapshot of one configured provider's identity and current state.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    /// The provider's stable name.
    pub name: String,
    /// Its fallback-chain priority (lower preferred).
    pub priority: i32,
    /// Whether it currently reports itself available.
    pub available: bool,
    /// Whether it's the client's currently preferred model.
    pub active: bool,
}

/// Tracks which configured provider the client has asked to prefer.
/// Informational only: the arbiter still applies its own priority and
/// circuit-breaker ordering (spec §4.5) on every call; this registry
/// exists for `get_model_info`/`set_model` to report on and steer intent.
pub struct ModelRegistry {
    providers: Vec<Arc<dyn Provider>>,
    preferred: RwLock<Option<String>>,
}

impl ModelRegistry {
    /// Build a registry over the arbiter's configured providers.
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self {
            providers,
            preferred: RwLock::new(None),
        }
    }

    /// Snapshot every provider's identity and availability.
    pub async fn info(&self) -> Vec<ModelInfo> {
        let preferred = self.preferred.read().await.clone();
        let mut infos = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            infos.push(ModelInfo {
                name: provider.name().to_string(),
                priority: provider.priority(),
                available: provider.is_available().await,
                active: preferred.as_deref() == Some(provider.name()),
            });
        }
        infos
    }

    /// Set the preferred model, rejecting names not among the configured
    /// providers.
    pub async fn set_preferred(&self, name: &str) -> bool {
        if !self.providers.iter().any(|p| p.name() == name) {
            return false;
        }
        *self.preferred.write().await = Some(name.to_string());
        true
    }

    /// The currently preferred model, if one has been set.
    pub async fn preferred(&self) -> Option<String> {
        self.preferred.read().await.clone()
    }
}
