//! Application state shared across handlers.

use std::sync::Arc;

use devreg_core::{Registry, RegistryConfig};

/// State handed to every handler.
pub type SharedState = Arc<AppState>;

/// The wired registry components.
pub struct AppState {
    /// Passports, devices, renovations and owners.
    pub registry: Registry,
}

impl AppState {
    /// Build state from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the timezone is invalid or the snapshot cannot be
    /// loaded.
    pub fn from_config(config: &RegistryConfig) -> devreg_core::Result<SharedState> {
        Ok(Self::with_registry(Registry::from_config(config)?))
    }

    /// In-memory state with default rules.
    #[must_use]
    pub fn in_memory() -> SharedState {
        Self::with_registry(Registry::in_memory())
    }

    /// Wrap an already-built registry.
    #[must_use]
    pub fn with_registry(registry: Registry) -> SharedState {
        Arc::new(Self { registry })
    }
}
