pub mod registry;
pub mod room;

use std::sync::Arc;

use crate::{catalog::SongCatalog, config::AppConfig, state::registry::RoomRegistry};

pub type SharedState = Arc<AppState>;

/// Central application state: configuration, the read-only song catalogue,
/// and the live room registry.
pub struct AppState {
    config: AppConfig,
    catalog: SongCatalog,
    registry: RoomRegistry,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be
    /// cloned cheaply into connection tasks.
    pub fn new(config: AppConfig, catalog: SongCatalog) -> SharedState {
        Arc::new(Self {
            config,
            catalog,
            registry: RoomRegistry::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn catalog(&self) -> &SongCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }
}
