use std::sync::Arc;

use chartcast_core::dataset::DataSource;
use chartcast_pipeline::registry::JobRegistry;
use chartcast_pipeline::runner::JobRunner;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Every animation job, in memory.
    pub registry: Arc<JobRegistry>,
    /// Spawns capture/encode runs against `registry`.
    pub runner: JobRunner,
    /// The dataset currently being visualised.
    pub data: DataSource,
}

impl AppState {
    /// Wire a registry and runner for `config` around an initial dataset.
    pub fn new(config: ServerConfig, data: DataSource) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let runner = JobRunner::new(
            Arc::clone(&registry),
            config.runner_config(),
            reqwest::Client::new(),
        );
        Self {
            config: Arc::new(config),
            registry,
            runner,
            data,
        }
    }
}
