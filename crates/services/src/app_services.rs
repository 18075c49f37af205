use std::sync::Arc;

use storage::repository::{CourseCatalog, ProgressStore, Storage};
use storage::sqlite::SqliteRepository;
use tracing::info;

use crate::Clock;
use crate::config::{Backend, ServicesConfig, with_create_mode};
use crate::error::AppServicesError;
use crate::progression::ProgressionService;
use crate::rest_client::RestBackend;

/// Assembles app-facing services over the configured backend.
#[derive(Clone)]
pub struct AppServices {
    catalog: Arc<dyn CourseCatalog>,
    progression: Arc<ProgressionService>,
}

impl AppServices {
    /// Build services for `config`: `SQLite` (migrated on start) or REST.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the `SQLite` connection or migrations fail.
    pub async fn from_config(config: &ServicesConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = match &config.backend {
            Backend::Sqlite {
                url,
                max_connections,
            } => {
                let repo =
                    SqliteRepository::connect_with(&with_create_mode(url), *max_connections).await?;
                repo.migrate().await?;
                info!(backend = "sqlite", "course storage ready");
                let catalog: Arc<dyn CourseCatalog> = Arc::new(repo.clone());
                let progress: Arc<dyn ProgressStore> = Arc::new(repo);
                Storage { catalog, progress }
            }
            Backend::Rest { base_url, token } => {
                let backend = RestBackend::new(base_url.clone(), token.clone());
                info!(backend = "rest", base_url = %base_url, "course storage ready");
                let catalog: Arc<dyn CourseCatalog> = Arc::new(backend.clone());
                let progress: Arc<dyn ProgressStore> = Arc::new(backend);
                Storage { catalog, progress }
            }
        };
        Ok(Self::from_storage(storage, clock))
    }

    /// Build services backed by in-memory storage.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock) -> Self {
        let progression = Arc::new(ProgressionService::new(
            clock,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.progress),
        ));
        Self {
            catalog: storage.catalog,
            progression,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<dyn CourseCatalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn progression(&self) -> Arc<ProgressionService> {
        Arc::clone(&self.progression)
    }
}
