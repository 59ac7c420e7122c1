//! Catalog poller
//!
//! Maintains the current snapshot of the catalog. One writer (the tick),
//! many readers (the integrator and discoverer), behind a readers–writer
//! lock. Readers always get a value copy; a failed poll keeps the
//! previous snapshot.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::catalog::Catalog;
use crate::daemon::Daemon;
use crate::metrics;
use crate::types::Service;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(120);

/// Read access to the latest catalog snapshot.
pub trait ServiceSource: Send + Sync {
    /// The latest snapshot, by value. Empty before the first successful
    /// poll.
    fn services(&self) -> Vec<Service>;
}

/// Periodic catalog poller holding the snapshot.
pub struct Fetcher {
    project: String,
    catalog: Arc<dyn Catalog>,

    interval: RwLock<Duration>,
    snapshot: RwLock<Vec<Service>>,
}

impl Fetcher {
    /// Create a fetcher for `project`.
    pub fn new(project: impl Into<String>, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            project: project.into(),
            catalog,
            interval: RwLock::new(DEFAULT_INTERVAL),
            snapshot: RwLock::new(Vec::new()),
        }
    }

    /// Change the tick period; effective no later than the next tick.
    pub fn set_interval(&self, interval: Duration) {
        *self.interval.write() = interval;
    }

    async fn fetch(&self) {
        metrics::FETCHER_FETCHES_TOTAL.inc();

        match self.catalog.list_services(&self.project).await {
            Ok(services) => {
                tracing::debug!(
                    project = %self.project,
                    count = services.len(),
                    "catalog snapshot replaced"
                );
                *self.snapshot.write() = services;
            }
            Err(e) => {
                metrics::FETCHER_SERVICE_LIST_ERRORS_TOTAL.inc();
                tracing::error!(
                    project = %self.project,
                    error = %e,
                    "failed to list services, keeping previous snapshot"
                );
            }
        }
    }
}

impl ServiceSource for Fetcher {
    fn services(&self) -> Vec<Service> {
        self.snapshot.read().clone()
    }
}

#[async_trait]
impl Daemon for Fetcher {
    fn name(&self) -> &'static str {
        "fetcher"
    }

    fn interval(&self) -> Duration {
        *self.interval.read()
    }

    async fn tick(&self) {
        self.fetch().await;
    }
}

/// A snapshot view restricted to an allow-list of service names.
pub struct FilteredServices {
    inner: Arc<dyn ServiceSource>,
    allowed: HashSet<String>,
}

impl FilteredServices {
    /// Restrict `inner` to the given names. Names are trimmed; blank
    /// entries are dropped.
    pub fn new(inner: Arc<dyn ServiceSource>, names: impl IntoIterator<Item = String>) -> Self {
        let allowed = names
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        Self { inner, allowed }
    }
}

impl ServiceSource for FilteredServices {
    fn services(&self) -> Vec<Service> {
        self.inner
            .services()
            .into_iter()
            .filter(|service| self.allowed.contains(&service.name))
            .collect()
    }
}

/// Load an allow-list file: one service name per line, surrounding
/// whitespace trimmed, blank lines ignored.
pub async fn load_service_names(path: impl AsRef<Path>) -> std::io::Result<Vec<String>> {
    let contents = tokio::fs::read_to_string(path).await?;
    Ok(contents
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    struct ScriptedCatalog {
        services: parking_lot::Mutex<Vec<Service>>,
        fail: AtomicBool,
    }

    impl ScriptedCatalog {
        fn returning(services: Vec<Service>) -> Self {
            Self {
                services: parking_lot::Mutex::new(services),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Catalog for ScriptedCatalog {
        async fn list_services(&self, _project: &str) -> Result<Vec<Service>, CatalogError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(CatalogError::UnexpectedStatus {
                    status: 500,
                    body: "unavailable".to_string(),
                });
            }
            Ok(self.services.lock().clone())
        }

        async fn create_integration(
            &self,
            _project: &str,
            _service_name: &str,
            _endpoint_id: &str,
            _integration_type: &str,
        ) -> Result<(), CatalogError> {
            unreachable!("fetcher never enrolls");
        }
    }

    fn named(name: &str) -> Service {
        Service {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_snapshot_empty_before_first_fetch() {
        let catalog = Arc::new(ScriptedCatalog::returning(vec![named("a")]));
        let fetcher = Fetcher::new("my-project", catalog);

        assert!(fetcher.services().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_replaces_snapshot() {
        let catalog = Arc::new(ScriptedCatalog::returning(vec![named("a"), named("b")]));
        let fetcher = Fetcher::new("my-project", catalog.clone());

        fetcher.fetch().await;
        assert_eq!(fetcher.services().len(), 2);

        *catalog.services.lock() = vec![named("c")];
        fetcher.fetch().await;

        let services = fetcher.services();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "c");
    }

    #[tokio::test]
    async fn test_failed_fetch_retains_previous_snapshot() {
        let fetches_before = metrics::FETCHER_FETCHES_TOTAL.get();
        let errors_before = metrics::FETCHER_SERVICE_LIST_ERRORS_TOTAL.get();

        let catalog = Arc::new(ScriptedCatalog::returning(vec![named("a")]));
        let fetcher = Fetcher::new("my-project", catalog.clone());

        fetcher.fetch().await;
        let before_failure = fetcher.services();

        catalog.fail.store(true, Ordering::SeqCst);
        fetcher.fetch().await;

        assert_eq!(fetcher.services(), before_failure);
        assert_eq!(metrics::FETCHER_FETCHES_TOTAL.get(), fetches_before + 2);
        assert_eq!(
            metrics::FETCHER_SERVICE_LIST_ERRORS_TOTAL.get(),
            errors_before + 1
        );
    }

    #[tokio::test]
    async fn test_readers_get_value_copies() {
        let catalog = Arc::new(ScriptedCatalog::returning(vec![named("a")]));
        let fetcher = Fetcher::new("my-project", catalog);

        fetcher.fetch().await;

        let mut copy = fetcher.services();
        copy[0].name = "mutated".to_string();

        assert_eq!(fetcher.services()[0].name, "a");
    }

    #[tokio::test]
    async fn test_filtered_services_restricts_by_name() {
        let catalog = Arc::new(ScriptedCatalog::returning(vec![
            named("keep-me"),
            named("drop-me"),
        ]));
        let fetcher = Arc::new(Fetcher::new("my-project", catalog));
        fetcher.fetch().await;

        let filtered = FilteredServices::new(
            fetcher.clone(),
            vec!["keep-me".to_string(), "  ".to_string(), String::new()],
        );

        let services = filtered.services();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].name, "keep-me");
    }

    #[tokio::test]
    async fn test_load_service_names_trims_and_skips_blanks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("names");
        tokio::fs::write(&path, "  a-service  \n\n   \nanother-service\n")
            .await
            .unwrap();

        let names = load_service_names(&path).await.unwrap();
        assert_eq!(names, vec!["a-service", "another-service"]);
    }
}
