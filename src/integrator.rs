//! Enrollment reconciler
//!
//! Each tick partitions the snapshot into ineligible, already-enrolled,
//! and to-enroll, then enrolls the remainder sequentially. No retries
//! within a tick; idempotence comes from the next catalog poll carrying
//! the integration tag.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::catalog::Catalog;
use crate::daemon::Daemon;
use crate::fetcher::ServiceSource;
use crate::metrics;
use crate::types::{Service, PROMETHEUS_INTEGRATION};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(15);

/// The only service kind eligible for enrollment.
const ELIGIBLE_SERVICE_TYPE: &str = "elasticsearch";

/// Periodic enrollment reconciler over the fetcher snapshot.
pub struct Integrator {
    project: String,
    prometheus_endpoint_id: String,

    catalog: Arc<dyn Catalog>,
    source: Arc<dyn ServiceSource>,

    interval: RwLock<Duration>,
}

impl Integrator {
    /// Create an integrator enrolling into `prometheus_endpoint_id`.
    pub fn new(
        project: impl Into<String>,
        prometheus_endpoint_id: impl Into<String>,
        catalog: Arc<dyn Catalog>,
        source: Arc<dyn ServiceSource>,
    ) -> Self {
        Self {
            project: project.into(),
            prometheus_endpoint_id: prometheus_endpoint_id.into(),
            catalog,
            source,
            interval: RwLock::new(DEFAULT_INTERVAL),
        }
    }

    /// Change the tick period; effective no later than the next tick.
    pub fn set_interval(&self, interval: Duration) {
        *self.interval.write() = interval;
    }

    fn to_enroll(services: Vec<Service>) -> Vec<Service> {
        services
            .into_iter()
            .filter(|service| !service.has_integration(PROMETHEUS_INTEGRATION))
            .filter(|service| service.service_type == ELIGIBLE_SERVICE_TYPE)
            .collect()
    }

    async fn integrate(&self) {
        let services = self.source.services();
        let to_enroll = Self::to_enroll(services);

        for service in &to_enroll {
            metrics::INTEGRATOR_CREATE_INTEGRATIONS_TOTAL.inc();

            let result = self
                .catalog
                .create_integration(
                    &self.project,
                    &service.name,
                    &self.prometheus_endpoint_id,
                    PROMETHEUS_INTEGRATION,
                )
                .await;

            match result {
                Ok(()) => {
                    tracing::info!(service = %service.name, "service integration created");
                }
                Err(e) => {
                    metrics::INTEGRATOR_CREATE_INTEGRATION_ERRORS_TOTAL.inc();
                    tracing::error!(
                        service = %service.name,
                        error = %e,
                        "failed to create service integration"
                    );
                }
            }
        }
    }
}

#[async_trait]
impl Daemon for Integrator {
    fn name(&self) -> &'static str {
        "integrator"
    }

    fn interval(&self) -> Duration {
        *self.interval.read()
    }

    async fn tick(&self) {
        self.integrate().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::types::ServiceIntegration;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeSource {
        services: parking_lot::Mutex<Vec<Service>>,
    }

    impl FakeSource {
        fn returning(services: Vec<Service>) -> Arc<Self> {
            Arc::new(Self {
                services: parking_lot::Mutex::new(services),
            })
        }

        fn set(&self, services: Vec<Service>) {
            *self.services.lock() = services;
        }
    }

    impl ServiceSource for FakeSource {
        fn services(&self) -> Vec<Service> {
            self.services.lock().clone()
        }
    }

    #[derive(Default)]
    struct RecordingCatalog {
        created: parking_lot::Mutex<Vec<(String, String, String)>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl Catalog for RecordingCatalog {
        async fn list_services(&self, _project: &str) -> Result<Vec<Service>, CatalogError> {
            unreachable!("integrator never lists");
        }

        async fn create_integration(
            &self,
            _project: &str,
            service_name: &str,
            endpoint_id: &str,
            integration_type: &str,
        ) -> Result<(), CatalogError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(CatalogError::UnexpectedStatus {
                    status: 404,
                    body: String::new(),
                });
            }
            self.created.lock().push((
                service_name.to_string(),
                endpoint_id.to_string(),
                integration_type.to_string(),
            ));
            Ok(())
        }
    }

    fn service(name: &str, service_type: &str, integrations: Vec<&str>) -> Service {
        Service {
            name: name.to_string(),
            service_type: service_type.to_string(),
            plan: String::new(),
            cloud_name: String::new(),
            node_count: 0,
            uri_params: HashMap::new(),
            integrations: integrations
                .into_iter()
                .map(ServiceIntegration::new)
                .collect(),
        }
    }

    fn integrator(catalog: Arc<RecordingCatalog>, source: Arc<FakeSource>) -> Integrator {
        Integrator::new("my-project", "endpoint-1", catalog, source)
    }

    #[tokio::test]
    async fn test_enrolls_untagged_eligible_service() {
        let catalog = Arc::new(RecordingCatalog::default());
        let source = FakeSource::returning(vec![service("a-service", "elasticsearch", vec![])]);

        integrator(catalog.clone(), source).integrate().await;

        let created = catalog.created.lock();
        assert_eq!(created.len(), 1);
        assert_eq!(
            created[0],
            (
                "a-service".to_string(),
                "endpoint-1".to_string(),
                "prometheus".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_ineligible_kind_is_never_enrolled() {
        let catalog = Arc::new(RecordingCatalog::default());
        let source = FakeSource::returning(vec![service("a-service", "influxdb", vec![])]);
        let integrator = integrator(catalog.clone(), source);

        for _ in 0..3 {
            integrator.integrate().await;
        }

        assert!(catalog.created.lock().is_empty());
    }

    #[tokio::test]
    async fn test_already_enrolled_service_is_skipped() {
        let catalog = Arc::new(RecordingCatalog::default());
        let source = FakeSource::returning(vec![service(
            "a-service",
            "elasticsearch",
            vec!["prometheus"],
        )]);

        integrator(catalog.clone(), source).integrate().await;

        assert!(catalog.created.lock().is_empty());
    }

    #[tokio::test]
    async fn test_enrollment_stops_once_upstream_reflects_the_tag() {
        let catalog = Arc::new(RecordingCatalog::default());
        let source = FakeSource::returning(vec![service("a-service", "elasticsearch", vec![])]);
        let integrator = integrator(catalog.clone(), source.clone());

        // Two ticks before the catalog reflects the enrollment: both call.
        integrator.integrate().await;
        integrator.integrate().await;
        let calls_before_tag = catalog.created.lock().len();
        assert!(calls_before_tag >= 1);

        // Snapshot now carries the tag: no further calls, ever.
        source.set(vec![service(
            "a-service",
            "elasticsearch",
            vec!["prometheus"],
        )]);
        integrator.integrate().await;
        integrator.integrate().await;

        assert_eq!(catalog.created.lock().len(), calls_before_tag);
    }

    #[tokio::test]
    async fn test_failed_enrollment_counts_and_continues() {
        let errors_before = metrics::INTEGRATOR_CREATE_INTEGRATION_ERRORS_TOTAL.get();
        let total_before = metrics::INTEGRATOR_CREATE_INTEGRATIONS_TOTAL.get();

        let catalog = Arc::new(RecordingCatalog::default());
        catalog.fail.store(true, Ordering::SeqCst);
        let source = FakeSource::returning(vec![
            service("a-service", "elasticsearch", vec![]),
            service("another-service", "elasticsearch", vec![]),
        ]);

        integrator(catalog.clone(), source).integrate().await;

        // Both services were attempted despite the first failing.
        assert_eq!(
            metrics::INTEGRATOR_CREATE_INTEGRATIONS_TOTAL.get(),
            total_before + 2
        );
        assert_eq!(
            metrics::INTEGRATOR_CREATE_INTEGRATION_ERRORS_TOTAL.get(),
            errors_before + 2
        );
    }

    #[tokio::test]
    async fn test_empty_snapshot_makes_no_calls() {
        let catalog = Arc::new(RecordingCatalog::default());
        let source = FakeSource::returning(vec![]);

        integrator(catalog.clone(), source).integrate().await;

        assert!(catalog.created.lock().is_empty());
    }
}
