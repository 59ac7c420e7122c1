//! DNS discovery and target publication
//!
//! Each tick resolves every snapshot service that already carries the
//! prometheus integration, sharded round-robin across a fixed pool of
//! workers, then publishes the collected target groups. Publication
//! happens even when nothing qualified, so readers see `[]` rather than
//! stale targets.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::daemon::Daemon;
use crate::fetcher::ServiceSource;
use crate::metrics;
use crate::resolver::Resolve;
use crate::types::{Service, TargetGroup, PROMETHEUS_INTEGRATION};
use crate::writer::WriteTargets;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(45);

/// Fan-out width of the per-tick worker pool.
const DNS_DISCOVERY_CONCURRENCY: usize = 5;

/// Periodic resolver and publisher over the fetcher snapshot.
pub struct Discoverer {
    source: Arc<dyn ServiceSource>,
    resolver: Arc<dyn Resolve>,
    writer: Arc<dyn WriteTargets>,

    interval: RwLock<Duration>,
}

impl Discoverer {
    /// Create a discoverer publishing through `writer`.
    pub fn new(
        source: Arc<dyn ServiceSource>,
        resolver: Arc<dyn Resolve>,
        writer: Arc<dyn WriteTargets>,
    ) -> Self {
        Self {
            source,
            resolver,
            writer,
            interval: RwLock::new(DEFAULT_INTERVAL),
        }
    }

    /// Change the tick period; effective no later than the next tick.
    pub fn set_interval(&self, interval: Duration) {
        *self.interval.write() = interval;
    }

    async fn discover_and_write(&self) {
        let services = self.source.services();

        let with_prometheus: Vec<Service> = services
            .into_iter()
            .filter(|service| service.has_integration(PROMETHEUS_INTEGRATION))
            .collect();

        let targets = self.perform_dns_discovery(with_prometheus).await;

        tracing::debug!(count = targets.len(), "publishing targets");
        if let Err(e) = self.writer.write(&targets).await {
            tracing::error!(error = %e, "target publication failed");
        }
    }

    async fn perform_dns_discovery(&self, services: Vec<Service>) -> Vec<TargetGroup> {
        let capacity = services.len().max(1);
        let (results_tx, mut results_rx) = mpsc::channel(capacity);

        // Deterministic round-robin sharding by input position.
        let mut shards: Vec<Vec<Service>> = vec![Vec::new(); DNS_DISCOVERY_CONCURRENCY];
        for (index, service) in services.into_iter().enumerate() {
            shards[index % DNS_DISCOVERY_CONCURRENCY].push(service);
        }

        let mut workers = Vec::with_capacity(DNS_DISCOVERY_CONCURRENCY);
        for shard in shards {
            let resolver = Arc::clone(&self.resolver);
            let results = results_tx.clone();
            workers.push(tokio::spawn(discover_shard(resolver, shard, results)));
        }
        drop(results_tx);

        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "discovery worker failed");
            }
        }

        let mut targets = Vec::new();
        while let Some(target) = results_rx.recv().await {
            targets.push(target);
        }

        targets
    }
}

async fn discover_shard(
    resolver: Arc<dyn Resolve>,
    shard: Vec<Service>,
    results: mpsc::Sender<TargetGroup>,
) {
    for service in shard {
        metrics::DISCOVERER_DNS_DISCOVERIES_TOTAL.inc();

        let Some(hostname) = service.hostname().map(str::to_string) else {
            metrics::DISCOVERER_DNS_DISCOVERY_ERRORS_TOTAL.inc();
            tracing::error!(service = %service.name, "service has no hostname");
            continue;
        };

        match resolver.resolve(&hostname).await {
            Ok(addresses) => {
                let target = TargetGroup::for_service(&service, &hostname, addresses);
                let _ = results.send(target).await;
            }
            Err(e) => {
                metrics::DISCOVERER_DNS_DISCOVERY_ERRORS_TOTAL.inc();
                tracing::error!(
                    service = %service.name,
                    hostname = %hostname,
                    error = %e,
                    "hostname resolution failed"
                );
            }
        }
    }
}

#[async_trait]
impl Daemon for Discoverer {
    fn name(&self) -> &'static str {
        "discoverer"
    }

    fn interval(&self) -> Duration {
        *self.interval.read()
    }

    async fn tick(&self) {
        self.discover_and_write().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use crate::types::ServiceIntegration;
    use crate::writer::FileTargetWriter;
    use std::collections::HashMap;
    use std::net::IpAddr;
    use tempfile::TempDir;

    struct FakeSource {
        services: parking_lot::Mutex<Vec<Service>>,
    }

    impl FakeSource {
        fn returning(services: Vec<Service>) -> Arc<Self> {
            Arc::new(Self {
                services: parking_lot::Mutex::new(services),
            })
        }
    }

    impl ServiceSource for FakeSource {
        fn services(&self) -> Vec<Service> {
            self.services.lock().clone()
        }
    }

    struct FakeResolver {
        ips: parking_lot::Mutex<Vec<IpAddr>>,
        fail: parking_lot::Mutex<bool>,
    }

    impl FakeResolver {
        fn returning(ips: Vec<IpAddr>) -> Arc<Self> {
            Arc::new(Self {
                ips: parking_lot::Mutex::new(ips),
                fail: parking_lot::Mutex::new(false),
            })
        }

        fn failing() -> Arc<Self> {
            let resolver = Self::returning(vec![]);
            *resolver.fail.lock() = true;
            resolver
        }
    }

    #[async_trait]
    impl Resolve for FakeResolver {
        async fn resolve(&self, hostname: &str) -> Result<Vec<IpAddr>, ResolveError> {
            if *self.fail.lock() {
                return Err(ResolveError::Lookup {
                    hostname: hostname.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "no such host"),
                });
            }
            Ok(self.ips.lock().clone())
        }
    }

    fn prometheus_service(name: &str, host: &str) -> Service {
        Service {
            name: name.to_string(),
            service_type: "elasticsearch".to_string(),
            plan: "tiny-6.x".to_string(),
            cloud_name: "aws-eu-west-1".to_string(),
            node_count: 3,
            uri_params: HashMap::from([("host".to_string(), host.to_string())]),
            integrations: vec![ServiceIntegration::new("prometheus")],
        }
    }

    async fn read_targets(path: &std::path::Path) -> serde_json::Value {
        serde_json::from_str(&tokio::fs::read_to_string(path).await.unwrap()).unwrap()
    }

    fn discoverer_with(
        source: Arc<FakeSource>,
        resolver: Arc<FakeResolver>,
        path: &std::path::Path,
    ) -> Discoverer {
        Discoverer::new(source, resolver, Arc::new(FileTargetWriter::new(path)))
    }

    #[tokio::test]
    async fn test_happy_path_publishes_resolved_targets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("targets.json");

        let source = FakeSource::returning(vec![prometheus_service(
            "a",
            "an-instance.example",
        )]);
        let resolver = FakeResolver::returning(vec!["1.2.3.4".parse().unwrap()]);

        discoverer_with(source, resolver, &path)
            .discover_and_write()
            .await;

        assert_eq!(
            read_targets(&path).await,
            serde_json::json!([{
                "targets": ["1.2.3.4"],
                "labels": {
                    "aiven_service_name": "a",
                    "aiven_service_type": "elasticsearch",
                    "aiven_hostname": "an-instance.example",
                    "aiven_plan": "tiny-6.x",
                    "aiven_cloud": "aws-eu-west-1",
                    "aiven_node_count": "3"
                }
            }])
        );
    }

    #[tokio::test]
    async fn test_empty_filter_still_publishes_empty_list() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("targets.json");

        // One service without the prometheus tag: filtered out entirely.
        let mut untagged = prometheus_service("a", "an-instance.example");
        untagged.integrations.clear();
        let source = FakeSource::returning(vec![untagged]);
        let resolver = FakeResolver::returning(vec!["1.2.3.4".parse().unwrap()]);

        discoverer_with(source, resolver, &path)
            .discover_and_write()
            .await;

        assert_eq!(read_targets(&path).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_resolver_failure_omits_entry_and_counts() {
        let errors_before = metrics::DISCOVERER_DNS_DISCOVERY_ERRORS_TOTAL.get();
        let attempts_before = metrics::DISCOVERER_DNS_DISCOVERIES_TOTAL.get();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("targets.json");

        let source = FakeSource::returning(vec![prometheus_service(
            "a",
            "an-instance.example",
        )]);
        let resolver = FakeResolver::failing();

        discoverer_with(source, resolver, &path)
            .discover_and_write()
            .await;

        assert_eq!(read_targets(&path).await, serde_json::json!([]));
        assert_eq!(
            metrics::DISCOVERER_DNS_DISCOVERY_ERRORS_TOTAL.get(),
            errors_before + 1
        );
        assert_eq!(
            metrics::DISCOVERER_DNS_DISCOVERIES_TOTAL.get(),
            attempts_before + 1
        );
    }

    #[tokio::test]
    async fn test_missing_hostname_omits_entry_and_counts() {
        let errors_before = metrics::DISCOVERER_DNS_DISCOVERY_ERRORS_TOTAL.get();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("targets.json");

        let mut hostless = prometheus_service("a", "unused");
        hostless.uri_params.clear();
        let source = FakeSource::returning(vec![hostless]);
        let resolver = FakeResolver::returning(vec!["1.2.3.4".parse().unwrap()]);

        discoverer_with(source, resolver, &path)
            .discover_and_write()
            .await;

        assert_eq!(read_targets(&path).await, serde_json::json!([]));
        assert_eq!(
            metrics::DISCOVERER_DNS_DISCOVERY_ERRORS_TOTAL.get(),
            errors_before + 1
        );
    }

    #[tokio::test]
    async fn test_empty_address_set_still_emits_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("targets.json");

        let source = FakeSource::returning(vec![prometheus_service(
            "a",
            "an-instance.example",
        )]);
        let resolver = FakeResolver::returning(vec![]);

        discoverer_with(source, resolver, &path)
            .discover_and_write()
            .await;

        let parsed = read_targets(&path).await;
        assert_eq!(parsed.as_array().unwrap().len(), 1);
        assert_eq!(parsed[0]["targets"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_all_services_discovered_across_shards() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("targets.json");

        // More services than workers, so every shard gets work.
        let services: Vec<Service> = (0..12)
            .map(|i| prometheus_service(&format!("service-{i}"), &format!("host-{i}.example")))
            .collect();
        let source = FakeSource::returning(services);
        let resolver = FakeResolver::returning(vec!["1.2.3.4".parse().unwrap()]);

        discoverer_with(source, resolver, &path)
            .discover_and_write()
            .await;

        let parsed = read_targets(&path).await;
        let entries = parsed.as_array().unwrap();
        assert_eq!(entries.len(), 12);

        let mut names: Vec<String> = entries
            .iter()
            .map(|e| e["labels"]["aiven_service_name"].as_str().unwrap().to_string())
            .collect();
        names.sort();
        let expected: Vec<String> = {
            let mut v: Vec<String> = (0..12).map(|i| format!("service-{i}")).collect();
            v.sort();
            v
        };
        assert_eq!(names, expected);
    }
}
