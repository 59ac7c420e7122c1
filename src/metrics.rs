//! Process-global prometheus counters
//!
//! Registered once in the default registry and never reset. Tests must
//! assert on deltas, not absolute values, because the registry is shared
//! across the whole test process.

use once_cell::sync::Lazy;
use prometheus::{register_int_counter, IntCounter};

/// Total catalog poll attempts.
pub static FETCHER_FETCHES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "fetcher_fetches_total",
        "Counter of total number of fetcher calls"
    )
    .expect("register fetcher_fetches_total")
});

/// Total catalog poll failures.
pub static FETCHER_SERVICE_LIST_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "fetcher_aiven_service_list_errors_total",
        "Counter of total number of Aiven list services API failures"
    )
    .expect("register fetcher_aiven_service_list_errors_total")
});

/// Total enrollment attempts.
pub static INTEGRATOR_CREATE_INTEGRATIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "integrator_create_service_integrations_total",
        "Counter of total number of calls to create a service integration"
    )
    .expect("register integrator_create_service_integrations_total")
});

/// Total enrollment failures.
pub static INTEGRATOR_CREATE_INTEGRATION_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "integrator_create_service_integration_errors_total",
        "Counter of total number of Aiven create service integration failures"
    )
    .expect("register integrator_create_service_integration_errors_total")
});

/// Total per-service discovery attempts.
pub static DISCOVERER_DNS_DISCOVERIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "discoverer_dns_discoveries_total",
        "Counter of total number of DNS discoveries"
    )
    .expect("register discoverer_dns_discoveries_total")
});

/// Total per-service discovery failures (hostname derivation or resolution).
pub static DISCOVERER_DNS_DISCOVERY_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "discoverer_dns_discovery_errors_total",
        "Counter of total number of DNS discovery errors"
    )
    .expect("register discoverer_dns_discovery_errors_total")
});

/// Total target file writes.
pub static DISCOVERER_WRITE_TARGETS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "discoverer_write_targets_total",
        "Counter of total number of target file writes"
    )
    .expect("register discoverer_write_targets_total")
});

/// Total target file write failures.
pub static DISCOVERER_WRITE_TARGETS_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "discoverer_write_targets_errors_total",
        "Counter of total number of target file write failures"
    )
    .expect("register discoverer_write_targets_errors_total")
});

/// Total resolver calls.
pub static RESOLVER_RESOLVES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "resolver_resolves_total",
        "Counter of total number of IP resolver calls"
    )
    .expect("register resolver_resolves_total")
});

/// Total resolver calls which returned errors.
pub static RESOLVER_RESOLVE_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "resolver_resolve_failures_total",
        "Counter of total IP resolver calls which returned errors"
    )
    .expect("register resolver_resolve_failures_total")
});

/// Total audit events delivered to the sink.
pub static EVENTS_SHIPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "bosh_auditor_events_shipped_to_splunk_total",
        "Counter of total number of bosh events shipped to splunk"
    )
    .expect("register bosh_auditor_events_shipped_to_splunk_total")
});

/// Total audit-event list failures.
pub static EVENT_FETCH_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "bosh_auditor_event_fetch_errors_total",
        "Counter of total number of bosh event list failures"
    )
    .expect("register bosh_auditor_event_fetch_errors_total")
});

/// Force registration of every counter so scrapes report zeros before the
/// first tick.
pub fn register() {
    once_cell::sync::Lazy::force(&FETCHER_FETCHES_TOTAL);
    once_cell::sync::Lazy::force(&FETCHER_SERVICE_LIST_ERRORS_TOTAL);
    once_cell::sync::Lazy::force(&INTEGRATOR_CREATE_INTEGRATIONS_TOTAL);
    once_cell::sync::Lazy::force(&INTEGRATOR_CREATE_INTEGRATION_ERRORS_TOTAL);
    once_cell::sync::Lazy::force(&DISCOVERER_DNS_DISCOVERIES_TOTAL);
    once_cell::sync::Lazy::force(&DISCOVERER_DNS_DISCOVERY_ERRORS_TOTAL);
    once_cell::sync::Lazy::force(&DISCOVERER_WRITE_TARGETS_TOTAL);
    once_cell::sync::Lazy::force(&DISCOVERER_WRITE_TARGETS_ERRORS_TOTAL);
    once_cell::sync::Lazy::force(&RESOLVER_RESOLVES_TOTAL);
    once_cell::sync::Lazy::force(&RESOLVER_RESOLVE_FAILURES_TOTAL);
    once_cell::sync::Lazy::force(&EVENTS_SHIPPED_TOTAL);
    once_cell::sync::Lazy::force(&EVENT_FETCH_ERRORS_TOTAL);
}
