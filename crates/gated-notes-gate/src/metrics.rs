use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static INVOICES_ISSUED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("gate_invoices_issued_total", "Invoices minted for gated notes")
        .expect("metric options are valid")
});

pub static RELEASES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gate_releases_total",
        "Payment requests transitioned to PAID",
    )
    .expect("metric options are valid")
});

pub static PENDING_CHECKS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gate_pending_checks_total",
        "Settlement checks that found the invoice unpaid",
    )
    .expect("metric options are valid")
});

pub static CROSS_REFERENCE_REJECTIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "gate_cross_reference_rejections_total",
        "Payment hashes presented for a note they were not issued for",
    )
    .expect("metric options are valid")
});

pub static PROVIDER_ERRORS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("gate_provider_errors_total", "Failed payment provider calls")
        .expect("metric options are valid")
});

pub static PUBLICATIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("gate_publications_total", "Publication attempts by outcome"),
        &["outcome"],
    )
    .expect("metric options are valid")
});

/// Register all metrics with the registry.
pub fn register_metrics() {
    let collectors: [Box<dyn prometheus::core::Collector>; 6] = [
        Box::new(INVOICES_ISSUED.clone()),
        Box::new(RELEASES.clone()),
        Box::new(PENDING_CHECKS.clone()),
        Box::new(CROSS_REFERENCE_REJECTIONS.clone()),
        Box::new(PROVIDER_ERRORS.clone()),
        Box::new(PUBLICATIONS.clone()),
    ];
    for collector in collectors {
        if let Err(e) = REGISTRY.register(collector) {
            tracing::warn!(error = %e, "failed to register metric");
        }
    }
}
