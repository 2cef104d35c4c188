//! Prometheus metrics collection for spamgate.
//!
//! - `antispam_checks_total{category,result}` - events checked
//! - `antispam_blocks_total{layer,kind}` - fresh blocks
//! - `antispam_notices_total{kind}` - block notices emitted
//! - `antispam_pending_notifications` - object notices waiting on names
//!
//! Recording before [`init`] is a silent no-op, so unit tests never need it.

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

use crate::antispam::{BlockLayer, Category, SourceKind};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Events checked, by category and outcome.
pub static CHECKS: OnceLock<IntCounterVec> = OnceLock::new();

/// Fresh blocks, by layer and source kind.
pub static BLOCKS: OnceLock<IntCounterVec> = OnceLock::new();

/// Block notices handed to the notifier.
pub static NOTICES: OnceLock<IntCounterVec> = OnceLock::new();

/// Object notifications currently waiting for names.
pub static PENDING_NOTIFICATIONS: OnceLock<IntGauge> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Call once at startup; later calls are harmless.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    if CHECKS.get().is_some() {
        return;
    }

    register!(CHECKS, IntCounterVec::new(Opts::new("antispam_checks_total", "Events checked by category and result"), &["category", "result"]));
    register!(BLOCKS, IntCounterVec::new(Opts::new("antispam_blocks_total", "Fresh blocks by layer and source kind"), &["layer", "kind"]));
    register!(NOTICES, IntCounterVec::new(Opts::new("antispam_notices_total", "Block notices emitted"), &["kind"]));
    register!(PENDING_NOTIFICATIONS, IntGauge::new("antispam_pending_notifications", "Object notifications waiting for names"));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

#[inline]
pub fn record_check(category: Category, allowed: bool) {
    if let Some(c) = CHECKS.get() {
        let result = if allowed { "allowed" } else { "denied" };
        c.with_label_values(&[category.as_str(), result]).inc();
    }
}

#[inline]
pub fn record_block(layer: BlockLayer, kind: SourceKind) {
    if let Some(c) = BLOCKS.get() {
        c.with_label_values(&[layer.as_str(), kind.as_str()]).inc();
    }
}

#[inline]
pub fn record_notice(kind: SourceKind) {
    if let Some(c) = NOTICES.get() {
        c.with_label_values(&[kind.as_str()]).inc();
    }
}

#[inline]
pub fn set_pending_notifications(count: usize) {
    if let Some(g) = PENDING_NOTIFICATIONS.get() {
        g.set(i64::try_from(count).unwrap_or(i64::MAX));
    }
}
