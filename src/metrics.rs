//! Application counters, exported in Prometheus text format at `/metrics`.

use ::metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const SUBSCRIPTIONS_CREATED: &str = "meetapp_subscriptions_created_total";
pub const SUBSCRIPTIONS_REJECTED: &str = "meetapp_subscriptions_rejected_total";
pub const MAIL_SENT: &str = "meetapp_mail_sent_total";

/// Installs the global Prometheus recorder. Call once, at startup.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}

pub fn subscription_created() {
    counter!(SUBSCRIPTIONS_CREATED).increment(1);
}

pub fn subscription_rejected(reason: &'static str) {
    counter!(SUBSCRIPTIONS_REJECTED, "reason" => reason).increment(1);
}

pub fn mail_sent(ok: bool) {
    let outcome = if ok { "sent" } else { "failed" };
    counter!(MAIL_SENT, "outcome" => outcome).increment(1);
}
