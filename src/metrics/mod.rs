//! Prometheus metrics for transfer runs
//!
//! The tool is a one-shot process, so nothing is served over HTTP. The registry can
//! be written to a file in the text exposition format when the run ends.

use crate::events::{TransferEvent, TransferObserver};

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use std::path::Path;

lazy_static! {
    // Transaction metrics
    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "oft_transactions_submitted_total",
        "Total transactions submitted",
        &["network", "kind"]
    ).unwrap();

    pub static ref TX_CONFIRMED: CounterVec = register_counter_vec!(
        "oft_transactions_confirmed_total",
        "Total transactions confirmed",
        &["network", "kind"]
    ).unwrap();

    pub static ref CONFIRMATION_LATENCY: HistogramVec = register_histogram_vec!(
        "oft_confirmation_latency_seconds",
        "Time from submission to the required confirmation depth",
        &["network"],
        vec![1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    ).unwrap();

    // Workflow metrics
    pub static ref STEPS_SKIPPED: CounterVec = register_counter_vec!(
        "oft_steps_skipped_total",
        "Idempotent steps skipped because chain state already satisfied them",
        &["step"]
    ).unwrap();

    pub static ref EVENTS: CounterVec = register_counter_vec!(
        "oft_workflow_events_total",
        "Workflow events by name",
        &["network", "event"]
    ).unwrap();

    pub static ref FAILURES: CounterVec = register_counter_vec!(
        "oft_failures_total",
        "Runs aborted, by error kind",
        &["kind"]
    ).unwrap();

    // Value metrics
    pub static ref NATIVE_FEE: GaugeVec = register_gauge_vec!(
        "oft_native_fee_wei",
        "Last quoted native messaging fee",
        &["network"]
    ).unwrap();

    pub static ref TOKEN_BALANCE: GaugeVec = register_gauge_vec!(
        "oft_token_balance_base_units",
        "Last observed token balance",
        &["network", "account"]
    ).unwrap();
}

/// Records workflow events into the default registry
#[derive(Debug, Default)]
pub struct MetricsObserver;

impl TransferObserver for MetricsObserver {
    fn on_event(&self, event: &TransferEvent) {
        record_event(event);

        match event {
            TransferEvent::ApprovalSubmitted { network, .. } => {
                record_tx_submitted(network, "approve")
            }
            TransferEvent::ApprovalConfirmed { network, .. } => {
                record_tx_confirmed(network, "approve")
            }
            TransferEvent::PeerRegistrationSubmitted { from, .. } => {
                record_tx_submitted(from, "set_peer")
            }
            TransferEvent::PeerRegistered { from, .. } => record_tx_confirmed(from, "set_peer"),
            TransferEvent::SendSubmitted { network, .. } => record_tx_submitted(network, "send"),
            TransferEvent::SendConfirmed { network, .. } => record_tx_confirmed(network, "send"),
            TransferEvent::AllowanceSufficient { .. } => record_step_skipped("approval"),
            TransferEvent::PeerAlreadyLinked { .. } => record_step_skipped("peer_registration"),
            TransferEvent::FeeQuoted {
                network,
                native_fee,
            } => {
                NATIVE_FEE
                    .with_label_values(&[network])
                    .set(as_f64(*native_fee));
            }
            TransferEvent::BalanceReported {
                network,
                account,
                balance,
            } => {
                TOKEN_BALANCE
                    .with_label_values(&[network, &format!("{:?}", account)])
                    .set(as_f64(*balance));
            }
            _ => {}
        }
    }
}

// Helper functions to record metrics

pub fn record_event(event: &TransferEvent) {
    EVENTS
        .with_label_values(&[event.network(), event.name()])
        .inc();
}

pub fn record_tx_submitted(network: &str, kind: &str) {
    TX_SUBMITTED.with_label_values(&[network, kind]).inc();
}

pub fn record_tx_confirmed(network: &str, kind: &str) {
    TX_CONFIRMED.with_label_values(&[network, kind]).inc();
}

pub fn record_step_skipped(step: &str) {
    STEPS_SKIPPED.with_label_values(&[step]).inc();
}

pub fn record_confirmation_latency(network: &str, latency_secs: f64) {
    CONFIRMATION_LATENCY
        .with_label_values(&[network])
        .observe(latency_secs);
}

pub fn record_failure(kind: &str) {
    FAILURES.with_label_values(&[kind]).inc();
}

/// Render the default registry in the text exposition format
pub fn render() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not UTF-8")
}

/// Write the registry atomically (temp file + rename) for a textfile collector
pub fn write_textfile(path: &Path) -> Result<()> {
    let body = render()?;
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, body).with_context(|| format!("Failed to write {:?}", tmp))?;
    std::fs::rename(&tmp, path).with_context(|| format!("Failed to move metrics to {:?}", path))?;
    Ok(())
}

fn as_f64(value: ethers::types::U256) -> f64 {
    // lossy above 2^53, which is fine for a gauge
    value.to_string().parse().unwrap_or(f64::MAX)
}
