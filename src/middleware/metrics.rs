//! Request metrics
//!
//! Count and latency per `(method, error)` label pair, rendered in the
//! Prometheus text exposition format.

use std::collections::VecDeque;
use std::fmt::Write;
use std::time::Duration;

use dashmap::DashMap;

pub const NAMESPACE: &str = "wallet_funds_transfer_service";

/// Latency samples kept per label pair for quantiles
const SAMPLE_WINDOW: usize = 1024;

const QUANTILES: [f64; 3] = [50.0, 90.0, 99.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct Labels {
    method: &'static str,
    error: bool,
}

#[derive(Debug, Default)]
struct Series {
    count: u64,
    latency_sum_us: u64,
    samples: VecDeque<u64>,
}

impl Series {
    fn observe(&mut self, latency_us: u64) {
        self.count += 1;
        self.latency_sum_us = self.latency_sum_us.saturating_add(latency_us);
        if self.samples.len() == SAMPLE_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(latency_us);
    }

    /// Percentile (0-100) of the sample window
    fn percentile(&self, p: f64) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        Some(sorted[idx.min(sorted.len() - 1)])
    }
}

#[derive(Debug, Default)]
pub struct WalletMetrics {
    series: DashMap<Labels, Series>,
}

impl WalletMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, method: &'static str, error: bool, latency: Duration) {
        let latency_us = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.series
            .entry(Labels { method, error })
            .or_default()
            .observe(latency_us);
    }

    pub fn request_count(&self, method: &str, error: bool) -> u64 {
        self.series
            .iter()
            .find(|e| e.key().method == method && e.key().error == error)
            .map(|e| e.value().count)
            .unwrap_or(0)
    }

    pub fn percentile(&self, method: &str, error: bool, p: f64) -> Option<u64> {
        self.series
            .iter()
            .find(|e| e.key().method == method && e.key().error == error)
            .and_then(|e| e.value().percentile(p))
    }

    pub fn render_prometheus(&self) -> String {
        let mut labels: Vec<Labels> = self.series.iter().map(|e| *e.key()).collect();
        labels.sort();

        let mut out = String::new();
        let _ = writeln!(out, "# HELP {NAMESPACE}_request_count Number of requests received.");
        let _ = writeln!(out, "# TYPE {NAMESPACE}_request_count counter");
        for l in &labels {
            if let Some(s) = self.series.get(l) {
                let _ = writeln!(
                    out,
                    "{NAMESPACE}_request_count{{method=\"{}\",error=\"{}\"}} {}",
                    l.method, l.error, s.count
                );
            }
        }

        let _ = writeln!(
            out,
            "# HELP {NAMESPACE}_request_latency_microseconds Duration of requests in microseconds."
        );
        let _ = writeln!(out, "# TYPE {NAMESPACE}_request_latency_microseconds summary");
        for l in &labels {
            let Some(s) = self.series.get(l) else {
                continue;
            };
            for q in QUANTILES {
                if let Some(v) = s.percentile(q) {
                    let _ = writeln!(
                        out,
                        "{NAMESPACE}_request_latency_microseconds{{method=\"{}\",error=\"{}\",quantile=\"{}\"}} {}",
                        l.method,
                        l.error,
                        q / 100.0,
                        v
                    );
                }
            }
            let _ = writeln!(
                out,
                "{NAMESPACE}_request_latency_microseconds_sum{{method=\"{}\",error=\"{}\"}} {}",
                l.method, l.error, s.latency_sum_us
            );
            let _ = writeln!(
                out,
                "{NAMESPACE}_request_latency_microseconds_count{{method=\"{}\",error=\"{}\"}} {}",
                l.method, l.error, s.count
            );
        }
        out
    }
}
