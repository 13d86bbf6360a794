//! In-memory monitoring: request counters, latency samples and score drift.

use crate::config::MonitoringConfig;
use crate::drift::{compute_psi, to_f64, DriftStatus, ReferenceDistribution, ScoreHistogram};
use crate::types::decision::Decision;
use crate::types::event::PredictionEvent;
use anyhow::Result;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Kind of request outcome counted by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Approve,
    Review,
    Error,
}

impl From<Decision> for OutcomeKind {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => OutcomeKind::Approve,
            Decision::Review => OutcomeKind::Review,
        }
    }
}

/// Shared monitoring state, one instance per service
pub struct MonitoringState {
    total_errors: AtomicU64,
    approvals: AtomicU64,
    reviews: AtomicU64,
    recommendations: AtomicU64,
    bandit_updates: AtomicU64,
    /// Every latency sample ever recorded, including evicted ones
    latencies_recorded: AtomicU64,
    /// Most recent latency samples in milliseconds; oldest evicted first
    latencies_ms: RwLock<VecDeque<f64>>,
    latency_capacity: usize,
    /// Live approval scores bucketed on the reference edges
    score_counts: RwLock<Vec<u64>>,
    reference: ReferenceDistribution,
    histogram: ScoreHistogram,
    /// Recent prediction events for audit
    recent_events: RwLock<VecDeque<PredictionEvent>>,
    max_events_kept: usize,
    /// Start time for uptime reporting
    start_time: Instant,
}

impl MonitoringState {
    /// Create a monitor with the given latency capacity and score reference
    pub fn new(
        latency_capacity: usize,
        max_events_kept: usize,
        reference: ReferenceDistribution,
    ) -> Self {
        let histogram = reference.histogram();
        let buckets = histogram.bucket_count();
        Self {
            total_errors: AtomicU64::new(0),
            approvals: AtomicU64::new(0),
            reviews: AtomicU64::new(0),
            recommendations: AtomicU64::new(0),
            bandit_updates: AtomicU64::new(0),
            latencies_recorded: AtomicU64::new(0),
            latencies_ms: RwLock::new(VecDeque::with_capacity(latency_capacity.min(1024))),
            latency_capacity: latency_capacity.max(1),
            score_counts: RwLock::new(vec![0; buckets]),
            reference,
            histogram,
            recent_events: RwLock::new(VecDeque::new()),
            max_events_kept,
            start_time: Instant::now(),
        }
    }

    /// Build the monitor from configuration, loading the score reference when present
    pub fn from_config(config: &MonitoringConfig) -> Result<Self> {
        let reference = match config.reference_path.as_deref() {
            Some(path) if Path::new(path).exists() => {
                let reference = ReferenceDistribution::load(path)?;
                info!(path = %path, buckets = reference.frequencies.len(), "Score reference loaded");
                reference
            }
            Some(path) => {
                warn!(path = %path, "Score reference not found, using uniform buckets");
                ReferenceDistribution::uniform(config.psi_buckets)
            }
            None => ReferenceDistribution::uniform(config.psi_buckets),
        };
        Ok(Self::new(
            config.latency_capacity,
            config.max_events_kept,
            reference,
        ))
    }

    /// Record one request latency in milliseconds
    pub fn record_latency(&self, ms: f64) {
        if !ms.is_finite() || ms < 0.0 {
            warn!(latency_ms = ms, "Ignoring invalid latency sample");
            return;
        }

        self.latencies_recorded.fetch_add(1, Ordering::Relaxed);
        let mut samples = self.latencies_ms.write();
        if samples.len() >= self.latency_capacity {
            samples.pop_front();
        }
        samples.push_back(ms);
    }

    /// Record the elapsed time of a request
    pub fn record_duration(&self, elapsed: Duration) {
        self.record_latency(elapsed.as_secs_f64() * 1000.0);
    }

    /// Count a request outcome
    pub fn record_outcome(&self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Approve => {
                self.approvals.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeKind::Review => {
                self.reviews.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeKind::Error => {
                self.total_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Bucket a live approval score for drift tracking
    pub fn record_score(&self, score: f64) {
        if !score.is_finite() {
            return;
        }
        let bucket = self.histogram.bucket_index(score);
        self.score_counts.write()[bucket] += 1;
    }

    /// Record a scored application: outcome, score, latency and audit event
    pub fn record_prediction(&self, event: PredictionEvent, latency: Option<Duration>) {
        self.record_outcome(event.decision.into());
        self.record_score(event.approval_risk);
        if let Some(latency) = latency {
            self.record_duration(latency);
        }

        info!(
            dealer_id = %event.dealer_id,
            region = %event.region,
            risk = event.approval_risk,
            decision = %event.decision,
            model = %event.model_name,
            version = ?event.model_version,
            "prediction_event"
        );

        if self.max_events_kept == 0 {
            return;
        }
        let mut events = self.recent_events.write();
        if events.len() >= self.max_events_kept {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub fn record_recommendation(&self) {
        self.recommendations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bandit_update(&self) {
        self.bandit_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Last `limit` prediction events, oldest first
    pub fn recent_events(&self, limit: usize) -> Vec<PredictionEvent> {
        let events = self.recent_events.read();
        let skip = events.len().saturating_sub(limit);
        events.iter().skip(skip).cloned().collect()
    }

    /// Latency statistics over the retained samples
    pub fn latency_stats(&self) -> LatencyStats {
        // Shallow copy under the lock; sort and aggregate after release.
        let mut sorted: Vec<f64> = self.latencies_ms.read().iter().copied().collect();
        let total_recorded = self.latencies_recorded.load(Ordering::Relaxed);
        if sorted.is_empty() {
            return LatencyStats {
                total_recorded,
                capacity: self.latency_capacity,
                ..LatencyStats::default()
            };
        }
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        LatencyStats {
            count,
            total_recorded,
            capacity: self.latency_capacity,
            mean_ms: Some(sorted.iter().sum::<f64>() / count as f64),
            p50_ms: Some(percentile(&sorted, 50.0)),
            p95_ms: Some(percentile(&sorted, 95.0)),
            p99_ms: Some(percentile(&sorted, 99.0)),
            max_ms: sorted.last().copied(),
        }
    }

    /// Drift of live scores against the reference
    pub fn drift(&self) -> DriftSnapshot {
        let current = self.score_counts.read().clone();
        let observed: u64 = current.iter().sum();

        let psi = if observed == 0 {
            None
        } else {
            match compute_psi(&self.reference.frequencies, &to_f64(&current)) {
                Ok(psi) => Some(psi),
                Err(e) => {
                    warn!(error = %e, "PSI computation failed");
                    None
                }
            }
        };

        DriftSnapshot {
            psi,
            status: psi.map(DriftStatus::from_psi),
            observed_scores: observed,
            bucket_edges: self.reference.edges.clone(),
            reference_frequencies: self.reference.frequencies.clone(),
            current_counts: current,
        }
    }

    /// Immutable view of all counters for the metrics endpoint
    pub fn snapshot(&self) -> MetricsSnapshot {
        // Total is the sum of its parts; rates stay within [0, 1]
        let approvals = self.approvals.load(Ordering::Relaxed);
        let reviews = self.reviews.load(Ordering::Relaxed);
        let total_requests = approvals + reviews;
        let total_errors = self.total_errors.load(Ordering::Relaxed);

        // avoid div by zero
        let denominator = total_requests.max(1) as f64;

        MetricsSnapshot {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            total_requests,
            total_errors,
            error_rate: total_errors as f64 / denominator,
            approvals,
            reviews,
            approval_rate: approvals as f64 / denominator,
            review_rate: reviews as f64 / denominator,
            recommendations: self.recommendations.load(Ordering::Relaxed),
            bandit_updates: self.bandit_updates.load(Ordering::Relaxed),
            latency: self.latency_stats(),
            drift: self.drift(),
        }
    }

    /// Log summary statistics
    pub fn log_summary(&self) {
        let snapshot = self.snapshot();
        info!(
            uptime_s = snapshot.uptime_seconds,
            requests = snapshot.total_requests,
            errors = snapshot.total_errors,
            approval_rate = format!("{:.1}%", snapshot.approval_rate * 100.0),
            review_rate = format!("{:.1}%", snapshot.review_rate * 100.0),
            recommendations = snapshot.recommendations,
            bandit_updates = snapshot.bandit_updates,
            "Monitoring summary"
        );
        info!(
            samples = snapshot.latency.count,
            mean_ms = ?snapshot.latency.mean_ms,
            p50_ms = ?snapshot.latency.p50_ms,
            p95_ms = ?snapshot.latency.p95_ms,
            p99_ms = ?snapshot.latency.p99_ms,
            "Latency summary"
        );
        if let (Some(psi), Some(status)) = (snapshot.drift.psi, snapshot.drift.status) {
            info!(
                psi = format!("{psi:.4}"),
                status = ?status,
                scores = snapshot.drift.observed_scores,
                "Score drift"
            );
        }
    }
}

/// Latency statistics in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencyStats {
    /// Samples currently retained
    pub count: usize,
    /// Samples recorded since start, including evicted ones
    pub total_recorded: u64,
    pub capacity: usize,
    pub mean_ms: Option<f64>,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

/// Score drift against the training reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftSnapshot {
    /// `None` until a live score has been recorded
    pub psi: Option<f64>,
    pub status: Option<DriftStatus>,
    pub observed_scores: u64,
    pub bucket_edges: Vec<f64>,
    pub reference_frequencies: Vec<f64>,
    pub current_counts: Vec<u64>,
}

/// Everything the metrics endpoint reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub total_errors: u64,
    pub error_rate: f64,
    pub approvals: u64,
    pub reviews: u64,
    pub approval_rate: f64,
    pub review_rate: f64,
    pub recommendations: u64,
    pub bandit_updates: u64,
    pub latency: LatencyStats,
    pub drift: DriftSnapshot,
}

/// Linear-interpolated percentile of an ascending, non-empty sample
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let k = (sorted.len() - 1) as f64 * (p / 100.0);
    let f = k.floor() as usize;
    let c = (f + 1).min(sorted.len() - 1);
    if f == c {
        return sorted[f];
    }
    sorted[f] + (sorted[c] - sorted[f]) * (k - f as f64)
}

/// Periodic reporter that logs monitoring summaries
pub struct MetricsReporter {
    metrics: Arc<MonitoringState>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<MonitoringState>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.log_summary();
        }
    }
}
