//! Population Stability Index and score histograms for drift monitoring.
//!
//! PSI = Σ (current_% - reference_%) × ln(current_% / reference_%)
//!
//! Interpretation (advisory only):
//! - PSI < 0.1: stable
//! - PSI 0.1 - 0.25: moderate shift
//! - PSI > 0.25: significant shift

use crate::error::ServiceError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Substituted for empty buckets so the log and ratio stay defined
pub const PSI_EPSILON: f64 = 1e-4;

pub const PSI_MODERATE: f64 = 0.1;
pub const PSI_SIGNIFICANT: f64 = 0.25;

/// Advisory reading of a PSI value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftStatus {
    Stable,
    Moderate,
    Significant,
}

impl DriftStatus {
    pub fn from_psi(psi: f64) -> Self {
        if psi < PSI_MODERATE {
            DriftStatus::Stable
        } else if psi <= PSI_SIGNIFICANT {
            DriftStatus::Moderate
        } else {
            DriftStatus::Significant
        }
    }
}

/// Compute PSI between two bucketed frequency vectors.
///
/// Both vectors are normalized to sum to 1 and empty buckets are replaced
/// with [`PSI_EPSILON`] before the sum is taken.
pub fn compute_psi(reference: &[f64], current: &[f64]) -> Result<f64, ServiceError> {
    if reference.is_empty() || current.is_empty() {
        return Err(ServiceError::invalid("PSI needs at least one bucket"));
    }
    if reference.len() != current.len() {
        return Err(ServiceError::invalid(format!(
            "PSI bucket count mismatch: reference has {}, current has {}",
            reference.len(),
            current.len()
        )));
    }

    let reference = normalize(reference, "reference")?;
    let current = normalize(current, "current")?;

    let psi: f64 = reference
        .iter()
        .zip(current.iter())
        .map(|(&r, &c)| {
            let r = if r == 0.0 { PSI_EPSILON } else { r };
            let c = if c == 0.0 { PSI_EPSILON } else { c };
            (c - r) * (c / r).ln()
        })
        .sum();

    // Every term is non-negative; clamp away rounding noise.
    Ok(psi.max(0.0))
}

/// PSI of two raw samples, bucketed on quantiles of the expected sample.
///
/// Returns 0.0 when either sample is empty or the expected sample has too
/// little variation for two distinct cut points.
pub fn psi_from_samples(expected: &[f64], actual: &[f64], buckets: usize) -> f64 {
    let expected: Vec<f64> = expected.iter().copied().filter(|v| v.is_finite()).collect();
    let actual: Vec<f64> = actual.iter().copied().filter(|v| v.is_finite()).collect();
    if expected.is_empty() || actual.is_empty() || buckets == 0 {
        return 0.0;
    }

    let mut sorted = expected.clone();
    sorted.sort_by(f64::total_cmp);

    let mut cuts: Vec<f64> = (0..=buckets)
        .map(|i| quantile(&sorted, i as f64 / buckets as f64))
        .collect();
    cuts.dedup();
    if cuts.len() <= 2 {
        return 0.0;
    }

    let histogram = ScoreHistogram::new(cuts);
    let expected_counts = histogram.counts(&expected);
    let actual_counts = histogram.counts(&actual);

    compute_psi(&to_f64(&expected_counts), &to_f64(&actual_counts)).unwrap_or(0.0)
}

fn normalize(freqs: &[f64], label: &str) -> Result<Vec<f64>, ServiceError> {
    if freqs.iter().any(|f| !f.is_finite() || *f < 0.0) {
        return Err(ServiceError::invalid(format!(
            "{label} frequencies must be finite and non-negative"
        )));
    }
    let total: f64 = freqs.iter().sum();
    if total <= 0.0 {
        return Err(ServiceError::invalid(format!(
            "{label} frequencies must not all be zero"
        )));
    }
    Ok(freqs.iter().map(|f| f / total).collect())
}

/// Linear-interpolated quantile of an ascending sample
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

pub(crate) fn to_f64(counts: &[u64]) -> Vec<f64> {
    counts.iter().map(|&c| c as f64).collect()
}

/// Bucket edges shared by the reference and current distributions.
///
/// Buckets are half-open `[edge_i, edge_i+1)` except the last, which also
/// includes its upper edge. Values outside the range land in the first or
/// last bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistogram {
    edges: Vec<f64>,
}

impl ScoreHistogram {
    pub fn new(edges: Vec<f64>) -> Self {
        Self { edges }
    }

    /// Equal-width buckets over [0, 1]
    pub fn unit_interval(buckets: usize) -> Self {
        let buckets = buckets.max(1);
        Self::new((0..=buckets).map(|i| i as f64 / buckets as f64).collect())
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn bucket_count(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    pub fn bucket_index(&self, value: f64) -> usize {
        let last = self.bucket_count().saturating_sub(1);
        // First interior edge strictly above the value
        self.edges[1..self.edges.len() - 1]
            .iter()
            .position(|&edge| value < edge)
            .unwrap_or(last)
    }

    pub fn counts(&self, values: &[f64]) -> Vec<u64> {
        let mut counts = vec![0; self.bucket_count()];
        for &v in values {
            counts[self.bucket_index(v)] += 1;
        }
        counts
    }
}

/// Training-time distribution of approval scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDistribution {
    pub edges: Vec<f64>,
    pub frequencies: Vec<f64>,
}

impl ReferenceDistribution {
    /// Uniform reference over equal-width score buckets
    pub fn uniform(buckets: usize) -> Self {
        let histogram = ScoreHistogram::unit_interval(buckets);
        let n = histogram.bucket_count();
        Self {
            edges: histogram.edges().to_vec(),
            frequencies: vec![1.0 / n as f64; n],
        }
    }

    /// Reference built from training scores over equal-width buckets.
    ///
    /// Fails when no finite score is given.
    pub fn from_scores(scores: &[f64], buckets: usize) -> Result<Self> {
        let finite: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
        if finite.is_empty() {
            anyhow::bail!("reference distribution needs at least one finite score");
        }
        let histogram = ScoreHistogram::unit_interval(buckets);
        let reference = Self {
            edges: histogram.edges().to_vec(),
            frequencies: to_f64(&histogram.counts(&finite)),
        };
        reference.validate()?;
        Ok(reference)
    }

    /// Load a reference distribution from a JSON artifact
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read reference distribution {}", path.display()))?;
        let reference: ReferenceDistribution = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse reference distribution {}", path.display()))?;
        reference.validate()?;
        Ok(reference)
    }

    /// Write the distribution as a JSON artifact
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.validate()?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write reference distribution {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.frequencies.is_empty() {
            anyhow::bail!("reference distribution has no buckets");
        }
        if self.edges.len() != self.frequencies.len() + 1 {
            anyhow::bail!(
                "reference distribution needs {} edges for {} buckets, got {}",
                self.frequencies.len() + 1,
                self.frequencies.len(),
                self.edges.len()
            );
        }
        if self.edges.windows(2).any(|w| !(w[0] < w[1])) {
            anyhow::bail!("reference distribution edges must be strictly increasing");
        }
        if self.frequencies.iter().any(|f| !f.is_finite() || *f < 0.0) {
            anyhow::bail!("reference distribution frequencies must be finite and non-negative");
        }
        if self.frequencies.iter().sum::<f64>() <= 0.0 {
            anyhow::bail!("reference distribution frequencies must not all be zero");
        }
        Ok(())
    }

    pub fn histogram(&self) -> ScoreHistogram {
        ScoreHistogram::new(self.edges.clone())
    }
}
