//! Dealer next-action recommender using Thompson Sampling.
//!
//! Each (dealer, action) arm keeps success/failure accumulators that
//! parameterize a Beta(successes + 1, failures + 1) belief about its
//! conversion rate. Selection draws once from every candidate's posterior and
//! picks the highest draw, so untested arms still win occasionally while
//! proven arms dominate as their posteriors concentrate.

use crate::config::{BanditConfig, RewardPolicy};
use crate::error::ServiceError;
use crate::types::dealer::ArmHistoryRecord;
use anyhow::{Context, Result};
use parking_lot::RwLock;
use rand::Rng;
use rand_distr::{Beta, Distribution};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

/// Success/failure accumulators for one arm
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ArmStats {
    pub successes: f64,
    pub failures: f64,
}

impl ArmStats {
    pub fn new(successes: f64, failures: f64) -> Self {
        Self {
            successes: successes.max(0.0),
            failures: failures.max(0.0),
        }
    }

    /// Beta alpha parameter (uniform prior + successes)
    pub fn alpha(&self) -> f64 {
        1.0 + self.successes
    }

    /// Beta beta parameter (uniform prior + failures)
    pub fn beta(&self) -> f64 {
        1.0 + self.failures
    }

    /// Total feedback applied to this arm
    pub fn pulls(&self) -> f64 {
        self.successes + self.failures
    }

    pub fn posterior_mean(&self) -> f64 {
        self.alpha() / (self.alpha() + self.beta())
    }

    /// Draw a conversion-rate sample from the posterior
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match Beta::new(self.alpha(), self.beta()) {
            Ok(dist) => dist.sample(rng),
            Err(_) => self.posterior_mean(),
        }
    }

    fn apply(&mut self, reward: f64) {
        self.successes += reward;
        self.failures += 1.0 - reward;
    }
}

/// Selected action together with the candidates it was drawn from
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub action_id: String,
    pub candidates: Vec<String>,
}

/// Arm statistics as reported for one dealer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmSummary {
    pub action_id: String,
    pub successes: f64,
    pub failures: f64,
    pub posterior_mean: f64,
}

/// Thompson-Sampling bandit over per-dealer arms
pub struct DealerBandit {
    /// Candidates used when a request names none
    default_arms: Vec<String>,
    reward_policy: RewardPolicy,
    /// dealer_id -> action_id -> stats
    state: RwLock<HashMap<String, HashMap<String, ArmStats>>>,
}

impl DealerBandit {
    pub fn new(default_arms: Vec<String>, reward_policy: RewardPolicy) -> Self {
        Self {
            default_arms,
            reward_policy,
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Build the bandit from configuration, seeding from history when the file exists
    pub fn from_config(config: &BanditConfig) -> Result<Self> {
        match config.history_path.as_deref() {
            Some(path) if Path::new(path).exists() => {
                let mut bandit = Self::from_csv(path, Some(config.default_arms.clone()))?;
                bandit.reward_policy = config.reward_policy;
                Ok(bandit)
            }
            Some(path) => {
                warn!(path = %path, "Bandit history not found, starting with uniform priors");
                Ok(Self::new(config.default_arms.clone(), config.reward_policy))
            }
            None => Ok(Self::new(config.default_arms.clone(), config.reward_policy)),
        }
    }

    /// Seed posteriors from historical clicks/impressions.
    ///
    /// Rows for the same (dealer, arm) are summed. When `arms` is `None` the
    /// sorted unique arm ids of the history become the default candidates.
    pub fn from_history<I>(records: I, arms: Option<Vec<String>>) -> Self
    where
        I: IntoIterator<Item = ArmHistoryRecord>,
    {
        let mut totals: HashMap<(String, String), (u64, u64)> = HashMap::new();
        let mut seen_arms = BTreeSet::new();

        for record in records {
            seen_arms.insert(record.arm_id.clone());
            let entry = totals.entry((record.dealer_id, record.arm_id)).or_default();
            entry.0 = entry.0.saturating_add(record.clicks);
            entry.1 = entry.1.saturating_add(record.impressions);
        }

        let default_arms = match arms {
            Some(arms) if !arms.is_empty() => arms,
            _ => seen_arms.into_iter().collect(),
        };

        let mut state: HashMap<String, HashMap<String, ArmStats>> = HashMap::new();
        for ((dealer_id, arm_id), (clicks, impressions)) in totals {
            let failures = impressions.saturating_sub(clicks);
            state
                .entry(dealer_id)
                .or_default()
                .insert(arm_id, ArmStats::new(clicks as f64, failures as f64));
        }

        info!(
            dealers = state.len(),
            arms = ?default_arms,
            "Bandit seeded from history"
        );

        Self {
            default_arms,
            reward_policy: RewardPolicy::default(),
            state: RwLock::new(state),
        }
    }

    /// Seed posteriors from a `dealer_id,arm_id,clicks,impressions` CSV
    pub fn from_csv<P: AsRef<Path>>(path: P, arms: Option<Vec<String>>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open bandit history {}", path.display()))?;
        let records = reader
            .deserialize::<ArmHistoryRecord>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to parse bandit history {}", path.display()))?;
        Ok(Self::from_history(records, arms))
    }

    pub fn default_arms(&self) -> &[String] {
        &self.default_arms
    }

    pub fn reward_policy(&self) -> RewardPolicy {
        self.reward_policy
    }

    /// Default arms followed by the dealer's other known arms in sorted order
    pub fn candidates(&self, dealer_id: &str) -> Vec<String> {
        let mut candidates = self.default_arms.clone();
        let state = self.state.read();
        if let Some(arms) = state.get(dealer_id) {
            let mut learned: Vec<&String> = arms
                .keys()
                .filter(|arm| !self.default_arms.contains(arm))
                .collect();
            learned.sort();
            candidates.extend(learned.into_iter().cloned());
        }
        candidates
    }

    /// Pick an action for a dealer.
    ///
    /// Without an explicit list every arm known for the dealer competes,
    /// see [`candidates`](Self::candidates).
    pub fn recommend(
        &self,
        dealer_id: &str,
        available_actions: Option<&[String]>,
    ) -> Result<Recommendation, ServiceError> {
        let candidates = match available_actions {
            Some(actions) => actions.to_vec(),
            None => self.candidates(dealer_id),
        };
        let action_id = self.select_action(dealer_id, &candidates)?;
        Ok(Recommendation {
            action_id,
            candidates,
        })
    }

    /// Thompson-sample every candidate and return the highest draw
    pub fn select_action(
        &self,
        dealer_id: &str,
        available_actions: &[String],
    ) -> Result<String, ServiceError> {
        self.select_action_with_rng(dealer_id, available_actions, &mut rand::thread_rng())
    }

    /// Same as [`select_action`](Self::select_action) with a caller-supplied RNG.
    ///
    /// Ties go to the earliest candidate. Selection never creates arms.
    pub fn select_action_with_rng<R: Rng + ?Sized>(
        &self,
        dealer_id: &str,
        available_actions: &[String],
        rng: &mut R,
    ) -> Result<String, ServiceError> {
        if dealer_id.trim().is_empty() {
            return Err(ServiceError::invalid("dealer_id must not be empty"));
        }
        if available_actions.is_empty() {
            return Err(ServiceError::invalid("available_actions must not be empty"));
        }
        if available_actions.iter().any(|a| a.trim().is_empty()) {
            return Err(ServiceError::invalid("action ids must not be empty"));
        }
        if available_actions.len() == 1 {
            return Ok(available_actions[0].clone());
        }

        // Copy the posteriors out so sampling happens without the lock held.
        let posteriors: Vec<ArmStats> = {
            let state = self.state.read();
            let arms = state.get(dealer_id);
            available_actions
                .iter()
                .map(|action| {
                    arms.and_then(|a| a.get(action))
                        .copied()
                        .unwrap_or_default()
                })
                .collect()
        };

        let mut best_index = 0;
        let mut best_sample = f64::NEG_INFINITY;
        for (i, stats) in posteriors.iter().enumerate() {
            let sample = stats.sample(rng);
            if sample > best_sample {
                best_sample = sample;
                best_index = i;
            }
        }

        let chosen = available_actions[best_index].clone();
        debug!(
            dealer_id = %dealer_id,
            action = %chosen,
            sample = best_sample,
            candidates = available_actions.len(),
            "Thompson sampling selection"
        );
        Ok(chosen)
    }

    /// Apply an observed reward to an arm, creating it with a uniform prior if unseen
    pub fn update(
        &self,
        dealer_id: &str,
        action_id: &str,
        reward: f64,
    ) -> Result<ArmStats, ServiceError> {
        if dealer_id.trim().is_empty() {
            return Err(ServiceError::invalid("dealer_id must not be empty"));
        }
        if action_id.trim().is_empty() {
            return Err(ServiceError::invalid("action_id must not be empty"));
        }
        let reward = validate_reward(reward, self.reward_policy)?;

        let updated = {
            let mut state = self.state.write();
            let stats = state
                .entry(dealer_id.to_string())
                .or_default()
                .entry(action_id.to_string())
                .or_default();
            stats.apply(reward);
            *stats
        };

        debug!(
            dealer_id = %dealer_id,
            action_id = %action_id,
            reward = reward,
            successes = updated.successes,
            failures = updated.failures,
            "Bandit arm updated"
        );
        Ok(updated)
    }

    /// Current stats for one arm, if it has been seen
    pub fn arm(&self, dealer_id: &str, action_id: &str) -> Option<ArmStats> {
        self.state
            .read()
            .get(dealer_id)
            .and_then(|arms| arms.get(action_id))
            .copied()
    }

    /// All known arms of a dealer, sorted by action id
    pub fn arm_stats(&self, dealer_id: &str) -> Vec<ArmSummary> {
        let state = self.state.read();
        let mut arms: Vec<ArmSummary> = state
            .get(dealer_id)
            .map(|arms| {
                arms.iter()
                    .map(|(action_id, stats)| ArmSummary {
                        action_id: action_id.clone(),
                        successes: stats.successes,
                        failures: stats.failures,
                        posterior_mean: stats.posterior_mean(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        arms.sort_by(|a, b| a.action_id.cmp(&b.action_id));
        arms
    }

    pub fn dealer_count(&self) -> usize {
        self.state.read().len()
    }
}

/// Check a reward against the policy. Out-of-range values are rejected, never clipped.
pub fn validate_reward(reward: f64, policy: RewardPolicy) -> Result<f64, ServiceError> {
    if !reward.is_finite() {
        return Err(ServiceError::invalid("reward must be a finite number"));
    }
    match policy {
        RewardPolicy::Binary if reward == 0.0 || reward == 1.0 => Ok(reward),
        RewardPolicy::Binary => Err(ServiceError::invalid(format!(
            "reward must be 0 or 1, got {reward}"
        ))),
        RewardPolicy::Fractional if (0.0..=1.0).contains(&reward) => Ok(reward),
        RewardPolicy::Fractional => Err(ServiceError::invalid(format!(
            "reward must be within [0, 1], got {reward}"
        ))),
    }
}
