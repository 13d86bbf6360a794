//! Seeded synthetic data for demos and local runs.
//!
//! Produces used-vehicle finance applications with a latent bad-outcome
//! label, lifecycle treatment logs for uplift work and dealer click history
//! for seeding the bandit.

use crate::models::uplift::LifecycleRecord;
use crate::types::application::LoanApplication;
use crate::types::dealer::ArmHistoryRecord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

pub const DEFAULT_SEED: u64 = 42;

const VEHICLE_TYPES: [&str; 3] = ["car", "truck", "suv"];
const REGIONS: [&str; 3] = ["midwest", "south", "west"];
const TREATMENTS: [&str; 4] = ["control", "sms", "call", "email"];

/// Application paired with its simulated outcome (1 = bad)
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledApplication {
    pub application: LoanApplication,
    pub bad: u8,
}

/// Deterministic generator for demo datasets
pub struct SyntheticGenerator {
    rng: StdRng,
    income: Normal<f64>,
    loan: Normal<f64>,
}

impl SyntheticGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            income: Normal::new(45_000.0, 15_000.0).expect("valid income distribution"),
            loan: Normal::new(16_000.0, 5_000.0).expect("valid loan distribution"),
        }
    }

    /// Generate a single application
    pub fn application(&mut self) -> LoanApplication {
        LoanApplication {
            dealer_id: self.rng.gen_range(1..50).to_string(),
            vehicle_type: self.random_choice(&VEHICLE_TYPES).to_string(),
            region: self.random_choice(&REGIONS).to_string(),
            applicant_income: self.income.sample(&mut self.rng),
            loan_amount: self.loan.sample(&mut self.rng).clamp(5_000.0, 40_000.0),
            vehicle_age: self.rng.gen_range(0..15),
        }
    }

    /// Generate applications with a latent bad-outcome label
    pub fn labeled_applications(&mut self, n: usize) -> Vec<LabeledApplication> {
        (0..n)
            .map(|_| {
                let application = self.application();
                let prob_bad = bad_outcome_probability(&application);
                let bad = u8::from(self.rng.gen::<f64>() < prob_bad);
                LabeledApplication { application, bad }
            })
            .collect()
    }

    /// Lifecycle treatment log with a binary paid-on-time outcome.
    ///
    /// Treatments lift repayment on top of a base rate that falls with risk.
    pub fn lifecycle_records(&mut self, n: usize) -> Vec<LifecycleRecord> {
        (0..n)
            .map(|i| {
                let app = self.application();
                let treatment = self.random_choice(&TREATMENTS).to_string();
                let lift = match treatment.as_str() {
                    "call" => 0.12,
                    "sms" => 0.06,
                    "email" => 0.02,
                    _ => 0.0,
                };
                let p_paid = ((1.0 - bad_outcome_probability(&app)) + lift).clamp(0.0, 1.0);
                let outcome = if self.rng.gen::<f64>() < p_paid { 1.0 } else { 0.0 };

                LifecycleRecord {
                    account_id: format!("acct_{:06}", i + 1),
                    treatment,
                    outcome,
                    dealer_id: app.dealer_id,
                    vehicle_type: app.vehicle_type,
                    region: app.region,
                    applicant_income: app.applicant_income,
                    loan_amount: app.loan_amount,
                    vehicle_age: app.vehicle_age,
                }
            })
            .collect()
    }

    /// Click/impression history for every (dealer, arm) pair
    pub fn bandit_history(&mut self, dealers: usize, arms: &[String]) -> Vec<ArmHistoryRecord> {
        let mut records = Vec::with_capacity(dealers * arms.len());
        for d in 1..=dealers {
            for arm in arms {
                let impressions = self.rng.gen_range(20..400);
                let ctr: f64 = self.rng.gen_range(0.05..0.45);
                let clicks = (impressions as f64 * ctr).round() as u64;
                records.push(ArmHistoryRecord {
                    dealer_id: format!("D{d:03}"),
                    arm_id: arm.clone(),
                    clicks,
                    impressions,
                });
            }
        }
        records
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

/// Latent probability of a bad outcome used to label synthetic data
pub fn bad_outcome_probability(app: &LoanApplication) -> f64 {
    let risk_score =
        0.00005 * app.loan_amount - 0.00003 * app.applicant_income + 0.05 * app.vehicle_age as f64;
    1.0 / (1.0 + (-risk_score).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_is_seeded() {
        let a = SyntheticGenerator::new(7).labeled_applications(20);
        let b = SyntheticGenerator::new(7).labeled_applications(20);
        assert_eq!(a, b);
    }

    #[test]
    fn test_application_ranges() {
        let mut generator = SyntheticGenerator::default();
        for labeled in generator.labeled_applications(500) {
            let app = labeled.application;
            let dealer: u32 = app.dealer_id.parse().unwrap();
            assert!((1..50).contains(&dealer));
            assert!(VEHICLE_TYPES.contains(&app.vehicle_type.as_str()));
            assert!(REGIONS.contains(&app.region.as_str()));
            assert!((5_000.0..=40_000.0).contains(&app.loan_amount));
            assert!((0..15).contains(&app.vehicle_age));
            assert!(labeled.bad <= 1);
        }
    }

    #[test]
    fn test_bad_outcome_probability_direction() {
        let safe = LoanApplication::new("1", 90_000.0, 6_000.0, 1);
        let risky = LoanApplication::new("1", 20_000.0, 35_000.0, 14);
        assert!(bad_outcome_probability(&safe) < bad_outcome_probability(&risky));
    }

    #[test]
    fn test_lifecycle_records_are_valid_input() {
        let records = SyntheticGenerator::default().lifecycle_records(50);
        assert_eq!(records.len(), 50);
        assert_eq!(records[0].account_id, "acct_000001");
        assert!(records.iter().all(|r| r.outcome == 0.0 || r.outcome == 1.0));
        assert!(records.iter().all(|r| TREATMENTS.contains(&r.treatment.as_str())));
    }

    #[test]
    fn test_bandit_history_clicks_bounded() {
        let arms = vec!["layout_a".to_string(), "layout_b".to_string()];
        let history = SyntheticGenerator::default().bandit_history(5, &arms);
        assert_eq!(history.len(), 10);
        assert!(history.iter().all(|r| r.clicks <= r.impressions));
    }
}
