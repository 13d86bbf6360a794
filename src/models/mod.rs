//! Approval scoring, dealer bandit and offline dataset components

pub mod approval;
pub mod bandit;
pub mod loader;
pub mod synthetic;
pub mod uplift;

pub use approval::{decide, ApprovalClassifier, OnnxApprovalModel, ProbabilityModel};
pub use bandit::{ArmStats, DealerBandit, Recommendation};
pub use synthetic::SyntheticGenerator;
pub use uplift::{UpliftDataset, UpliftDatasetBuilder};
