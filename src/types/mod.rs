//! Type definitions for the credit flywheel service

pub mod application;
pub mod dealer;
pub mod decision;
pub mod event;

pub use application::LoanApplication;
pub use dealer::{ArmHistoryRecord, DealerContext, FeedbackEvent};
pub use decision::{ApprovalPrediction, Decision};
pub use event::PredictionEvent;
