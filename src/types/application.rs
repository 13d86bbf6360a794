//! Loan application data structures for approval scoring

use crate::error::ServiceError;
use serde::{Deserialize, Serialize};

/// A used-vehicle finance application submitted through a dealer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanApplication {
    /// Originating dealer
    pub dealer_id: String,

    /// Vehicle body type (car, truck, suv)
    pub vehicle_type: String,

    /// Sales region (midwest, south, west)
    pub region: String,

    /// Applicant yearly income
    pub applicant_income: f64,

    /// Requested loan amount
    pub loan_amount: f64,

    /// Vehicle age in years
    pub vehicle_age: i32,
}

impl LoanApplication {
    /// Create a new application with required fields
    pub fn new(dealer_id: &str, applicant_income: f64, loan_amount: f64, vehicle_age: i32) -> Self {
        Self {
            dealer_id: dealer_id.to_string(),
            vehicle_type: "car".to_string(),
            region: "midwest".to_string(),
            applicant_income,
            loan_amount,
            vehicle_age,
        }
    }

    pub fn with_vehicle_type(mut self, vehicle_type: &str) -> Self {
        self.vehicle_type = vehicle_type.to_string();
        self
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    /// Check the fields the feature builder relies on.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.dealer_id.trim().is_empty() {
            return Err(ServiceError::invalid("dealer_id must not be empty"));
        }
        if !self.applicant_income.is_finite() {
            return Err(ServiceError::invalid("applicant_income must be a finite number"));
        }
        if !self.loan_amount.is_finite() || self.loan_amount < 0.0 {
            return Err(ServiceError::invalid(
                "loan_amount must be a finite, non-negative number",
            ));
        }
        if self.vehicle_age < 0 {
            return Err(ServiceError::invalid("vehicle_age must not be negative"));
        }
        Ok(())
    }
}
