//! Plain-text underwriter summaries for scored applications

use crate::feature_extractor::{income_to_loan_ratio, OLD_VEHICLE_AGE_YEARS};
use crate::types::application::LoanApplication;
use crate::types::decision::{ApprovalPrediction, Decision};

/// Income-to-loan ratio below which affordability is called out
const LOW_AFFORDABILITY_RATIO: f64 = 2.0;

/// Render a short narrative an underwriter can read alongside the score
pub fn underwriter_summary(app: &LoanApplication, prediction: &ApprovalPrediction) -> String {
    let ratio = income_to_loan_ratio(app.applicant_income, app.loan_amount);

    let mut lines = vec![
        "Application Summary".to_string(),
        String::new(),
        format!("Dealer: {}", app.dealer_id),
        format!("Vehicle: {} (age: {})", app.vehicle_type, app.vehicle_age),
        format!("Income: ${}", format_currency(app.applicant_income)),
        format!("Loan Amount: ${}", format_currency(app.loan_amount)),
        String::new(),
        "Model Output:".to_string(),
        format!(
            "- Estimated probability of default: {:.2}",
            prediction.approval_risk
        ),
        format!(
            "- Suggested decision: {} (threshold {:.2})",
            prediction.decision, prediction.threshold
        ),
        String::new(),
        "Rationale:".to_string(),
    ];

    lines.push(if ratio < LOW_AFFORDABILITY_RATIO {
        format!(
            "- Income covers the loan {ratio:.1}x; higher loan amount relative to income increases risk."
        )
    } else {
        format!("- Income covers the loan {ratio:.1}x.")
    });
    lines.push(if app.vehicle_age > OLD_VEHICLE_AGE_YEARS {
        format!(
            "- Vehicle is older than {OLD_VEHICLE_AGE_YEARS} years; older vehicles tend to carry higher default probability."
        )
    } else {
        "- Vehicle age is within the standard range.".to_string()
    });

    lines.push(String::new());
    lines.push("Next Suggested Actions:".to_string());
    match prediction.decision {
        Decision::Approve => lines.push("- Proceed with standard terms.".to_string()),
        Decision::Review => {
            lines.push("- Request additional income verification.".to_string());
            lines.push("- Consider alternative terms to reduce payment burden.".to_string());
        }
    }

    lines.join("\n")
}

/// Whole-unit amount with thousands separators, e.g. 45,000
fn format_currency(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(risk: f64, decision: Decision) -> ApprovalPrediction {
        ApprovalPrediction {
            approval_risk: risk,
            decision,
            threshold: 0.4,
            model_name: "credit_approval_xgb".to_string(),
            model_version: Some("Production".to_string()),
        }
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "0");
        assert_eq!(format_currency(999.4), "999");
        assert_eq!(format_currency(45000.0), "45,000");
        assert_eq!(format_currency(1234567.8), "1,234,568");
        assert_eq!(format_currency(-2500.0), "-2,500");
    }

    #[test]
    fn test_review_summary_mentions_risk_drivers() {
        let app = LoanApplication::new("D017", 20000.0, 18000.0, 11).with_vehicle_type("truck");
        let summary = underwriter_summary(&app, &prediction(0.62, Decision::Review));

        assert!(summary.starts_with("Application Summary"));
        assert!(summary.contains("Dealer: D017"));
        assert!(summary.contains("Vehicle: truck (age: 11)"));
        assert!(summary.contains("Income: $20,000"));
        assert!(summary.contains("Loan Amount: $18,000"));
        assert!(summary.contains("probability of default: 0.62"));
        assert!(summary.contains("Suggested decision: REVIEW"));
        assert!(summary.contains("higher loan amount relative to income"));
        assert!(summary.contains("older than 7 years"));
        assert!(summary.contains("income verification"));
    }

    #[test]
    fn test_approve_summary() {
        let app = LoanApplication::new("D003", 90000.0, 12000.0, 2);
        let summary = underwriter_summary(&app, &prediction(0.08, Decision::Approve));

        assert!(summary.contains("Suggested decision: APPROVE"));
        assert!(summary.contains("standard terms"));
        assert!(!summary.contains("income verification"));
        assert!(!summary.ends_with('\n'));
    }

    #[test]
    fn test_summary_line_layout() {
        let app = LoanApplication::new("D003", 90000.0, 12000.0, 2);
        let summary = underwriter_summary(&app, &prediction(0.08, Decision::Approve));
        let lines: Vec<&str> = summary.lines().collect();

        assert_eq!(lines[0], "Application Summary");
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "Dealer: D003");
        assert_eq!(lines[7], "Model Output:");
        assert_eq!(lines[11], "Rationale:");
        assert_eq!(lines[12], "- Income covers the loan 7.5x.");
        assert_eq!(lines[15], "Next Suggested Actions:");
        assert_eq!(lines.len(), 17);
    }
}
