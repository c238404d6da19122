//! Budget threshold evaluation

use serde::Serialize;

use crate::models::{format_rupiah, Budget, Month};

/// Share of the limit at which a budget starts warning
pub const WARNING_THRESHOLD_PERCENT: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetLevel {
    Safe,
    Warning,
    Exceeded,
}

impl BudgetLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Warning => "warning",
            Self::Exceeded => "exceeded",
        }
    }
}

impl std::fmt::Display for BudgetLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spending against a monthly limit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetStatus {
    pub spent: i64,
    pub limit: i64,
    pub remaining: i64,
    pub percentage: f64,
    pub level: BudgetLevel,
}

/// A budget with its spending for one month
#[derive(Debug, Clone, Serialize)]
pub struct BudgetReport {
    pub budget: Budget,
    pub month: Month,
    pub status: BudgetStatus,
}

/// Evaluate spending against a limit
///
/// Reaching exactly 100% is a warning; only going over is exceeded.
pub fn check_budget_status(spent: i64, limit: i64) -> BudgetStatus {
    let remaining = limit.saturating_sub(spent);

    if limit <= 0 {
        let level = if spent > 0 {
            BudgetLevel::Exceeded
        } else {
            BudgetLevel::Safe
        };
        let percentage = if spent > 0 { 100.0 } else { 0.0 };
        return BudgetStatus {
            spent,
            limit,
            remaining,
            percentage,
            level,
        };
    }

    let percentage = spent as f64 * 100.0 / limit as f64;
    let level = if spent > limit {
        BudgetLevel::Exceeded
    } else if percentage >= WARNING_THRESHOLD_PERCENT {
        BudgetLevel::Warning
    } else {
        BudgetLevel::Safe
    };

    BudgetStatus {
        spent,
        limit,
        remaining,
        percentage,
        level,
    }
}

/// WhatsApp alert for a category budget, None while spending is safe
pub fn budget_alert_message(category: &str, status: &BudgetStatus) -> Option<String> {
    match status.level {
        BudgetLevel::Safe => None,
        BudgetLevel::Warning => Some(format!(
            "⚠️ Budget {} sudah terpakai {:.1}% ({} dari {}). Sisa {}.",
            category,
            status.percentage,
            format_rupiah(status.spent),
            format_rupiah(status.limit),
            format_rupiah(status.remaining.max(0)),
        )),
        BudgetLevel::Exceeded => Some(format!(
            "🚨 Budget {} terlampaui! Terpakai {} dari {} (lebih {}).",
            category,
            format_rupiah(status.spent),
            format_rupiah(status.limit),
            format_rupiah(-status.remaining),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_below_threshold() {
        let status = check_budget_status(500_000, 1_000_000);
        assert_eq!(status.level, BudgetLevel::Safe);
        assert_eq!(status.remaining, 500_000);
        assert!((status.percentage - 50.0).abs() < f64::EPSILON);
        assert!(budget_alert_message("Makan", &status).is_none());
    }

    #[test]
    fn test_warning_from_eighty_percent() {
        assert_eq!(check_budget_status(799_999, 1_000_000).level, BudgetLevel::Safe);
        assert_eq!(check_budget_status(800_000, 1_000_000).level, BudgetLevel::Warning);
        assert_eq!(check_budget_status(950_000, 1_000_000).level, BudgetLevel::Warning);
    }

    #[test]
    fn test_exactly_full_is_warning() {
        let status = check_budget_status(1_000_000, 1_000_000);
        assert_eq!(status.level, BudgetLevel::Warning);
        assert_eq!(status.remaining, 0);
    }

    #[test]
    fn test_over_limit_is_exceeded() {
        let status = check_budget_status(1_200_000, 1_000_000);
        assert_eq!(status.level, BudgetLevel::Exceeded);
        assert_eq!(status.remaining, -200_000);
        assert!((status.percentage - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_limit() {
        assert_eq!(check_budget_status(0, 0).level, BudgetLevel::Safe);
        assert_eq!(check_budget_status(1, 0).level, BudgetLevel::Exceeded);
    }

    #[test]
    fn test_alert_messages() {
        let warn = budget_alert_message("Makanan", &check_budget_status(850_000, 1_000_000)).unwrap();
        assert!(warn.contains("85.0%"));
        assert!(warn.contains("Rp150.000"));

        let over = budget_alert_message("Makanan", &check_budget_status(1_250_000, 1_000_000)).unwrap();
        assert!(over.contains("terlampaui"));
        assert!(over.contains("Rp250.000"));
    }
}
