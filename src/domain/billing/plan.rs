//! Plan cadence and billing-period arithmetic.
//!
//! `compute_period` is the Period Calculator: a pure function of the payment
//! instant and the plan cadence. Month and year steps are calendar-aware and
//! clamp to the last day of a shorter target month.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{Timestamp, ValidationError};

/// Largest accepted interval count. Anything beyond is a payload error.
pub const MAX_INTERVAL_COUNT: i64 = 1200;

/// Unit of a plan's billing interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanInterval {
    Day,
    Week,
    Month,
    Year,
}

impl PlanInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanInterval::Day => "day",
            PlanInterval::Week => "week",
            PlanInterval::Month => "month",
            PlanInterval::Year => "year",
        }
    }

    /// Lenient parse of the interval vocabularies providers use.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "day" | "days" | "daily" | "dia" | "dias" | "diario" => Some(PlanInterval::Day),
            "week" | "weeks" | "weekly" | "semana" | "semanal" => Some(PlanInterval::Week),
            "month" | "months" | "monthly" | "mes" | "meses" | "mensal" => {
                Some(PlanInterval::Month)
            }
            "year" | "years" | "yearly" | "annual" | "ano" | "anos" | "anual" => {
                Some(PlanInterval::Year)
            }
            _ => None,
        }
    }
}

impl fmt::Display for PlanInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interval unit plus multiplier, e.g. `{month, 3}` for a quarterly plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCadence {
    pub interval: PlanInterval,
    pub count: u32,
}

impl PlanCadence {
    /// Creates a cadence, normalizing a count below 1 to 1.
    pub fn new(interval: PlanInterval, count: i64) -> Result<Self, ValidationError> {
        if count > MAX_INTERVAL_COUNT {
            return Err(ValidationError::out_of_range(
                "interval_count",
                1,
                MAX_INTERVAL_COUNT,
                count,
            ));
        }
        let count = u32::try_from(count.max(1)).unwrap_or(1);
        Ok(Self { interval, count })
    }

    pub fn monthly() -> Self {
        Self {
            interval: PlanInterval::Month,
            count: 1,
        }
    }

    /// Infers a cadence from a "bills every N months" multiplier.
    ///
    /// 12 maps to one year; 6 (semester) and 3 (quarter) stay month-based.
    pub fn from_recurrence_months(months: i64) -> Result<Self, ValidationError> {
        match months {
            12 => Self::new(PlanInterval::Year, 1),
            n => Self::new(PlanInterval::Month, n),
        }
    }
}

impl Default for PlanCadence {
    fn default() -> Self {
        Self::monthly()
    }
}

/// Half-open billing window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub start: Timestamp,
    pub end: Timestamp,
}

/// Computes the billing window starting at `paid_at`.
///
/// `end = paid_at + count * interval`. A count below 1 is treated as 1.
pub fn compute_period(
    paid_at: Timestamp,
    interval: PlanInterval,
    count: i64,
) -> Result<BillingPeriod, ValidationError> {
    let cadence = PlanCadence::new(interval, count)?;
    period_for(paid_at, cadence)
}

/// Same as [`compute_period`] for an already validated cadence.
pub fn period_for(paid_at: Timestamp, cadence: PlanCadence) -> Result<BillingPeriod, ValidationError> {
    let count = cadence.count;
    let end = match cadence.interval {
        PlanInterval::Day => paid_at.add_days(i64::from(count)),
        PlanInterval::Week => paid_at.add_days(i64::from(count) * 7),
        PlanInterval::Month => paid_at.add_months(count),
        PlanInterval::Year => paid_at.add_years(count),
    }
    .ok_or_else(|| {
        ValidationError::invalid_format("period_end", "billing period end is out of range")
    })?;

    Ok(BillingPeriod {
        start: paid_at,
        end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use proptest::prelude::*;

    fn ts(raw: &str) -> Timestamp {
        Timestamp::parse_rfc3339(raw).unwrap()
    }

    // ══════════════════════════════════════════════════════════════
    // compute_period
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn month_end_clamps_in_leap_year() {
        let period = compute_period(ts("2024-01-31T00:00:00Z"), PlanInterval::Month, 1).unwrap();
        assert_eq!(period.start, ts("2024-01-31T00:00:00Z"));
        assert_eq!(period.end, ts("2024-02-29T00:00:00Z"));
    }

    #[test]
    fn month_end_clamps_in_common_year() {
        let period = compute_period(ts("2023-01-31T00:00:00Z"), PlanInterval::Month, 1).unwrap();
        assert_eq!(period.end, ts("2023-02-28T00:00:00Z"));
    }

    #[test]
    fn yearly_plan_lands_on_same_date() {
        let period = compute_period(ts("2024-01-15T00:00:00Z"), PlanInterval::Year, 1).unwrap();
        assert_eq!(period.start, ts("2024-01-15T00:00:00Z"));
        assert_eq!(period.end, ts("2025-01-15T00:00:00Z"));
    }

    #[test]
    fn weekly_plan_adds_seven_days_per_count() {
        let period = compute_period(ts("2024-03-01T08:00:00Z"), PlanInterval::Week, 2).unwrap();
        assert_eq!(period.end, ts("2024-03-15T08:00:00Z"));
    }

    #[test]
    fn daily_plan_crosses_month_boundary() {
        let period = compute_period(ts("2024-02-28T00:00:00Z"), PlanInterval::Day, 2).unwrap();
        assert_eq!(period.end, ts("2024-03-01T00:00:00Z"));
    }

    #[test]
    fn semester_plan_uses_six_months() {
        let period = compute_period(ts("2024-08-31T00:00:00Z"), PlanInterval::Month, 6).unwrap();
        assert_eq!(period.end, ts("2025-02-28T00:00:00Z"));
    }

    #[test]
    fn non_positive_count_is_treated_as_one() {
        let zero = compute_period(ts("2024-01-10T00:00:00Z"), PlanInterval::Month, 0).unwrap();
        let negative = compute_period(ts("2024-01-10T00:00:00Z"), PlanInterval::Month, -4).unwrap();
        assert_eq!(zero.end, ts("2024-02-10T00:00:00Z"));
        assert_eq!(negative.end, zero.end);
    }

    #[test]
    fn absurd_count_is_rejected() {
        let result = compute_period(ts("2024-01-10T00:00:00Z"), PlanInterval::Year, 5000);
        assert!(matches!(result, Err(ValidationError::OutOfRange { .. })));
    }

    // ══════════════════════════════════════════════════════════════
    // Cadence inference
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn recurrence_of_twelve_months_is_yearly() {
        let cadence = PlanCadence::from_recurrence_months(12).unwrap();
        assert_eq!(cadence.interval, PlanInterval::Year);
        assert_eq!(cadence.count, 1);
    }

    #[test]
    fn recurrence_of_six_and_three_months_stay_monthly() {
        let semester = PlanCadence::from_recurrence_months(6).unwrap();
        let quarter = PlanCadence::from_recurrence_months(3).unwrap();
        assert_eq!((semester.interval, semester.count), (PlanInterval::Month, 6));
        assert_eq!((quarter.interval, quarter.count), (PlanInterval::Month, 3));
    }

    #[test]
    fn other_recurrences_map_to_n_months() {
        let cadence = PlanCadence::from_recurrence_months(2).unwrap();
        assert_eq!((cadence.interval, cadence.count), (PlanInterval::Month, 2));
    }

    #[test]
    fn interval_parse_accepts_provider_vocabularies() {
        assert_eq!(PlanInterval::parse("Monthly"), Some(PlanInterval::Month));
        assert_eq!(PlanInterval::parse("anual"), Some(PlanInterval::Year));
        assert_eq!(PlanInterval::parse("semana"), Some(PlanInterval::Week));
        assert_eq!(PlanInterval::parse("day"), Some(PlanInterval::Day));
        assert_eq!(PlanInterval::parse("fortnight"), None);
    }

    // ══════════════════════════════════════════════════════════════
    // Properties
    // ══════════════════════════════════════════════════════════════

    fn any_interval() -> impl Strategy<Value = PlanInterval> {
        prop_oneof![
            Just(PlanInterval::Day),
            Just(PlanInterval::Week),
            Just(PlanInterval::Month),
            Just(PlanInterval::Year),
        ]
    }

    proptest! {
        #[test]
        fn end_is_always_after_start(
            secs in 946_684_800i64..4_102_444_800i64,
            interval in any_interval(),
            count in 1i64..60,
        ) {
            let paid_at = Timestamp::from_unix_secs(secs).unwrap();
            let period = compute_period(paid_at, interval, count).unwrap();
            prop_assert_eq!(period.start, paid_at);
            prop_assert!(period.start.is_before(&period.end));
        }

        #[test]
        fn month_steps_keep_or_clamp_day_of_month(
            secs in 946_684_800i64..4_102_444_800i64,
            count in 1i64..36,
        ) {
            let paid_at = Timestamp::from_unix_secs(secs).unwrap();
            let period = compute_period(paid_at, PlanInterval::Month, count).unwrap();
            let start_day = paid_at.as_datetime().day();
            let end_day = period.end.as_datetime().day();
            prop_assert!(end_day <= start_day);
            if start_day <= 28 {
                prop_assert_eq!(end_day, start_day);
            }
        }

        #[test]
        fn periods_are_deterministic(
            secs in 946_684_800i64..4_102_444_800i64,
            interval in any_interval(),
            count in 1i64..24,
        ) {
            let paid_at = Timestamp::from_unix_secs(secs).unwrap();
            prop_assert_eq!(
                compute_period(paid_at, interval, count).unwrap(),
                compute_period(paid_at, interval, count).unwrap()
            );
        }
    }
}
