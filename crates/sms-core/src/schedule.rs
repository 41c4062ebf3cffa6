//! Review and measurement scheduling arithmetic.
//!
//! Two recurring computations drive the whole SMS process calendar:
//!   - `Frequency`: how often an entity (policy, procedure, process, KPI) is
//!     reviewed or measured, and what the next occurrence date is.
//!   - `EscalationUnit`: how long a KPI may sit at one escalation level
//!     before it is pushed up to the next one.
//!
//! An unknown or missing frequency is not an error here: callers treat it as
//! "no further occurrence scheduled" and clear the stored next-date field.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Frequency
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Semiannually,
    Annually,
}

impl Frequency {
    /// Parse a dropdown value as it appears on the Jira ticket.
    /// Returns `None` for unknown values; the caller decides whether that
    /// clears the schedule or falls back to a default.
    pub fn parse(value: &str) -> Option<Frequency> {
        match value.trim().to_lowercase().as_str() {
            "daily" => Some(Frequency::Daily),
            "weekly" => Some(Frequency::Weekly),
            "monthly" => Some(Frequency::Monthly),
            "quarterly" => Some(Frequency::Quarterly),
            "semiannually" => Some(Frequency::Semiannually),
            "annually" => Some(Frequency::Annually),
            _ => None,
        }
    }

    /// Next occurrence after `from`. Month arithmetic clamps to the end of
    /// the target month (Jan 31 + 1 month = Feb 28/29), so the result is
    /// always a valid calendar date.
    pub fn next_date(self, from: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Daily => from.checked_add_days(Days::new(1)),
            Frequency::Weekly => from.checked_add_days(Days::new(7)),
            Frequency::Monthly => from.checked_add_months(Months::new(1)),
            Frequency::Quarterly => from.checked_add_months(Months::new(3)),
            Frequency::Semiannually => from.checked_add_months(Months::new(6)),
            Frequency::Annually => from.checked_add_months(Months::new(12)),
        }
        .unwrap_or(from)
    }

    /// Same arithmetic on a timestamp, for datetime-valued fields such as
    /// "Next measurement".
    pub fn next_datetime(self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Frequency::Daily => from.checked_add_days(Days::new(1)),
            Frequency::Weekly => from.checked_add_days(Days::new(7)),
            Frequency::Monthly => from.checked_add_months(Months::new(1)),
            Frequency::Quarterly => from.checked_add_months(Months::new(3)),
            Frequency::Semiannually => from.checked_add_months(Months::new(6)),
            Frequency::Annually => from.checked_add_months(Months::new(12)),
        }
        .unwrap_or(from)
    }

    /// Canonical label of the review period containing `date`, used in
    /// review ticket summaries ("Review of policy X on 2024.Q3").
    ///
    /// Weekly: `YYYY.Www` (ISO week), Monthly: `YYYY.MM`,
    /// Quarterly: `YYYY.Qn`, Semiannually: `YYYY-n`, Annually: `YYYY`.
    /// Daily falls back to the monthly label; a daily review cadence does
    /// not exist in the domain, only daily measurements.
    pub fn period_label(self, date: NaiveDate) -> String {
        match self {
            Frequency::Weekly => {
                let week = date.iso_week();
                format!("{}.W{:02}", week.year(), week.week())
            }
            Frequency::Quarterly => {
                let quarter = (date.month() - 1) / 3 + 1;
                format!("{}.Q{}", date.year(), quarter)
            }
            Frequency::Semiannually => {
                let half = if date.month() < 7 { 1 } else { 2 };
                format!("{}-{}", date.year(), half)
            }
            Frequency::Annually => format!("{}", date.year()),
            Frequency::Daily | Frequency::Monthly => {
                format!("{}.{:02}", date.year(), date.month())
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Semiannually => "semiannually",
            Frequency::Annually => "annually",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EscalationUnit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationUnit {
    Hours,
    Days,
    Weeks,
    Months,
}

impl EscalationUnit {
    pub fn parse(value: &str) -> Option<EscalationUnit> {
        match value.trim().to_lowercase().as_str() {
            "hours" => Some(EscalationUnit::Hours),
            "days" => Some(EscalationUnit::Days),
            "weeks" => Some(EscalationUnit::Weeks),
            "months" => Some(EscalationUnit::Months),
            _ => None,
        }
    }

    /// `start + amount` of this unit.
    pub fn after(self, start: DateTime<Utc>, amount: i64) -> DateTime<Utc> {
        match self {
            EscalationUnit::Hours => start + chrono::Duration::hours(amount),
            EscalationUnit::Days => start + chrono::Duration::days(amount),
            EscalationUnit::Weeks => start + chrono::Duration::days(amount * 7),
            EscalationUnit::Months => start
                .checked_add_months(Months::new(amount.max(0) as u32))
                .unwrap_or(start),
        }
    }
}

/// Whether a KPI that escalated at `escalated_on` is due for the next
/// escalation level. The boundary is inclusive: exactly `amount` units
/// elapsed means escalate now.
pub fn escalation_due(
    escalated_on: DateTime<Utc>,
    amount: i64,
    unit: EscalationUnit,
    now: DateTime<Utc>,
) -> bool {
    unit.after(escalated_on, amount) <= now
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
