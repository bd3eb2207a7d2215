//! When and how earned cashback is paid back: tier split, payout date and
//! payment status.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::cycle::CycleKey;
use crate::models::Limit;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CashbackSplit {
    pub total: f64,
    pub tier1: f64,
    pub tier2: f64,
}

/// Splits earned cashback at the card's monthly limit; without one it is all tier 1.
pub fn cashback_split(total: f64, monthly_limit: Limit) -> CashbackSplit {
    match monthly_limit {
        Limit::Capped(limit) if limit > 0.0 => CashbackSplit {
            total,
            tier1: total.min(limit),
            tier2: (total - limit).max(0.0),
        },
        _ => CashbackSplit {
            total,
            tier1: total,
            tier2: 0.0,
        },
    }
}

/// How many months after the cycle the issuer pays cashback out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PayoutSchedule {
    M0,
    M1,
    M2,
    Points,
}

impl PayoutSchedule {
    fn offset(&self) -> Option<u32> {
        match self {
            PayoutSchedule::M0 => Some(0),
            PayoutSchedule::M1 => Some(1),
            PayoutSchedule::M2 => Some(2),
            PayoutSchedule::Points => None,
        }
    }
}

impl FromStr for PayoutSchedule {
    type Err = String;

    /// Case and whitespace insensitive: `m + 1`, `M+1` and `points ` all parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s.split_whitespace().collect::<String>().to_uppercase();
        if normalized.contains("POINT") {
            return Ok(PayoutSchedule::Points);
        }
        match normalized.as_str() {
            "M0" => Ok(PayoutSchedule::M0),
            "M+1" => Ok(PayoutSchedule::M1),
            "M+2" => Ok(PayoutSchedule::M2),
            _ => Err(format!("unknown payout schedule '{}'", s.trim())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PayoutDate {
    On(NaiveDate),
    /// Paid as points, no fixed date
    Accumulating,
}

impl fmt::Display for PayoutDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayoutDate::On(date) => write!(f, "{date}"),
            PayoutDate::Accumulating => f.write_str("Accumulating"),
        }
    }
}

/// Expected payout date for a cycle. With a due day, payout lands on the due
/// day (one month later if it precedes the statement day); otherwise on the
/// statement day. `None` when the day does not exist in the target month.
pub fn payout_date(
    cycle: CycleKey,
    schedule: PayoutSchedule,
    statement_day: u32,
    payment_due_day: Option<u32>,
) -> Option<PayoutDate> {
    let Some(offset) = schedule.offset() else {
        return Some(PayoutDate::Accumulating);
    };
    let target = cycle.plus_months(offset);
    let date = match payment_due_day.filter(|d| *d > 0) {
        Some(due) if due < statement_day => target.next().day(due),
        Some(due) => target.day(due),
        None => target.day(statement_day),
    };
    date.map(PayoutDate::On)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PayoutStatus {
    Paid,
    Partial,
    Unpaid,
    Overdue,
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PayoutStatus::Paid => "Paid",
            PayoutStatus::Partial => "Partial",
            PayoutStatus::Unpaid => "Unpaid",
            PayoutStatus::Overdue => "Overdue",
        };
        f.write_str(label)
    }
}

/// Nothing due counts as paid; an unpaid amount is overdue strictly after its date.
pub fn payout_status(due: f64, paid: f64, due_date: Option<PayoutDate>, as_of: NaiveDate) -> PayoutStatus {
    if due <= 0.0 || paid >= due {
        return PayoutStatus::Paid;
    }
    if paid > 0.0 {
        return PayoutStatus::Partial;
    }
    match due_date {
        Some(PayoutDate::On(date)) if date < as_of => PayoutStatus::Overdue,
        _ => PayoutStatus::Unpaid,
    }
}
