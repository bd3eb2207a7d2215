//! Billing-cycle arithmetic: which cashback cycle a date belongs to, when that
//! cycle's statement closes, when it is due, and how many days are left.
//!
//! Every function takes the reference date explicitly; nothing here reads the
//! clock.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::Card;

/// Year and month of a cashback-earning period, written `YYYYMM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CycleKey {
    year: i32,
    month: u32,
}

impl CycleKey {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Shifts by `n` calendar months, rolling the year over as needed.
    pub fn plus_months(&self, n: u32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1) + n as i32;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn next(&self) -> Self {
        self.plus_months(1)
    }

    /// `day` of this cycle's month, or `None` if the month has no such day.
    pub fn day(&self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day)
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        self.next().day(1).and_then(|d| d.pred_opt())
    }
}

impl fmt::Display for CycleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for CycleKey {
    type Err = EngineError;

    /// Accepts `YYYYMM` and `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (year, month) = match s.split_once('-') {
            Some((y, m)) => (y, m),
            None if s.len() == 6 && s.is_char_boundary(4) => s.split_at(4),
            None => return Err(EngineError::InvalidData(format!("bad cycle key '{s}'"))),
        };
        let bad = || EngineError::InvalidData(format!("bad cycle key '{s}'"));
        let year: i32 = year.parse().map_err(|_| bad())?;
        let month: u32 = month.parse().map_err(|_| bad())?;
        CycleKey::new(year, month).ok_or_else(bad)
    }
}

impl TryFrom<String> for CycleKey {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CycleKey> for String {
    fn from(key: CycleKey) -> Self {
        key.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleStatus {
    Upcoming,
    Completed,
    #[serde(rename = "N/A")]
    NotAvailable,
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CycleStatus::Upcoming => "Upcoming",
            CycleStatus::Completed => "Completed",
            CycleStatus::NotAvailable => "N/A",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DaysRemaining {
    pub days: Option<i64>,
    pub status: CycleStatus,
}

impl DaysRemaining {
    pub fn not_available() -> Self {
        Self {
            days: None,
            status: CycleStatus::NotAvailable,
        }
    }
}

/// The cycle a spend on `as_of` is billed under.
///
/// Statement-month cards bill by calendar month. Otherwise a spend on or
/// after the statement day lands on the next statement, so the next month.
pub fn cashback_cycle_key(card: &Card, as_of: NaiveDate) -> CycleKey {
    let key = CycleKey::of(as_of);
    if card.use_statement_month_for_payments || as_of.day() < card.statement_day {
        key
    } else {
        key.next()
    }
}

pub fn statement_date(card: &Card, cycle: CycleKey) -> Option<NaiveDate> {
    cycle.day(card.statement_day)
}

/// Due date for a statement closing on `statement`; rolls into the following
/// month when the due day comes before the statement day.
pub fn payment_due_date(card: &Card, statement: NaiveDate) -> Option<NaiveDate> {
    let month = CycleKey::of(statement);
    let due_month = if card.payment_due_day < card.statement_day {
        month.next()
    } else {
        month
    };
    due_month.day(card.payment_due_day)
}

/// Whole days from `as_of` to `target`. A target in the past is `Completed`.
pub fn days_remaining(target: NaiveDate, as_of: NaiveDate) -> DaysRemaining {
    // Both sides are calendar dates, so the day difference is already the ceiling.
    let days = (target - as_of).num_days();
    if days < 0 {
        DaysRemaining {
            days: None,
            status: CycleStatus::Completed,
        }
    } else {
        DaysRemaining {
            days: Some(days),
            status: CycleStatus::Upcoming,
        }
    }
}

/// [`days_remaining`] for a `YYYY-MM-DD` string; unparseable input is `N/A`.
pub fn days_remaining_str(target: &str, as_of: NaiveDate) -> DaysRemaining {
    match parse_date(target) {
        Some(date) => days_remaining(date, as_of),
        None => DaysRemaining::not_available(),
    }
}

/// Days until the cycle closes: month end for statement-month cards,
/// otherwise the statement date.
pub fn days_left_in_cycle(card: &Card, cycle: CycleKey, as_of: NaiveDate) -> DaysRemaining {
    let close = if card.use_statement_month_for_payments {
        cycle.last_day()
    } else {
        statement_date(card, cycle)
    };
    match close {
        Some(date) => days_remaining(date, as_of),
        None => DaysRemaining::not_available(),
    }
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}
