use std::path::Path;

use rusqlite::{Connection, OpenFlags, Row};

use crate::cycle::CycleKey;
use crate::error::{EngineError, Result};
use crate::models::{
    Card, CardStatus, CashbackType, CategorySummary, Limit, MerchantRecord, MethodScope, MonthlySummary,
    PaymentMethod, Rule, RuleStatus, SecondaryCap,
};
use crate::snapshot::Snapshot;

/// Creates tables on the given connection.
pub fn init_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cards (
            id                              TEXT PRIMARY KEY,
            name                            TEXT NOT NULL,
            status                          TEXT NOT NULL DEFAULT 'Active',
            statement_day                   INTEGER NOT NULL,
            payment_due_day                 INTEGER NOT NULL,
            use_statement_month             INTEGER NOT NULL DEFAULT 0,
            overall_monthly_limit           REAL NOT NULL DEFAULT 0.0,
            minimum_monthly_spend           REAL NOT NULL DEFAULT 0.0,
            cashback_type                   TEXT NOT NULL DEFAULT '1 Tier',
            tier2_min_spend                 REAL,
            tier2_limit                     REAL
        );
        CREATE TABLE IF NOT EXISTS rules (
            id                              TEXT PRIMARY KEY,
            card_id                         TEXT NOT NULL,
            name                            TEXT NOT NULL,
            rate                            REAL NOT NULL,
            tier2_rate                      REAL,
            status                          TEXT NOT NULL DEFAULT 'Active',
            cap_per_transaction             REAL NOT NULL DEFAULT 0.0,
            secondary_min_amount            REAL,
            secondary_cap                   REAL,
            category_limit                  REAL NOT NULL DEFAULT 0.0,
            tier2_category_limit            REAL,
            category_codes                  TEXT NOT NULL DEFAULT '[]',
            excluded_codes                  TEXT NOT NULL DEFAULT '[]',
            is_default                      INTEGER NOT NULL DEFAULT 0,
            methods                         TEXT,
            categories                      TEXT NOT NULL DEFAULT '[]'
        );
        CREATE TABLE IF NOT EXISTS monthly_summaries (
            card_id                         TEXT NOT NULL,
            cycle                           TEXT NOT NULL,
            spend                           REAL NOT NULL DEFAULT 0.0,
            cashback                        REAL NOT NULL DEFAULT 0.0,
            monthly_cashback_limit          REAL,
            PRIMARY KEY (card_id, cycle)
        );
        CREATE TABLE IF NOT EXISTS category_summaries (
            card_id                         TEXT NOT NULL,
            rule_name                       TEXT NOT NULL,
            cycle                           TEXT NOT NULL,
            cashback                        REAL NOT NULL DEFAULT 0.0,
            category_limit                  REAL,
            PRIMARY KEY (card_id, rule_name, cycle)
        );
        CREATE TABLE IF NOT EXISTS merchant_history (
            merchant                        TEXT NOT NULL,
            category_code                   TEXT NOT NULL,
            method                          TEXT
        );",
    )?;
    Ok(())
}

/// Opens an existing database read-only.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    Ok(conn)
}

/// Reads every table into one snapshot. Runs inside a single read
/// transaction so caps and summaries agree with each other.
pub fn load_snapshot(conn: &Connection) -> Result<Snapshot> {
    let tx = conn.unchecked_transaction()?;
    let snapshot = read_all(&tx)?;
    tx.commit()?;
    Ok(snapshot)
}

fn read_all(conn: &Connection) -> Result<Snapshot> {
    Ok(Snapshot {
        cards: list_cards(conn)?,
        rules: list_rules(conn)?,
        monthly_summaries: list_monthly_summaries(conn)?,
        category_summaries: list_category_summaries(conn)?,
        merchant_history: list_merchant_history(conn)?,
        config: None,
    })
}

fn json_list(text: &str) -> Result<Vec<String>> {
    Ok(serde_json::from_str(text)?)
}

/// Tier-2 limits: `0`/`NULL` mean "not set", so the tier-1 value applies.
fn tier2_limit(value: Option<f64>) -> Option<Limit> {
    value.filter(|v| *v > 0.0).map(Limit::Capped)
}

fn card_status(text: &str) -> Result<CardStatus> {
    match text {
        "Active" => Ok(CardStatus::Active),
        "Frozen" => Ok(CardStatus::Frozen),
        "Closed" => Ok(CardStatus::Closed),
        other => Err(EngineError::InvalidData(format!("unknown card status '{other}'"))),
    }
}

fn cashback_type(text: &str) -> CashbackType {
    match text {
        "2 Tier" | "TwoTier" => CashbackType::TwoTier,
        _ => CashbackType::SingleTier,
    }
}

struct CardRow {
    id: String,
    name: String,
    status: String,
    statement_day: u32,
    payment_due_day: u32,
    use_statement_month: bool,
    overall_monthly_limit: f64,
    minimum_monthly_spend: f64,
    cashback_type: String,
    tier2_min_spend: Option<f64>,
    tier2_limit: Option<f64>,
}

pub fn list_cards(conn: &Connection) -> Result<Vec<Card>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, status, statement_day, payment_due_day, use_statement_month,
                overall_monthly_limit, minimum_monthly_spend, cashback_type,
                tier2_min_spend, tier2_limit
         FROM cards ORDER BY rowid",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(CardRow {
            id: row.get(0)?,
            name: row.get(1)?,
            status: row.get(2)?,
            statement_day: row.get(3)?,
            payment_due_day: row.get(4)?,
            use_statement_month: row.get(5)?,
            overall_monthly_limit: row.get(6)?,
            minimum_monthly_spend: row.get(7)?,
            cashback_type: row.get(8)?,
            tier2_min_spend: row.get(9)?,
            tier2_limit: row.get(10)?,
        })
    })?;

    let mut cards = Vec::new();
    for row in rows {
        let row = row?;
        cards.push(Card {
            status: card_status(&row.status)?,
            statement_day: row.statement_day,
            payment_due_day: row.payment_due_day,
            use_statement_month_for_payments: row.use_statement_month,
            overall_monthly_limit: Limit::from_legacy(row.overall_monthly_limit),
            minimum_monthly_spend: Some(row.minimum_monthly_spend).filter(|v| *v > 0.0),
            cashback_type: cashback_type(&row.cashback_type),
            tier2_min_spend: row.tier2_min_spend.filter(|v| *v > 0.0),
            tier2_limit: tier2_limit(row.tier2_limit),
            id: row.id,
            name: row.name,
        });
    }
    Ok(cards)
}

struct RuleRow {
    id: String,
    card_id: String,
    name: String,
    rate: f64,
    tier2_rate: Option<f64>,
    status: String,
    cap_per_transaction: f64,
    secondary_min_amount: Option<f64>,
    secondary_cap: Option<f64>,
    category_limit: f64,
    tier2_category_limit: Option<f64>,
    category_codes: String,
    excluded_codes: String,
    is_default: bool,
    methods: Option<String>,
    categories: String,
}

impl RuleRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            card_id: row.get(1)?,
            name: row.get(2)?,
            rate: row.get(3)?,
            tier2_rate: row.get(4)?,
            status: row.get(5)?,
            cap_per_transaction: row.get(6)?,
            secondary_min_amount: row.get(7)?,
            secondary_cap: row.get(8)?,
            category_limit: row.get(9)?,
            tier2_category_limit: row.get(10)?,
            category_codes: row.get(11)?,
            excluded_codes: row.get(12)?,
            is_default: row.get(13)?,
            methods: row.get(14)?,
            categories: row.get(15)?,
        })
    }

    fn into_rule(self) -> Result<Rule> {
        let methods = match self.methods.as_deref() {
            None => MethodScope::All,
            Some(text) => {
                let names = json_list(text)?;
                if names.iter().any(|n| n.eq_ignore_ascii_case("all")) {
                    MethodScope::All
                } else {
                    let parsed = names
                        .iter()
                        .map(|n| n.parse::<PaymentMethod>())
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .map_err(EngineError::InvalidData)?;
                    MethodScope::Only(parsed)
                }
            }
        };
        let secondary_transaction = match (self.secondary_min_amount, self.secondary_cap) {
            (Some(min_amount), Some(cap)) if min_amount > 0.0 => Some(SecondaryCap {
                min_amount,
                cap: Limit::from_legacy(cap),
            }),
            _ => None,
        };

        Ok(Rule {
            rate: self.rate,
            tier2_rate: self.tier2_rate.filter(|r| *r > 0.0),
            status: if self.status == "Active" {
                RuleStatus::Active
            } else {
                RuleStatus::Inactive
            },
            cap_per_transaction: Limit::from_legacy(self.cap_per_transaction),
            secondary_transaction,
            category_limit: Limit::from_legacy(self.category_limit),
            tier2_category_limit: tier2_limit(self.tier2_category_limit),
            category_codes: json_list(&self.category_codes)?,
            excluded_codes: json_list(&self.excluded_codes)?,
            is_default: self.is_default,
            methods,
            categories: json_list(&self.categories)?,
            id: self.id,
            card_id: self.card_id,
            name: self.name,
        })
    }
}

pub fn list_rules(conn: &Connection) -> Result<Vec<Rule>> {
    let mut stmt = conn.prepare(
        "SELECT id, card_id, name, rate, tier2_rate, status, cap_per_transaction,
                secondary_min_amount, secondary_cap, category_limit, tier2_category_limit,
                category_codes, excluded_codes, is_default, methods, categories
         FROM rules ORDER BY rowid",
    )?;
    let rows = stmt.query_map([], RuleRow::from_row)?;

    let mut rules = Vec::new();
    for row in rows {
        rules.push(row?.into_rule()?);
    }
    Ok(rules)
}

pub fn list_monthly_summaries(conn: &Connection) -> Result<Vec<MonthlySummary>> {
    let mut stmt = conn.prepare(
        "SELECT card_id, cycle, spend, cashback, monthly_cashback_limit FROM monthly_summaries",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, f64>(3)?,
            row.get::<_, Option<f64>>(4)?,
        ))
    })?;

    let mut summaries = Vec::new();
    for row in rows {
        let (card_id, cycle, spend, cashback, monthly_cashback_limit) = row?;
        summaries.push(MonthlySummary {
            card_id,
            cycle: cycle.parse::<CycleKey>()?,
            spend,
            cashback,
            monthly_cashback_limit,
        });
    }
    Ok(summaries)
}

pub fn list_category_summaries(conn: &Connection) -> Result<Vec<CategorySummary>> {
    let mut stmt = conn.prepare(
        "SELECT card_id, rule_name, cycle, cashback, category_limit FROM category_summaries",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, f64>(3)?,
            row.get::<_, Option<f64>>(4)?,
        ))
    })?;

    let mut summaries = Vec::new();
    for row in rows {
        let (card_id, rule_name, cycle, cashback, category_limit) = row?;
        summaries.push(CategorySummary {
            card_id,
            rule_name,
            cycle: cycle.parse::<CycleKey>()?,
            cashback,
            category_limit,
        });
    }
    Ok(summaries)
}

pub fn list_merchant_history(conn: &Connection) -> Result<Vec<MerchantRecord>> {
    let mut stmt = conn.prepare("SELECT merchant, category_code, method FROM merchant_history ORDER BY rowid")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
        ))
    })?;

    let mut history = Vec::new();
    for row in rows {
        let (merchant, category_code, method) = row?;
        let method = match method {
            Some(text) => Some(text.parse::<PaymentMethod>().map_err(EngineError::InvalidData)?),
            None => None,
        };
        history.push(MerchantRecord {
            merchant,
            category_code,
            method,
        });
    }
    Ok(history)
}
