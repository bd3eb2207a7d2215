mod output;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tabled::Table;
use tracing_subscriber::EnvFilter;

use cashback_engine::models::PaymentMethod;
use cashback_engine::payout::PayoutSchedule;
use cashback_engine::{CycleKey, Engine, Query, Snapshot, db};
use output::{CapRow, CategoryCapRow, CycleRow, PayoutRow, RecommendationRow, SuggestionRow};

/// Cashback card picker: find the card that pays the most for every purchase
#[derive(Parser)]
#[command(name = "cashback", version, about)]
struct Cli {
    /// JSON snapshot to read cards, rules and summaries from
    #[arg(long, global = true, conflicts_with = "db")]
    snapshot: Option<PathBuf>,
    /// SQLite database to read cards, rules and summaries from
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Reference date, YYYY-MM-DD (default: today)
    #[arg(long, global = true)]
    date: Option<NaiveDate>,
    /// Refuse snapshots with more rules than this
    #[arg(long, global = true)]
    max_candidates: Option<usize>,
    /// Skip suggestions below this rate (e.g. 0.02)
    #[arg(long, global = true)]
    min_rate: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank cards for a purchase
    BestCard {
        /// Four-digit merchant category code (e.g. 5812)
        #[arg(long, required_unless_present = "merchant")]
        mcc: Option<String>,
        /// Merchant name to look up in history
        #[arg(long)]
        merchant: Option<String>,
        /// Purchase amount; commas allowed
        #[arg(long, value_parser = parse_amount)]
        amount: Option<f64>,
        /// Payment method: pos, ecom or international
        #[arg(long)]
        method: Option<PaymentMethod>,
    },

    /// Show remaining monthly and category caps for a card
    CapStatus {
        /// Card ID
        #[arg(long)]
        card: String,
        /// Cycle key, YYYYMM (default: the cycle --date falls in)
        #[arg(long)]
        cycle: Option<CycleKey>,
    },

    /// Best card per category across the wallet
    Suggest,

    /// Show the current cycle, statement date and due date for a card
    Cycle {
        /// Card ID
        #[arg(long)]
        card: String,
    },

    /// Show how a cycle's cashback gets paid out
    Payout {
        /// Card ID
        #[arg(long)]
        card: String,
        /// Cycle key, YYYYMM (default: the cycle --date falls in)
        #[arg(long)]
        cycle: Option<CycleKey>,
        /// Issuer payout schedule: M0, M+1, M+2 or Points
        #[arg(long, default_value = "M+1")]
        schedule: PayoutSchedule,
        /// Amount already paid out
        #[arg(long, default_value_t = 0.0, value_parser = parse_amount)]
        paid: f64,
    },
}

fn parse_amount(s: &str) -> std::result::Result<f64, String> {
    let cleaned = s.replace(',', "");
    cleaned
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("'{s}' is not a number"))
}

fn load_snapshot(cli: &Cli) -> Result<Snapshot> {
    if let Some(path) = &cli.snapshot {
        return Snapshot::load_json(path).with_context(|| format!("Failed to read snapshot {}", path.display()));
    }
    if let Some(path) = &cli.db {
        let conn = db::open(path).with_context(|| format!("Failed to open database {}", path.display()))?;
        return db::load_snapshot(&conn).context("Failed to load snapshot from database");
    }
    bail!("No data source. Pass --snapshot <file.json> or --db <file.sqlite>");
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let snapshot = load_snapshot(&cli)?;

    let mut config = snapshot.config.unwrap_or_default();
    if let Some(max) = cli.max_candidates {
        config.max_candidates = max;
    }
    if let Some(rate) = cli.min_rate {
        config.min_suggestion_rate = rate;
    }
    let engine = Engine::with_config(&snapshot, config);
    let as_of = cli.date.unwrap_or_else(|| Local::now().date_naive());

    match cli.command {
        Commands::BestCard {
            mcc,
            merchant,
            amount,
            method,
        } => {
            let query = Query {
                category_code: mcc.clone(),
                merchant: merchant.clone(),
                amount,
                method,
                as_of,
            };
            let ranked = engine.find_best_card(&query).context("Failed to rank cards")?;
            let subject = mcc.or(merchant).unwrap_or_default();
            if ranked.is_empty() {
                println!("No cards earn cashback for '{}'", subject);
            } else {
                println!("Best cards for '{}' on {}:", subject, as_of);
                let rows: Vec<RecommendationRow> = ranked.iter().map(RecommendationRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::CapStatus { card, cycle } => {
            let cycle = match cycle {
                Some(c) => c,
                None => engine.current_cycle(&card, as_of)?,
            };
            let status = engine.cap_status(&card, cycle, as_of)?;
            println!("{}", Table::new([CapRow::from(&status)]));
            if !status.categories.is_empty() {
                let rows: Vec<CategoryCapRow> = status.categories.iter().map(CategoryCapRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Suggest => {
            let suggestions = engine.best_per_category(as_of)?;
            if suggestions.is_empty() {
                println!("No suggestions. Add cards and rules first.");
            } else {
                let rows: Vec<SuggestionRow> = suggestions.iter().map(SuggestionRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Cycle { card } => {
            let info = engine.cycle_info(&card, as_of)?;
            println!("{}", Table::new([CycleRow::from(&info)]));
        }

        Commands::Payout {
            card,
            cycle,
            schedule,
            paid,
        } => {
            let cycle = match cycle {
                Some(c) => c,
                None => engine.current_cycle(&card, as_of)?,
            };
            let plan = engine.payout(&card, cycle, schedule, paid, as_of)?;
            println!("{}", Table::new([PayoutRow::from(&plan)]));
        }
    }

    Ok(())
}
