//! Cashback decision engine: picks the card that pays the most cashback for a
//! purchase and tracks how much cap is left on each card this cycle.
//!
//! All computation is pure over a read-only [`Snapshot`] and an explicit
//! `as_of` date.

pub mod calculator;
pub mod config;
pub mod cycle;
pub mod db;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod matcher;
pub mod models;
pub mod payout;
pub mod ranking;
pub mod snapshot;

pub use config::EngineConfig;
pub use cycle::CycleKey;
pub use engine::{Engine, Query};
pub use error::{EngineError, Result};
pub use snapshot::Snapshot;
