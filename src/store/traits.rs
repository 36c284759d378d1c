//! `Database` trait: the single async interface for all persistence.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::periods::{DataSource, FinancialPeriod, PeriodRecord};

/// Filter for listing periods. Empty filter returns everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodFilter {
    pub source: Option<DataSource>,
    /// Keep periods with `period_start >= start`.
    pub start: Option<NaiveDate>,
    /// Keep periods with `period_end <= end`.
    pub end: Option<NaiveDate>,
}

impl PeriodFilter {
    pub fn source(source: Option<DataSource>) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    pub fn range(start: NaiveDate, end: NaiveDate, source: Option<DataSource>) -> Self {
        Self {
            source,
            start: Some(start),
            end: Some(end),
        }
    }
}

/// What an upsert did to the natural key `(period_start, period_end, source)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(i64),
    Updated(i64),
}

impl UpsertOutcome {
    pub fn id(&self) -> i64 {
        match self {
            UpsertOutcome::Inserted(id) | UpsertOutcome::Updated(id) => *id,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted(_))
    }
}

/// One LLM round trip to record for usage accounting.
#[derive(Debug, Clone)]
pub struct LlmCallRecord<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost: Decimal,
    pub purpose: Option<&'a str>,
}

/// Aggregate LLM usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LlmUsageSummary {
    pub total_cost: Decimal,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub call_count: u64,
}

/// Backend-agnostic database trait covering financial periods and LLM usage.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Periods ─────────────────────────────────────────────────────

    /// Insert a record, or update every non-key field of the existing row
    /// with the same `(period_start, period_end, source)`.
    async fn upsert_period(&self, record: &PeriodRecord) -> Result<UpsertOutcome, DatabaseError>;

    /// List periods matching the filter, ordered by `period_start`.
    async fn list_periods(&self, filter: PeriodFilter)
    -> Result<Vec<FinancialPeriod>, DatabaseError>;

    /// Get a period by ID.
    async fn get_period(&self, id: i64) -> Result<Option<FinancialPeriod>, DatabaseError>;

    /// Number of stored periods.
    async fn count_periods(&self) -> Result<i64, DatabaseError>;

    // ── LLM usage ───────────────────────────────────────────────────

    /// Record a completed LLM call. Returns the generated ID.
    async fn record_llm_call(&self, record: &LlmCallRecord<'_>) -> Result<Uuid, DatabaseError>;

    /// Totals across every recorded LLM call.
    async fn get_llm_usage(&self) -> Result<LlmUsageSummary, DatabaseError>;
}
