//! libSQL implementation of the async `Database` trait.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::periods::{Breakdown, DataSource, FinancialPeriod, PeriodRecord};
use crate::store::migrations;
use crate::store::traits::{
    Database, LlmCallRecord, LlmUsageSummary, PeriodFilter, UpsertOutcome,
};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// ID of the row holding this natural key, if any.
    async fn find_period_id(&self, record: &PeriodRecord) -> Result<Option<i64>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id FROM financial_periods WHERE period_start = ?1 AND period_end = ?2 AND source = ?3",
                params![
                    record.period_start.to_string(),
                    record.period_end.to_string(),
                    record.source.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_period_id: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row.get::<i64>(0)
                    .map_err(|e| DatabaseError::Query(format!("find_period_id: {e}")))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_period_id: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

const PERIOD_COLUMNS: &str = "id, period_start, period_end, source, revenue, cost_of_goods_sold, gross_profit, operating_expenses, operating_profit, non_operating_revenue, non_operating_expenses, net_profit, revenue_breakdown, expense_breakdown, currency, raw_data";

/// Convert `Option<String>` to libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn breakdown_json(breakdown: &Option<Breakdown>) -> Result<libsql::Value, DatabaseError> {
    let json = breakdown
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
    Ok(opt_text_owned(json))
}

fn parse_date(s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| DatabaseError::Serialization(format!("Invalid stored date {s}: {e}")))
}

fn read_err(idx: i32) -> impl Fn(libsql::Error) -> DatabaseError {
    move |e| DatabaseError::Query(format!("Failed to read column {idx}: {e}"))
}

/// Decode a nullable JSON text column. NULL reads as `None`.
fn json_column<T: serde::de::DeserializeOwned>(
    row: &libsql::Row,
    idx: i32,
) -> Result<Option<T>, DatabaseError> {
    match row.get_value(idx).map_err(read_err(idx))? {
        libsql::Value::Null => Ok(None),
        libsql::Value::Text(s) => serde_json::from_str(&s).map(Some).map_err(|e| {
            DatabaseError::Serialization(format!("Invalid JSON in column {idx}: {e}"))
        }),
        other => Err(DatabaseError::Serialization(format!(
            "Unexpected value in JSON column {idx}: {other:?}"
        ))),
    }
}

/// Map a libsql Row to a FinancialPeriod.
///
/// Column order matches PERIOD_COLUMNS.
fn row_to_period(row: &libsql::Row) -> Result<FinancialPeriod, DatabaseError> {
    let id: i64 = row.get::<i64>(0).map_err(read_err(0))?;
    let start_str: String = row.get::<String>(1).map_err(read_err(1))?;
    let end_str: String = row.get::<String>(2).map_err(read_err(2))?;
    let source_str: String = row.get::<String>(3).map_err(read_err(3))?;

    let source = DataSource::from_str(&source_str)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

    let mut record = PeriodRecord::new(parse_date(&start_str)?, parse_date(&end_str)?, source);
    record.revenue = row.get::<f64>(4).map_err(read_err(4))?;
    record.cost_of_goods_sold = row.get::<f64>(5).map_err(read_err(5))?;
    record.gross_profit = row.get::<f64>(6).map_err(read_err(6))?;
    record.operating_expenses = row.get::<f64>(7).map_err(read_err(7))?;
    record.operating_profit = row.get::<f64>(8).map_err(read_err(8))?;
    record.non_operating_revenue = row.get::<f64>(9).map_err(read_err(9))?;
    record.non_operating_expenses = row.get::<f64>(10).map_err(read_err(10))?;
    record.net_profit = row.get::<f64>(11).map_err(read_err(11))?;
    record.revenue_breakdown = json_column(row, 12)?;
    record.expense_breakdown = json_column(row, 13)?;
    record.currency = row.get::<String>(14).unwrap_or_else(|_| "USD".into());

    Ok(FinancialPeriod {
        id,
        record,
        raw_data: json_column(row, 15)?,
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Periods ─────────────────────────────────────────────────────

    async fn upsert_period(&self, record: &PeriodRecord) -> Result<UpsertOutcome, DatabaseError> {
        let conn = self.conn();
        let revenue_breakdown = breakdown_json(&record.revenue_breakdown)?;
        let expense_breakdown = breakdown_json(&record.expense_breakdown)?;
        let raw_data = serde_json::to_string(record)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        let inserted = conn
            .execute(
                "INSERT INTO financial_periods (period_start, period_end, source, revenue, cost_of_goods_sold, gross_profit, operating_expenses, operating_profit, non_operating_revenue, non_operating_expenses, net_profit, revenue_breakdown, expense_breakdown, currency, raw_data) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15) \
                 ON CONFLICT(period_start, period_end, source) DO NOTHING",
                params![
                    record.period_start.to_string(),
                    record.period_end.to_string(),
                    record.source.as_str(),
                    record.revenue,
                    record.cost_of_goods_sold,
                    record.gross_profit,
                    record.operating_expenses,
                    record.operating_profit,
                    record.non_operating_revenue,
                    record.non_operating_expenses,
                    record.net_profit,
                    revenue_breakdown.clone(),
                    expense_breakdown.clone(),
                    record.currency.clone(),
                    raw_data.clone(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_period (insert): {e}")))?;

        if inserted == 0 {
            conn.execute(
                "UPDATE financial_periods SET revenue = ?1, cost_of_goods_sold = ?2, gross_profit = ?3, operating_expenses = ?4, operating_profit = ?5, non_operating_revenue = ?6, non_operating_expenses = ?7, net_profit = ?8, revenue_breakdown = ?9, expense_breakdown = ?10, currency = ?11, raw_data = ?12 \
                 WHERE period_start = ?13 AND period_end = ?14 AND source = ?15",
                params![
                    record.revenue,
                    record.cost_of_goods_sold,
                    record.gross_profit,
                    record.operating_expenses,
                    record.operating_profit,
                    record.non_operating_revenue,
                    record.non_operating_expenses,
                    record.net_profit,
                    revenue_breakdown,
                    expense_breakdown,
                    record.currency.clone(),
                    raw_data,
                    record.period_start.to_string(),
                    record.period_end.to_string(),
                    record.source.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_period (update): {e}")))?;
        }

        let id = self.find_period_id(record).await?.ok_or_else(|| {
            DatabaseError::Query("upsert_period: stored row not found".to_string())
        })?;

        if inserted == 0 {
            debug!(id, source = %record.source, start = %record.period_start, "Period updated");
            Ok(UpsertOutcome::Updated(id))
        } else {
            debug!(id, source = %record.source, start = %record.period_start, "Period inserted");
            Ok(UpsertOutcome::Inserted(id))
        }
    }

    async fn list_periods(
        &self,
        filter: PeriodFilter,
    ) -> Result<Vec<FinancialPeriod>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {PERIOD_COLUMNS} FROM financial_periods \
                     WHERE (?1 IS NULL OR source = ?1) \
                       AND (?2 IS NULL OR period_start >= ?2) \
                       AND (?3 IS NULL OR period_end <= ?3) \
                     ORDER BY period_start ASC, id ASC"
                ),
                params![
                    opt_text_owned(filter.source.map(|s| s.as_str().to_string())),
                    opt_text_owned(filter.start.map(|d| d.to_string())),
                    opt_text_owned(filter.end.map(|d| d.to_string())),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_periods: {e}")))?;

        let mut periods = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_periods: {e}")))?
        {
            periods.push(row_to_period(&row)?);
        }
        Ok(periods)
    }

    async fn get_period(&self, id: i64) -> Result<Option<FinancialPeriod>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {PERIOD_COLUMNS} FROM financial_periods WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_period: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_period(&row).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_period: {e}"))),
        }
    }

    async fn count_periods(&self) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query("SELECT COUNT(*) FROM financial_periods", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("count_periods: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0)),
            _ => Ok(0),
        }
    }

    // ── LLM usage ───────────────────────────────────────────────────

    async fn record_llm_call(&self, record: &LlmCallRecord<'_>) -> Result<Uuid, DatabaseError> {
        let conn = self.conn();
        let id = Uuid::new_v4();
        let purpose = opt_text_owned(record.purpose.map(str::to_string));

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO llm_calls (id, provider, model, input_tokens, output_tokens, cost, purpose, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id.to_string(),
                record.provider,
                record.model,
                record.input_tokens as i64,
                record.output_tokens as i64,
                record.cost.to_string(),
                purpose,
                now,
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("record_llm_call: {e}")))?;

        Ok(id)
    }

    async fn get_llm_usage(&self) -> Result<LlmUsageSummary, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT TOTAL(CAST(cost AS REAL)), TOTAL(input_tokens), TOTAL(output_tokens), COUNT(*) FROM llm_calls",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_llm_usage: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                // TOTAL() always returns f64 in SQLite/libsql
                let cost_f64: f64 = row.get(0).unwrap_or(0.0);
                let total_cost =
                    Decimal::from_str(&format!("{cost_f64:.10}")).unwrap_or(Decimal::ZERO);
                let input_tokens: f64 = row.get(1).unwrap_or(0.0);
                let output_tokens: f64 = row.get(2).unwrap_or(0.0);
                let call_count = row.get::<i64>(3).unwrap_or(0);

                Ok(LlmUsageSummary {
                    total_cost: total_cost.normalize(),
                    total_input_tokens: input_tokens as u64,
                    total_output_tokens: output_tokens as u64,
                    call_count: call_count as u64,
                })
            }
            _ => Ok(LlmUsageSummary::default()),
        }
    }
}
