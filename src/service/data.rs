//! Loading source files into the store, and read access to stored periods.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::ServiceError;
use crate::periods::validate::{validate_date_range, validate_record};
use crate::periods::{
    DataSource, DateRange, FinancialPeriod, LoadReport, PeriodRecord, SummaryStatistics,
};
use crate::sources::{QuickBooksParser, RootfiParser, SourceParser};
use crate::store::{Database, PeriodFilter};

/// Data access over the unified `financial_periods` table.
#[derive(Clone)]
pub struct DataService {
    db: Arc<dyn Database>,
}

impl DataService {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Parse both datasets, then upsert every valid record.
    ///
    /// Both files are parsed before anything is written, so a bad file
    /// leaves the store untouched. Counts are newly inserted rows only.
    pub async fn load_from_sources(
        &self,
        quickbooks_path: &Path,
        rootfi_path: &Path,
    ) -> Result<LoadReport, ServiceError> {
        let quickbooks = QuickBooksParser.parse_file(quickbooks_path)?;
        let rootfi = RootfiParser.parse_file(rootfi_path)?;

        info!(
            quickbooks = quickbooks.len(),
            rootfi = rootfi.len(),
            "Parsed source files"
        );

        let quickbooks_records = self.store_records(&quickbooks).await?;
        let rootfi_records = self.store_records(&rootfi).await?;

        let report = LoadReport {
            quickbooks_records,
            rootfi_records,
            total_records: quickbooks_records + rootfi_records,
        };
        let stored = self.db.count_periods().await?;
        info!(
            quickbooks = report.quickbooks_records,
            rootfi = report.rootfi_records,
            total = report.total_records,
            stored,
            "Loaded financial data"
        );
        Ok(report)
    }

    async fn store_records(&self, records: &[PeriodRecord]) -> Result<usize, ServiceError> {
        let mut inserted = 0;
        for record in records {
            if let Err(e) = validate_record(record) {
                warn!(
                    source = %record.source,
                    start = %record.period_start,
                    end = %record.period_end,
                    error = %e,
                    "Skipping invalid period"
                );
                continue;
            }
            if self.db.upsert_period(record).await?.is_insert() {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// All periods, ordered by `period_start`.
    pub async fn all_periods(
        &self,
        source: Option<DataSource>,
    ) -> Result<Vec<FinancialPeriod>, ServiceError> {
        Ok(self.db.list_periods(PeriodFilter::source(source)).await?)
    }

    /// Periods fully contained in `[start_date, end_date]`.
    pub async fn period_range(
        &self,
        start_date: &str,
        end_date: &str,
        source: Option<DataSource>,
    ) -> Result<Vec<FinancialPeriod>, ServiceError> {
        let (start, end) = validate_date_range(start_date, end_date)?;
        Ok(self
            .db
            .list_periods(PeriodFilter::range(start, end, source))
            .await?)
    }

    pub async fn period(&self, id: i64) -> Result<FinancialPeriod, ServiceError> {
        self.db
            .get_period(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound {
                entity: "Period".to_string(),
                id: id.to_string(),
            })
    }

    /// Aggregates across every stored period, or `None` when empty.
    pub async fn summary_statistics(&self) -> Result<Option<SummaryStatistics>, ServiceError> {
        let periods = self.all_periods(None).await?;
        Ok(summarize(&periods))
    }
}

pub(crate) fn summarize(periods: &[FinancialPeriod]) -> Option<SummaryStatistics> {
    let start = periods.iter().map(|p| p.record.period_start).min()?;
    let end = periods.iter().map(|p| p.record.period_end).max()?;

    let total_revenue: f64 = periods.iter().map(|p| p.record.revenue).sum();
    let total_expenses: f64 = periods.iter().map(|p| p.record.operating_expenses).sum();
    let total_profit: f64 = periods.iter().map(|p| p.record.net_profit).sum();
    let count = periods.len() as f64;

    Some(SummaryStatistics {
        total_periods: periods.len(),
        date_range: DateRange { start, end },
        total_revenue,
        total_expenses,
        total_profit,
        average_monthly_revenue: total_revenue / count,
        average_monthly_profit: total_profit / count,
    })
}
