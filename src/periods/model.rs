//! Unified financial period model shared by both data sources.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Account or line-item name to amount.
pub type Breakdown = BTreeMap<String, f64>;

/// Which upstream system a period was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    #[serde(rename = "quickbooks")]
    QuickBooks,
    Rootfi,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::QuickBooks => "quickbooks",
            DataSource::Rootfi => "rootfi",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quickbooks" => Ok(DataSource::QuickBooks),
            "rootfi" => Ok(DataSource::Rootfi),
            other => Err(ValidationError::InvalidSource(other.to_string())),
        }
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

/// A flattened monthly record produced by a source parser, not yet stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub source: DataSource,
    #[serde(default)]
    pub revenue: f64,
    #[serde(default)]
    pub cost_of_goods_sold: f64,
    #[serde(default)]
    pub gross_profit: f64,
    #[serde(default)]
    pub operating_expenses: f64,
    #[serde(default)]
    pub operating_profit: f64,
    #[serde(default)]
    pub non_operating_revenue: f64,
    #[serde(default)]
    pub non_operating_expenses: f64,
    #[serde(default)]
    pub net_profit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue_breakdown: Option<Breakdown>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expense_breakdown: Option<Breakdown>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl PeriodRecord {
    /// Create a zeroed record for the given period and source.
    pub fn new(period_start: NaiveDate, period_end: NaiveDate, source: DataSource) -> Self {
        Self {
            period_start,
            period_end,
            source,
            revenue: 0.0,
            cost_of_goods_sold: 0.0,
            gross_profit: 0.0,
            operating_expenses: 0.0,
            operating_profit: 0.0,
            non_operating_revenue: 0.0,
            non_operating_expenses: 0.0,
            net_profit: 0.0,
            revenue_breakdown: None,
            expense_breakdown: None,
            currency: default_currency(),
        }
    }

    /// Named amounts, in column order. Used by validation and storage.
    pub fn amounts(&self) -> [(&'static str, f64); 8] {
        [
            ("revenue", self.revenue),
            ("cost_of_goods_sold", self.cost_of_goods_sold),
            ("gross_profit", self.gross_profit),
            ("operating_expenses", self.operating_expenses),
            ("operating_profit", self.operating_profit),
            ("non_operating_revenue", self.non_operating_revenue),
            ("non_operating_expenses", self.non_operating_expenses),
            ("net_profit", self.net_profit),
        ]
    }
}

/// A stored financial period.
///
/// `raw_data` keeps the record as it was loaded and is never serialized
/// into API responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialPeriod {
    pub id: i64,
    #[serde(flatten)]
    pub record: PeriodRecord,
    #[serde(skip)]
    pub raw_data: Option<serde_json::Value>,
}

impl FinancialPeriod {
    /// `"<start> to <end>"`, used in supporting data and prompts.
    pub fn label(&self) -> String {
        format!("{} to {}", self.record.period_start, self.record.period_end)
    }
}

/// Aggregate statistics across every stored period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStatistics {
    pub total_periods: usize,
    pub date_range: DateRange,
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub total_profit: f64,
    pub average_monthly_revenue: f64,
    pub average_monthly_profit: f64,
}

/// Inclusive date span, serialized as `YYYY-MM-DD` strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Counts of newly inserted rows per source after a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub quickbooks_records: usize,
    pub rootfi_records: usize,
    pub total_records: usize,
}
