//! Rootfi income-statement parser.

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{SourceParser, decode};
use crate::error::SourceError;
use crate::periods::{Breakdown, DataSource, PeriodRecord};

const SOURCE_NAME: &str = "Rootfi";

/// Parser for Rootfi period arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct RootfiParser;

impl SourceParser for RootfiParser {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn parse_str(&self, json: &str) -> Result<Vec<PeriodRecord>, SourceError> {
        let document: Document = decode(SOURCE_NAME, json)?;

        let periods: Vec<PeriodRecord> = document.data.into_iter().filter_map(transform).collect();

        debug!(count = periods.len(), "Flattened Rootfi records");
        Ok(periods)
    }
}

#[derive(Debug, Deserialize)]
struct Document {
    data: Vec<RootfiRecord>,
}

#[derive(Debug, Deserialize)]
struct RootfiRecord {
    period_start: String,
    period_end: String,
    #[serde(default)]
    revenue: Option<Vec<LineItem>>,
    #[serde(default)]
    cost_of_goods_sold: Option<Vec<LineItem>>,
    #[serde(default)]
    operating_expenses: Option<Vec<LineItem>>,
    #[serde(default)]
    non_operating_revenue: Option<Vec<LineItem>>,
    #[serde(default)]
    non_operating_expenses: Option<Vec<LineItem>>,
    #[serde(default)]
    gross_profit: Option<f64>,
    #[serde(default)]
    operating_profit: Option<f64>,
    #[serde(default)]
    net_profit: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct LineItem {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    line_items: Option<Vec<LineItem>>,
}

fn transform(record: RootfiRecord) -> Option<PeriodRecord> {
    let (Ok(start), Ok(end)) = (
        NaiveDate::parse_from_str(&record.period_start, "%Y-%m-%d"),
        NaiveDate::parse_from_str(&record.period_end, "%Y-%m-%d"),
    ) else {
        warn!(
            start = %record.period_start,
            end = %record.period_end,
            "Skipping Rootfi record with unparsable dates"
        );
        return None;
    };

    let mut period = PeriodRecord::new(start, end, DataSource::Rootfi);
    period.revenue = sum_items(items(&record.revenue));
    period.cost_of_goods_sold = sum_items(items(&record.cost_of_goods_sold));
    period.gross_profit = record.gross_profit.unwrap_or(0.0);
    period.operating_expenses = sum_items(items(&record.operating_expenses));
    period.operating_profit = record.operating_profit.unwrap_or(0.0);
    period.non_operating_revenue = sum_items(items(&record.non_operating_revenue));
    period.non_operating_expenses = sum_items(items(&record.non_operating_expenses));
    period.net_profit = record.net_profit.unwrap_or(0.0);

    let mut revenue_breakdown = Breakdown::new();
    flatten_items(items(&record.revenue), &mut revenue_breakdown);
    period.revenue_breakdown = Some(revenue_breakdown);

    let mut expense_breakdown = Breakdown::new();
    flatten_items(items(&record.operating_expenses), &mut expense_breakdown);
    period.expense_breakdown = Some(expense_breakdown);

    Some(period)
}

fn items(list: &Option<Vec<LineItem>>) -> &[LineItem] {
    list.as_deref().unwrap_or_default()
}

/// Category total: top-level item values only.
fn sum_items(items: &[LineItem]) -> f64 {
    items.iter().filter_map(|item| item.value).sum()
}

/// Recursively collect non-zero `name -> value` pairs. Later names overwrite earlier ones.
fn flatten_items(items: &[LineItem], out: &mut Breakdown) {
    for item in items {
        let value = item.value.unwrap_or(0.0);
        if value != 0.0 {
            let name = item.name.as_deref().unwrap_or("Unknown");
            out.insert(name.to_string(), value);
        }
        if let Some(children) = &item.line_items {
            flatten_items(children, out);
        }
    }
}
