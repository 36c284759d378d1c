//! QuickBooks Profit & Loss report parser.
//!
//! The report is a column/row grid: column 0 holds account names and every
//! following column is one month (plus an optional `Total`). Rows are grouped
//! into sections (`Income`, `COGS`, `Expenses`, ...) whose `Summary` carries
//! the section total per column.

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{SourceParser, decode};
use crate::error::SourceError;
use crate::periods::{Breakdown, DataSource, PeriodRecord};

const SOURCE_NAME: &str = "QuickBooks";

/// Parser for QuickBooks P&L exports.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuickBooksParser;

impl SourceParser for QuickBooksParser {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn parse_str(&self, json: &str) -> Result<Vec<PeriodRecord>, SourceError> {
        let report: Report = decode(SOURCE_NAME, json)?;
        Ok(extract_periods(&report.data))
    }
}

// ── Wire types ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Report {
    data: ReportData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReportData {
    columns: Columns,
    rows: Rows,
}

#[derive(Debug, Deserialize)]
struct Columns {
    #[serde(rename = "Column", default)]
    column: Vec<Column>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Column {
    #[serde(default)]
    col_title: String,
    #[serde(default)]
    meta_data: Vec<MetaData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MetaData {
    name: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Rows {
    #[serde(rename = "Row", default)]
    row: Vec<Row>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Row {
    #[serde(rename = "group", default)]
    group: Option<String>,
    #[serde(default)]
    header: Option<ColDataSet>,
    #[serde(default)]
    col_data: Option<Vec<ColValue>>,
    #[serde(default)]
    summary: Option<ColDataSet>,
    #[serde(default)]
    rows: Option<Rows>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ColDataSet {
    #[serde(default)]
    col_data: Vec<ColValue>,
}

#[derive(Debug, Deserialize)]
struct ColValue {
    #[serde(default)]
    value: Option<String>,
}

// ── Flattening ──────────────────────────────────────────────────────────

/// Build one record per month column.
fn extract_periods(data: &ReportData) -> Vec<PeriodRecord> {
    let mut periods = Vec::new();

    // Column 0 is the account-name column.
    for (col_index, column) in data.columns.column.iter().enumerate().skip(1) {
        if column.col_title == "Total" {
            continue;
        }

        let Some((start, end)) = column_dates(column) else {
            debug!(column = %column.col_title, "Skipping column without period dates");
            continue;
        };

        let mut record = PeriodRecord::new(start, end, DataSource::QuickBooks);
        record.revenue_breakdown = Some(Breakdown::new());
        record.expense_breakdown = Some(Breakdown::new());
        apply_sections(&mut record, &data.rows.row, col_index);
        periods.push(record);
    }

    debug!(count = periods.len(), "Flattened QuickBooks report");
    periods
}

/// Read `StartDate`/`EndDate` from a column's metadata.
fn column_dates(column: &Column) -> Option<(NaiveDate, NaiveDate)> {
    let lookup = |key: &str| {
        column
            .meta_data
            .iter()
            .find(|m| m.name == key)
            .and_then(|m| m.value.as_deref())
    };

    let (start_raw, end_raw) = (lookup("StartDate")?, lookup("EndDate")?);
    match (
        NaiveDate::parse_from_str(start_raw, "%Y-%m-%d"),
        NaiveDate::parse_from_str(end_raw, "%Y-%m-%d"),
    ) {
        (Ok(start), Ok(end)) => Some((start, end)),
        _ => {
            warn!(start = start_raw, end = end_raw, "Unparsable QuickBooks column dates");
            None
        }
    }
}

/// Map each top-level section total onto the record for one column.
fn apply_sections(record: &mut PeriodRecord, rows: &[Row], col_index: usize) {
    for row in rows {
        let Some(summary) = &row.summary else {
            continue;
        };
        let value = cell_amount(&summary.col_data, col_index);

        match row.group.as_deref().unwrap_or_default() {
            "Income" => {
                record.revenue = value;
                record.revenue_breakdown = Some(section_breakdown(row, col_index));
            }
            "COGS" => record.cost_of_goods_sold = value,
            "GrossProfit" => record.gross_profit = value,
            "Expenses" => {
                record.operating_expenses = value;
                record.expense_breakdown = Some(section_breakdown(row, col_index));
            }
            "NetOperatingIncome" => record.operating_profit = value,
            "OtherIncome" => record.non_operating_revenue = value,
            "OtherExpenses" => record.non_operating_expenses = value,
            "NetIncome" => record.net_profit = value,
            _ => {}
        }
    }
}

/// Per-account amounts from a section's direct sub-rows.
///
/// Nested sections contribute their own summary total under their header name.
fn section_breakdown(row: &Row, col_index: usize) -> Breakdown {
    let mut breakdown = Breakdown::new();
    let Some(sub_rows) = &row.rows else {
        return breakdown;
    };

    for sub_row in &sub_rows.row {
        let name_cells = match (&sub_row.header, &sub_row.col_data) {
            (Some(header), _) => &header.col_data,
            (None, Some(cells)) => cells,
            (None, None) => continue,
        };
        let name = name_cells
            .first()
            .and_then(|c| c.value.as_deref())
            .filter(|v| !v.is_empty())
            .unwrap_or("Unknown");

        let value_cells = match (&sub_row.summary, &sub_row.col_data) {
            (Some(summary), _) => &summary.col_data,
            (None, Some(cells)) => cells,
            (None, None) => name_cells,
        };
        let value = cell_amount(value_cells, col_index);

        if value != 0.0 {
            breakdown.insert(name.to_string(), value);
        }
    }

    breakdown
}

fn cell_amount(cells: &[ColValue], col_index: usize) -> f64 {
    cells
        .get(col_index)
        .and_then(|c| c.value.as_deref())
        .map(parse_amount)
        .unwrap_or(0.0)
}

/// Parse a QuickBooks amount string. Empty, garbage or non-finite reads as zero.
fn parse_amount(raw: &str) -> f64 {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() {
        return 0.0;
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
      "data": {
        "Columns": {
          "Column": [
            {"ColTitle": "", "ColType": "Account", "MetaData": []},
            {"ColTitle": "Jan 2024", "ColType": "Money", "MetaData": [
              {"Name": "StartDate", "Value": "2024-01-01"},
              {"Name": "EndDate", "Value": "2024-01-31"}
            ]},
            {"ColTitle": "Feb 2024", "ColType": "Money", "MetaData": [
              {"Name": "StartDate", "Value": "2024-02-01"},
              {"Name": "EndDate", "Value": "2024-02-29"}
            ]},
            {"ColTitle": "Total", "ColType": "Money", "MetaData": [
              {"Name": "StartDate", "Value": "2024-01-01"},
              {"Name": "EndDate", "Value": "2024-02-29"}
            ]}
          ]
        },
        "Rows": {
          "Row": [
            {
              "group": "Income",
              "Header": {"ColData": [{"value": "Income"}, {"value": ""}, {"value": ""}, {"value": ""}]},
              "Rows": {"Row": [
                {"ColData": [{"value": "Sales"}, {"value": "1,000.50"}, {"value": "800.00"}, {"value": "1800.50"}]},
                {"ColData": [{"value": "Services"}, {"value": "0.00"}, {"value": "200.00"}, {"value": "200.00"}]},
                {
                  "Header": {"ColData": [{"value": "Consulting"}, {"value": ""}, {"value": ""}, {"value": ""}]},
                  "Rows": {"Row": []},
                  "Summary": {"ColData": [{"value": "Total Consulting"}, {"value": "50.00"}, {"value": ""}, {"value": "50.00"}]}
                }
              ]},
              "Summary": {"ColData": [{"value": "Total Income"}, {"value": "1,050.50"}, {"value": "1000.00"}, {"value": "2050.50"}]}
            },
            {
              "group": "COGS",
              "Summary": {"ColData": [{"value": "Total COGS"}, {"value": "100.00"}, {"value": "90.00"}, {"value": "190.00"}]}
            },
            {
              "group": "GrossProfit",
              "Summary": {"ColData": [{"value": "Gross Profit"}, {"value": "950.50"}, {"value": "910.00"}, {"value": "1860.50"}]}
            },
            {
              "group": "Expenses",
              "Rows": {"Row": [
                {"ColData": [{"value": "Rent"}, {"value": "500.00"}, {"value": "500.00"}, {"value": "1000.00"}]},
                {"ColData": [{"value": ""}, {"value": "12.00"}, {"value": ""}, {"value": "12.00"}]}
              ]},
              "Summary": {"ColData": [{"value": "Total Expenses"}, {"value": "512.00"}, {"value": "500.00"}, {"value": "1012.00"}]}
            },
            {
              "group": "NetOperatingIncome",
              "Summary": {"ColData": [{"value": "Net Operating Income"}, {"value": "438.50"}, {"value": "410.00"}, {"value": "848.50"}]}
            },
            {
              "group": "OtherIncome",
              "Summary": {"ColData": [{"value": "Total Other Income"}, {"value": "5.00"}, {"value": ""}, {"value": "5.00"}]}
            },
            {
              "group": "OtherExpenses",
              "Summary": {"ColData": [{"value": "Total Other Expenses"}, {"value": "0.00"}, {"value": "7.25"}, {"value": "7.25"}]}
            },
            {
              "group": "NetIncome",
              "Summary": {"ColData": [{"value": "Net Income"}, {"value": "443.50"}, {"value": "-410.00"}, {"value": "33.50"}]}
            }
          ]
        }
      }
    }"#;

    fn parse() -> Vec<PeriodRecord> {
        QuickBooksParser.parse_str(REPORT).unwrap()
    }

    #[test]
    fn one_record_per_month_column() {
        let periods = parse();
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].period_start.to_string(), "2024-01-01");
        assert_eq!(periods[0].period_end.to_string(), "2024-01-31");
        assert_eq!(periods[1].period_start.to_string(), "2024-02-01");
        assert!(periods.iter().all(|p| p.source == DataSource::QuickBooks));
    }

    #[test]
    fn section_totals_map_to_fields() {
        let jan = &parse()[0];
        assert_eq!(jan.revenue, 1050.5);
        assert_eq!(jan.cost_of_goods_sold, 100.0);
        assert_eq!(jan.gross_profit, 950.5);
        assert_eq!(jan.operating_expenses, 512.0);
        assert_eq!(jan.operating_profit, 438.5);
        assert_eq!(jan.non_operating_revenue, 5.0);
        assert_eq!(jan.non_operating_expenses, 0.0);
        assert_eq!(jan.net_profit, 443.5);
    }

    #[test]
    fn negative_and_empty_values() {
        let feb = &parse()[1];
        assert_eq!(feb.net_profit, -410.0);
        assert_eq!(feb.non_operating_revenue, 0.0);
        assert_eq!(feb.non_operating_expenses, 7.25);
    }

    #[test]
    fn breakdown_skips_zero_and_uses_nested_summary() {
        let jan = &parse()[0];
        let revenue = jan.revenue_breakdown.as_ref().unwrap();
        assert_eq!(revenue.get("Sales"), Some(&1000.5));
        assert_eq!(revenue.get("Consulting"), Some(&50.0));
        assert!(!revenue.contains_key("Services"));

        let feb = &parse()[1];
        let revenue = feb.revenue_breakdown.as_ref().unwrap();
        assert_eq!(revenue.get("Services"), Some(&200.0));
        assert!(!revenue.contains_key("Consulting"));
    }

    #[test]
    fn unnamed_account_is_unknown() {
        let jan = &parse()[0];
        let expenses = jan.expense_breakdown.as_ref().unwrap();
        assert_eq!(expenses.get("Rent"), Some(&500.0));
        assert_eq!(expenses.get("Unknown"), Some(&12.0));
    }

    #[test]
    fn column_without_dates_is_skipped() {
        let json = r#"{"data": {
            "Columns": {"Column": [
                {"ColTitle": ""},
                {"ColTitle": "Jan", "MetaData": [{"Name": "StartDate", "Value": "2024-01-01"}]}
            ]},
            "Rows": {"Row": []}
        }}"#;
        assert!(QuickBooksParser.parse_str(json).unwrap().is_empty());
    }

    #[test]
    fn parse_amount_handles_garbage() {
        assert_eq!(parse_amount(""), 0.0);
        assert_eq!(parse_amount("  "), 0.0);
        assert_eq!(parse_amount("abc"), 0.0);
        assert_eq!(parse_amount("12,345.67"), 12345.67);
        assert_eq!(parse_amount("-3.5"), -3.5);
        assert_eq!(parse_amount("1e999"), 0.0);
        assert_eq!(parse_amount("inf"), 0.0);
        assert_eq!(parse_amount("NaN"), 0.0);
    }

    #[test]
    fn non_finite_breakdown_entry_keeps_the_rest() {
        let json = r#"{"data": {
            "Columns": {"Column": [
                {"ColTitle": ""},
                {"ColTitle": "Jan", "MetaData": [
                    {"Name": "StartDate", "Value": "2024-01-01"},
                    {"Name": "EndDate", "Value": "2024-01-31"}
                ]}
            ]},
            "Rows": {"Row": [
                {"group": "Income",
                 "Rows": {"Row": [
                    {"ColData": [{"value": "Sales"}, {"value": "100"}]},
                    {"ColData": [{"value": "Weird"}, {"value": "1e999"}]}
                 ]},
                 "Summary": {"ColData": [{"value": "Total Income"}, {"value": "NaN"}]}}
            ]}
        }}"#;
        let periods = QuickBooksParser.parse_str(json).unwrap();
        let revenue = periods[0].revenue_breakdown.as_ref().unwrap();
        assert_eq!(revenue.len(), 1);
        assert_eq!(revenue.get("Sales"), Some(&100.0));
        assert_eq!(periods[0].revenue, 0.0);
    }

    #[test]
    fn absent_sections_give_empty_breakdowns() {
        let json = r#"{"data": {
            "Columns": {"Column": [
                {"ColTitle": ""},
                {"ColTitle": "Jan", "MetaData": [
                    {"Name": "StartDate", "Value": "2024-01-01"},
                    {"Name": "EndDate", "Value": "2024-01-31"}
                ]}
            ]},
            "Rows": {"Row": [
                {"group": "NetIncome", "Summary": {"ColData": [{"value": "Net Income"}, {"value": "10"}]}}
            ]}
        }}"#;
        let periods = QuickBooksParser.parse_str(json).unwrap();
        assert_eq!(periods[0].revenue_breakdown, Some(Breakdown::new()));
        assert_eq!(periods[0].expense_breakdown, Some(Breakdown::new()));
    }
}
