//! Prompt text sent to the LLM.

use std::fmt::Write;

use crate::periods::{FinancialPeriod, SummaryStatistics};

/// Most recent periods listed in the query context.
pub const RECENT_PERIODS: usize = 12;

/// Role and ground rules for the financial analyst assistant.
pub fn system_prompt() -> String {
    "You are a financial analyst assistant. You answer questions about a \
     company's monthly profit and loss data, loaded from QuickBooks and Rootfi.\n\
     \n\
     Rules:\n\
     - Base every answer on the financial data provided. Do not invent figures.\n\
     - Quote specific amounts and periods when they support the answer.\n\
     - If the data does not cover the question, say so plainly.\n\
     - Treat revenue, expenses, and profit as USD unless told otherwise.\n\
     - Keep answers concise and well structured."
        .to_string()
}

/// Data context for a natural-language query.
pub struct FinancialContext<'a> {
    pub stats: Option<&'a SummaryStatistics>,
    /// All stored periods ordered by `period_start`. Only the tail is rendered.
    pub periods: &'a [FinancialPeriod],
}

pub fn financial_context(ctx: &FinancialContext<'_>) -> String {
    let mut out = String::from("Financial data overview:\n");

    match ctx.stats {
        Some(stats) => {
            let _ = writeln!(out, "- Total periods: {}", stats.total_periods);
            let _ = writeln!(
                out,
                "- Date range: {} to {}",
                stats.date_range.start, stats.date_range.end
            );
            let _ = writeln!(out, "- Total revenue: {}", format_money(stats.total_revenue));
            let _ = writeln!(out, "- Total expenses: {}", format_money(stats.total_expenses));
            let _ = writeln!(out, "- Total profit: {}", format_money(stats.total_profit));
        }
        None => {
            out.push_str("- Total periods: 0\n- Date range: N/A to N/A\n");
        }
    }

    let recent = &ctx.periods[ctx.periods.len().saturating_sub(RECENT_PERIODS)..];
    if !recent.is_empty() {
        out.push_str("\nRecent periods:\n");
        for period in recent {
            let r = &period.record;
            let _ = writeln!(
                out,
                "- {} to {} ({}): revenue {}, expenses {}, net profit {}",
                r.period_start,
                r.period_end,
                r.source,
                format_money(r.revenue),
                format_money(r.operating_expenses),
                format_money(r.net_profit),
            );
        }
    }

    out
}

/// Figures for the insights request.
#[derive(Debug, Clone)]
pub struct InsightsContext {
    pub period_count: usize,
    pub date_range_start: String,
    pub date_range_end: String,
    pub total_revenue: f64,
    pub total_expenses: f64,
    pub total_profit: f64,
    pub avg_revenue: f64,
    pub avg_expenses: f64,
    pub avg_profit: f64,
    pub revenue_trend: Vec<f64>,
    pub profit_trend: Vec<f64>,
}

impl InsightsContext {
    /// Net margin in percent. Zero when there is no positive revenue.
    pub fn profit_margin(&self) -> f64 {
        if self.total_revenue > 0.0 {
            self.total_profit / self.total_revenue * 100.0
        } else {
            0.0
        }
    }
}

pub fn insights_prompt(ctx: &InsightsContext) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Analyze the following financial data covering {} periods from {} to {}.",
        ctx.period_count, ctx.date_range_start, ctx.date_range_end
    );
    out.push_str("\nTotals:\n");
    let _ = writeln!(out, "- Revenue: {}", format_money(ctx.total_revenue));
    let _ = writeln!(out, "- Expenses: {}", format_money(ctx.total_expenses));
    let _ = writeln!(out, "- Net profit: {}", format_money(ctx.total_profit));
    let _ = writeln!(out, "- Profit margin: {:.2}%", ctx.profit_margin());

    out.push_str("\nMonthly averages:\n");
    let _ = writeln!(out, "- Revenue: {}", format_money(ctx.avg_revenue));
    let _ = writeln!(out, "- Expenses: {}", format_money(ctx.avg_expenses));
    let _ = writeln!(out, "- Net profit: {}", format_money(ctx.avg_profit));

    out.push_str("\nRecent trends (oldest first):\n");
    let _ = writeln!(out, "- Revenue: {}", format_series(&ctx.revenue_trend));
    let _ = writeln!(out, "- Net profit: {}", format_series(&ctx.profit_trend));

    out.push_str(
        "\nProvide:\n\
         1. Key trends in revenue, expenses, and profitability\n\
         2. Notable anomalies or unusual periods\n\
         3. Actionable recommendations based on the data\n",
    );
    out
}

fn format_series(values: &[f64]) -> String {
    if values.is_empty() {
        return "n/a".to_string();
    }
    values
        .iter()
        .map(|v| format_money(*v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `$1,234,567.89`, with a leading minus for negatives.
pub fn format_money(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((&fixed, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}${grouped}.{cents}")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::periods::{DataSource, DateRange, PeriodRecord};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn period(id: i64, month: u32, revenue: f64) -> FinancialPeriod {
        let start = NaiveDate::from_ymd_opt(2024, month, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, month, 28).unwrap();
        let mut record = PeriodRecord::new(start, end, DataSource::Rootfi);
        record.revenue = revenue;
        record.operating_expenses = revenue / 2.0;
        record.net_profit = revenue / 4.0;
        FinancialPeriod {
            id,
            record,
            raw_data: None,
        }
    }

    #[test]
    fn money_has_thousands_separators() {
        assert_eq!(format_money(0.0), "$0.00");
        assert_eq!(format_money(999.5), "$999.50");
        assert_eq!(format_money(1234.567), "$1,234.57");
        assert_eq!(format_money(1234567.0), "$1,234,567.00");
        assert_eq!(format_money(-98765.4), "-$98,765.40");
        assert_eq!(format_money(-0.001), "$0.00");
    }

    #[test]
    fn context_lists_only_recent_periods() {
        let periods: Vec<_> = (1..=12)
            .chain(1..=3)
            .enumerate()
            .map(|(i, m)| period(i as i64 + 1, m, 1000.0 * (i as f64 + 1.0)))
            .collect();
        let stats = SummaryStatistics {
            total_periods: periods.len(),
            date_range: DateRange {
                start: date("2024-01-01"),
                end: date("2024-12-28"),
            },
            total_revenue: 120000.0,
            total_expenses: 60000.0,
            total_profit: 30000.0,
            average_monthly_revenue: 8000.0,
            average_monthly_profit: 2000.0,
        };

        let text = financial_context(&FinancialContext {
            stats: Some(&stats),
            periods: &periods,
        });

        assert!(text.contains("Total periods: 15"));
        assert!(text.contains("Total revenue: $120,000.00"));
        assert_eq!(text.matches("(rootfi)").count(), RECENT_PERIODS);
        assert!(!text.contains("revenue $1,000.00,"));
        assert!(text.contains("revenue $15,000.00"));
    }

    #[test]
    fn context_without_data() {
        let text = financial_context(&FinancialContext {
            stats: None,
            periods: &[],
        });
        assert!(text.contains("Total periods: 0"));
        assert!(!text.contains("Recent periods"));
    }

    #[test]
    fn insights_prompt_reports_margin_and_trends() {
        let ctx = InsightsContext {
            period_count: 2,
            date_range_start: "2024-01-01".into(),
            date_range_end: "2024-02-29".into(),
            total_revenue: 2000.0,
            total_expenses: 1500.0,
            total_profit: 500.0,
            avg_revenue: 1000.0,
            avg_expenses: 750.0,
            avg_profit: 250.0,
            revenue_trend: vec![900.0, 1100.0],
            profit_trend: vec![200.0, 300.0],
        };
        let text = insights_prompt(&ctx);
        assert!(text.contains("2 periods from 2024-01-01 to 2024-02-29"));
        assert!(text.contains("Profit margin: 25.00%"));
        assert!(text.contains("Revenue: $900.00, $1,100.00"));
        assert!(text.contains("anomalies"));
    }

    #[test]
    fn margin_is_zero_without_revenue() {
        let ctx = InsightsContext {
            period_count: 1,
            date_range_start: String::new(),
            date_range_end: String::new(),
            total_revenue: 0.0,
            total_expenses: 10.0,
            total_profit: -10.0,
            avg_revenue: 0.0,
            avg_expenses: 10.0,
            avg_profit: -10.0,
            revenue_trend: vec![],
            profit_trend: vec![],
        };
        assert_eq!(ctx.profit_margin(), 0.0);
    }
}
