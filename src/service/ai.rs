//! Natural-language questions and insight generation over stored periods.
//!
//! Every request is one prompt/response round trip: build the data context,
//! call the provider once, record usage, and return the answer alongside
//! the figures that were relevant to it.

use std::sync::{Arc, LazyLock};

use chrono::{Datelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use super::data::{DataService, summarize};
use crate::error::ServiceError;
use crate::llm::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role, call_cost,
};
use crate::periods::{DateRange, FinancialPeriod};
use crate::prompts::{self, FinancialContext, InsightsContext};
use crate::store::{Database, LlmCallRecord, LlmUsageSummary};

/// History entries forwarded with a query.
pub const MAX_HISTORY: usize = 10;
/// Trend values included in insight summaries.
pub const TREND_WINDOW: usize = 6;
/// Periods returned for "recent"/"latest" questions.
const RECENT_SUPPORTING: usize = 3;

const QUERY_TEMPERATURE: f32 = 0.3;
const QUERY_MAX_TOKENS: u32 = 1000;
const INSIGHTS_TEMPERATURE: f32 = 0.5;
const INSIGHTS_MAX_TOKENS: u32 = 1500;

static QUARTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:q([1-4])|quarter ([1-4])|(first|second|third|fourth) quarter)\b")
        .expect("quarter pattern compiles")
});
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("year pattern compiles"));
static RECENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:recent|latest)\b").expect("recent pattern compiles"));

/// Answer to a natural-language question.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub answer: String,
    /// `{"periods": [...]}` when the question names a period, else `{}`.
    pub supporting_data: Value,
    pub question: String,
    pub timestamp: String,
}

/// Optional date filter for insights. Both bounds are required once either is set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InsightsRange {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

impl InsightsRange {
    /// Both bounds with blank strings read as unset.
    fn bounds(&self) -> (Option<&str>, Option<&str>) {
        (non_blank(&self.start_date), non_blank(&self.end_date))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Serialize)]
pub struct Insights {
    pub insights: String,
    pub period_count: usize,
    pub data_summary: DataSummary,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub period_count: usize,
    pub date_range: DateRange,
    pub totals: Figures,
    pub averages: Figures,
    pub trends: Trends,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Figures {
    pub revenue: f64,
    pub expenses: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trends {
    pub revenue_trend: Vec<f64>,
    pub profit_trend: Vec<f64>,
}

/// LLM-backed analysis over the period store.
#[derive(Clone)]
pub struct AiService {
    data: DataService,
    db: Arc<dyn Database>,
    llm: Option<Arc<dyn LlmProvider>>,
}

impl AiService {
    pub fn new(db: Arc<dyn Database>, llm: Option<Arc<dyn LlmProvider>>) -> Self {
        Self {
            data: DataService::new(Arc::clone(&db)),
            db,
            llm,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.llm.is_some()
    }

    /// Answer a question about the stored data.
    ///
    /// `history` entries that are not `{role, content}` objects with a known
    /// role and string content are dropped. Only the last [`MAX_HISTORY`] are sent.
    pub async fn query(
        &self,
        question: &str,
        history: Option<&[Value]>,
    ) -> Result<QueryAnswer, ServiceError> {
        if question.trim().is_empty() {
            return Err(ServiceError::InvalidRequest(
                "Question cannot be empty".to_string(),
            ));
        }
        let llm = self.provider()?;

        let periods = self.data.all_periods(None).await?;
        let stats = summarize(&periods);
        let context = prompts::financial_context(&FinancialContext {
            stats: stats.as_ref(),
            periods: &periods,
        });

        let mut messages = vec![
            ChatMessage::system(prompts::system_prompt()),
            ChatMessage::system(context),
        ];
        messages.extend(sanitize_history(history.unwrap_or_default()));
        messages.push(ChatMessage::user(question));

        let request = CompletionRequest::new(messages)
            .with_temperature(QUERY_TEMPERATURE)
            .with_max_tokens(QUERY_MAX_TOKENS);
        let response = self.complete(llm, request, "query").await?;

        Ok(QueryAnswer {
            answer: response.content,
            supporting_data: supporting_data(question, &periods),
            question: question.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        })
    }

    /// Summarize the stored data (optionally a date range) and ask for insights.
    pub async fn insights(&self, range: Option<&InsightsRange>) -> Result<Insights, ServiceError> {
        let bounds = match range.map(InsightsRange::bounds) {
            Some((Some(start), Some(end))) => Some((start, end)),
            Some((None, None)) | None => None,
            Some(_) => {
                return Err(ServiceError::InvalidRequest(
                    "Both start_date and end_date are required when filtering insights"
                        .to_string(),
                ));
            }
        };

        let periods = match bounds {
            Some((start, end)) => self.data.period_range(start, end, None).await?,
            None => self.data.all_periods(None).await?,
        };
        let Some(summary) = data_summary(&periods) else {
            return Err(ServiceError::InvalidRequest(
                "No financial data available to generate insights".to_string(),
            ));
        };
        let llm = self.provider()?;

        let prompt = prompts::insights_prompt(&InsightsContext {
            period_count: summary.period_count,
            date_range_start: summary.date_range.start.to_string(),
            date_range_end: summary.date_range.end.to_string(),
            total_revenue: summary.totals.revenue,
            total_expenses: summary.totals.expenses,
            total_profit: summary.totals.profit,
            avg_revenue: summary.averages.revenue,
            avg_expenses: summary.averages.expenses,
            avg_profit: summary.averages.profit,
            revenue_trend: summary.trends.revenue_trend.clone(),
            profit_trend: summary.trends.profit_trend.clone(),
        });

        let request = CompletionRequest::new(vec![
            ChatMessage::system(prompts::system_prompt()),
            ChatMessage::user(prompt),
        ])
        .with_temperature(INSIGHTS_TEMPERATURE)
        .with_max_tokens(INSIGHTS_MAX_TOKENS);
        let response = self.complete(llm, request, "insights").await?;

        Ok(Insights {
            insights: response.content,
            period_count: summary.period_count,
            data_summary: summary,
            timestamp: Utc::now().to_rfc3339(),
        })
    }

    /// Totals across every recorded LLM call.
    pub async fn usage(&self) -> Result<LlmUsageSummary, ServiceError> {
        Ok(self.db.get_llm_usage().await?)
    }

    fn provider(&self) -> Result<&Arc<dyn LlmProvider>, ServiceError> {
        self.llm.as_ref().ok_or(ServiceError::NotConfigured)
    }

    async fn complete(
        &self,
        llm: &Arc<dyn LlmProvider>,
        request: CompletionRequest,
        purpose: &str,
    ) -> Result<CompletionResponse, ServiceError> {
        let response = llm
            .complete(request)
            .await
            .map_err(|source| ServiceError::Llm {
                purpose: purpose.to_string(),
                source,
            })?;

        let cost = call_cost(
            llm.cost_per_token(),
            response.input_tokens,
            response.output_tokens,
        );
        info!(
            purpose,
            model = llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            %cost,
            "LLM call complete"
        );

        let record = LlmCallRecord {
            provider: llm.provider_name(),
            model: llm.model_name(),
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            cost,
            purpose: Some(purpose),
        };
        if let Err(e) = self.db.record_llm_call(&record).await {
            warn!(error = %e, purpose, "Failed to record LLM usage");
        }

        Ok(response)
    }
}

/// Keep well-formed history entries, most recent [`MAX_HISTORY`] only.
fn sanitize_history(history: &[Value]) -> Vec<ChatMessage> {
    let kept: Vec<ChatMessage> = history
        .iter()
        .filter_map(|entry| {
            let role = Role::parse(entry.get("role")?.as_str()?)?;
            let content = entry.get("content")?.as_str()?;
            Some(match role {
                Role::System => ChatMessage::system(content),
                Role::User => ChatMessage::user(content),
                Role::Assistant => ChatMessage::assistant(content),
            })
        })
        .collect();

    let skip = kept.len().saturating_sub(MAX_HISTORY);
    kept.into_iter().skip(skip).collect()
}

/// Pick the periods a question refers to. The first matching rule wins.
fn supporting_data(question: &str, periods: &[FinancialPeriod]) -> Value {
    let lower = question.to_lowercase();
    let year = YEAR_RE
        .captures(&lower)
        .and_then(|c| c[1].parse::<i32>().ok());

    let selected: Vec<&FinancialPeriod> = if let Some(quarter) = quarter_of(&lower) {
        let Some(year) = year.or_else(|| latest_year(periods)) else {
            return json!({});
        };
        let months = (quarter - 1) * 3 + 1..=quarter * 3;
        periods
            .iter()
            .filter(|p| {
                p.record.period_start.year() == year
                    && months.contains(&p.record.period_start.month())
            })
            .collect()
    } else if let Some(year) = year {
        periods
            .iter()
            .filter(|p| p.record.period_start.year() == year)
            .collect()
    } else if RECENT_RE.is_match(&lower) {
        let skip = periods.len().saturating_sub(RECENT_SUPPORTING);
        periods.iter().skip(skip).collect()
    } else {
        return json!({});
    };

    let rows: Vec<Value> = selected
        .into_iter()
        .map(|p| {
            json!({
                "period": p.label(),
                "revenue": p.record.revenue,
                "expenses": p.record.operating_expenses,
                "profit": p.record.net_profit,
            })
        })
        .collect();
    json!({ "periods": rows })
}

fn quarter_of(lower: &str) -> Option<u32> {
    let caps = QUARTER_RE.captures(lower)?;
    if let Some(n) = caps.get(1).or_else(|| caps.get(2)) {
        return n.as_str().parse().ok();
    }
    match caps.get(3)?.as_str() {
        "first" => Some(1),
        "second" => Some(2),
        "third" => Some(3),
        "fourth" => Some(4),
        _ => None,
    }
}

fn latest_year(periods: &[FinancialPeriod]) -> Option<i32> {
    periods.iter().map(|p| p.record.period_start.year()).max()
}

/// Totals, averages, and recent trends for insight generation.
///
/// Periods must be ordered by `period_start`. Returns `None` when empty.
fn data_summary(periods: &[FinancialPeriod]) -> Option<DataSummary> {
    let first = periods.first()?;
    let last = periods.last()?;
    let count = periods.len() as f64;

    let totals = Figures {
        revenue: periods.iter().map(|p| p.record.revenue).sum(),
        expenses: periods.iter().map(|p| p.record.operating_expenses).sum(),
        profit: periods.iter().map(|p| p.record.net_profit).sum(),
    };
    let averages = Figures {
        revenue: totals.revenue / count,
        expenses: totals.expenses / count,
        profit: totals.profit / count,
    };

    let tail = &periods[periods.len().saturating_sub(TREND_WINDOW)..];
    let trends = Trends {
        revenue_trend: tail.iter().map(|p| p.record.revenue).collect(),
        profit_trend: tail.iter().map(|p| p.record.net_profit).collect(),
    };

    Some(DataSummary {
        period_count: periods.len(),
        date_range: DateRange {
            start: first.record.period_start,
            end: last.record.period_end,
        },
        totals,
        averages,
        trends,
    })
}
