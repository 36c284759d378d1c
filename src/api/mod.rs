//! HTTP surface: data access under `/api/v1/data`, AI under `/api/v1/ai`.

pub mod error;

use std::path::PathBuf;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::ApiError;

use crate::periods::{DataSource, FinancialPeriod, LoadReport};
use crate::service::{AiService, DataService, Insights, InsightsRange, QueryAnswer};
use crate::store::LlmUsageSummary;

/// Locations of the two input datasets used by `POST /data/load`.
#[derive(Debug, Clone)]
pub struct SourcePaths {
    pub quickbooks: PathBuf,
    pub rootfi: PathBuf,
}

#[derive(Clone)]
pub struct AppState {
    pub data: DataService,
    pub ai: AiService,
    pub sources: SourcePaths,
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/data/load", post(load_data))
        .route("/data/periods", get(list_periods))
        .route("/data/periods/range", get(period_range))
        .route("/data/periods/{id}", get(get_period))
        .route("/data/summary", get(summary))
        .route("/ai/query", post(ai_query))
        .route("/ai/insights", post(ai_insights))
        .route("/ai/usage", get(ai_usage));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Service info ────────────────────────────────────────────────────────

async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "message": "Financial Data Processing System API",
        "version": env!("CARGO_PKG_VERSION"),
        "ai_enabled": state.ai.is_configured(),
        "endpoints": [
            "POST /api/v1/data/load",
            "GET /api/v1/data/periods",
            "GET /api/v1/data/periods/range",
            "GET /api/v1/data/periods/{id}",
            "GET /api/v1/data/summary",
            "POST /api/v1/ai/query",
            "POST /api/v1/ai/insights",
            "GET /api/v1/ai/usage"
        ]
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

// ── Data ────────────────────────────────────────────────────────────────

async fn load_data(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let report: LoadReport = state
        .data
        .load_from_sources(&state.sources.quickbooks, &state.sources.rootfi)
        .await?;
    info!(total = report.total_records, "Data load requested via API");

    Ok(Json(json!({
        "message": "Data loaded successfully",
        "quickbooks_records": report.quickbooks_records,
        "rootfi_records": report.rootfi_records,
        "total_records": report.total_records,
    })))
}

#[derive(Debug, Deserialize)]
struct SourceQuery {
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RangeQuery {
    start_date: Option<String>,
    end_date: Option<String>,
    source: Option<String>,
}

fn parse_source(source: Option<&str>) -> Result<Option<DataSource>, ApiError> {
    match source.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Ok(Some(s.parse()?)),
        None => Ok(None),
    }
}

async fn list_periods(
    State(state): State<AppState>,
    Query(query): Query<SourceQuery>,
) -> Result<Json<Vec<FinancialPeriod>>, ApiError> {
    let source = parse_source(query.source.as_deref())?;
    Ok(Json(state.data.all_periods(source).await?))
}

async fn period_range(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<FinancialPeriod>>, ApiError> {
    let (Some(start), Some(end)) = (query.start_date.as_deref(), query.end_date.as_deref()) else {
        return Err(ApiError::InvalidInput(
            "start_date and end_date are required".to_string(),
        ));
    };
    let source = parse_source(query.source.as_deref())?;
    Ok(Json(state.data.period_range(start, end, source).await?))
}

async fn get_period(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FinancialPeriod>, ApiError> {
    let id: i64 = id
        .parse()
        .map_err(|_| ApiError::InvalidInput(format!("invalid period id: {id}")))?;
    Ok(Json(state.data.period(id).await?))
}

async fn summary(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    match state.data.summary_statistics().await? {
        Some(stats) => Ok(Json(stats)),
        None => Err(ApiError::NotFound("No financial data found".to_string())),
    }
}

// ── AI ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct QueryRequest {
    question: String,
    #[serde(default)]
    conversation_history: Option<Vec<Value>>,
}

async fn ai_query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryAnswer>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    let answer = state
        .ai
        .query(&req.question, req.conversation_history.as_deref())
        .await?;
    Ok(Json(answer))
}

/// The body is optional; an empty body means "all periods".
async fn ai_insights(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Insights>, ApiError> {
    let range: Option<InsightsRange> = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(
            serde_json::from_slice(&body)
                .map_err(|e| ApiError::InvalidInput(format!("invalid request body: {e}")))?,
        )
    };
    Ok(Json(state.ai.insights(range.as_ref()).await?))
}

async fn ai_usage(State(state): State<AppState>) -> Result<Json<LlmUsageSummary>, ApiError> {
    Ok(Json(state.ai.usage().await?))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::store::{Database, LibSqlBackend};

    async fn app() -> Router {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let state = AppState {
            data: DataService::new(Arc::clone(&db)),
            ai: AiService::new(db, None),
            sources: SourcePaths {
                quickbooks: PathBuf::from("missing_1.json"),
                rootfi: PathBuf::from("missing_2.json"),
            },
        };
        router(state)
    }

    async fn call(app: Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_and_root() {
        let (status, body) = call(app().await, "GET", "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = call(app().await, "GET", "/", "").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["endpoints"].as_array().unwrap().len() >= 8);
        assert_eq!(body["ai_enabled"], false);
    }

    #[tokio::test]
    async fn unknown_source_is_bad_request() {
        let (status, body) = call(app().await, "GET", "/api/v1/data/periods?source=xero", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid source: xero");
    }

    #[tokio::test]
    async fn range_requires_both_dates() {
        let (status, body) = call(
            app().await,
            "GET",
            "/api/v1/data/periods/range?start_date=2024-01-01",
            "",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("required"));
    }

    #[tokio::test]
    async fn empty_store_answers() {
        let (status, body) = call(app().await, "GET", "/api/v1/data/summary", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No financial data found");

        let (status, _) = call(app().await, "GET", "/api/v1/data/periods/1", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(app().await, "GET", "/api/v1/data/periods/abc", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(app().await, "GET", "/api/v1/data/periods", "").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_with_missing_files_is_not_found() {
        let (status, body) = call(app().await, "POST", "/api/v1/data/load", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn ai_without_key_is_bad_request() {
        let (status, body) = call(
            app().await,
            "POST",
            "/api/v1/ai/query",
            r#"{"question": "How much revenue?"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "LLM API key not configured");

        let (status, _) = call(app().await, "POST", "/api/v1/ai/query", "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(app().await, "GET", "/api/v1/ai/usage", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["call_count"], 0);
    }

    #[tokio::test]
    async fn insights_blank_dates_mean_no_filter() {
        let (status, body) = call(
            app().await,
            "POST",
            "/api/v1/ai/insights",
            r#"{"start_date": "", "end_date": ""}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No financial data available to generate insights");
    }
}
