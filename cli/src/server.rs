use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use tiffin_core::csv_io::write_csv;
use tiffin_core::db::Database;
use tiffin_core::models::{
    Expense, Meal, NewExpense, UpdateExpense, month_bounds, parse_meal, validate_amount,
};

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database>>,
}

impl AppState {
    fn db(&self) -> MutexGuard<'_, Database> {
        self.db
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct SetMealRequest {
    amount: f64,
    note: Option<String>,
}

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
#[allow(clippy::option_option)]
struct UpdateExpenseRequest {
    amount: Option<f64>,
    meal: Option<String>,
    date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    note: Option<Option<String>>,
}

#[derive(Deserialize)]
struct RangeQuery {
    start: String,
    end: String,
}

#[derive(Deserialize)]
struct ListQuery {
    month: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                tracing::error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

fn parse_date_param(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{s}'. Use YYYY-MM-DD")))
}

fn parse_month_param(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid month '{s}'. Use YYYY-MM")))
}

fn parse_meal_param(s: &str) -> Result<Meal, ApiError> {
    parse_meal(s).map_err(|e| ApiError::BadRequest(format!("{e}")))
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn get_day(
    State(state): State<AppState>,
    Path(date_str): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let date = parse_date_param(&date_str)?;
    let sheet = state.db().build_daily_sheet(date).context("database error")?;
    let value = serde_json::to_value(sheet).context("failed to serialize daily sheet")?;
    Ok(Json(value))
}

async fn clear_day(
    State(state): State<AppState>,
    Path(date_str): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let date = parse_date_param(&date_str)?;
    let removed = state.db().clear_day(date).context("database error")?;
    tracing::info!(%date, removed, "cleared day via API");
    Ok(Json(serde_json::json!({ "cleared": removed, "date": date })))
}

async fn set_meal(
    State(state): State<AppState>,
    Path((date_str, meal_str)): Path<(String, String)>,
    Json(req): Json<SetMealRequest>,
) -> Result<Response, ApiError> {
    let date = parse_date_param(&date_str)?;
    let meal = parse_meal_param(&meal_str)?;
    validate_amount(req.amount).map_err(|e| ApiError::BadRequest(format!("{e}")))?;

    let saved = state
        .db()
        .upsert_meal(&NewExpense {
            date,
            meal,
            amount: req.amount,
            note: req.note,
        })
        .context("failed to save meal")?;

    match saved {
        Some(entry) => Ok(Json(entry).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn delete_meal(
    State(state): State<AppState>,
    Path((date_str, meal_str)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let date = parse_date_param(&date_str)?;
    let meal = parse_meal_param(&meal_str)?;
    if state.db().delete_meal(date, meal).context("database error")? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("No {meal} entry for {date}")))
    }
}

async fn get_month_summary(
    State(state): State<AppState>,
    Path(month): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let date = parse_month_param(&month)?;
    let summary = state
        .db()
        .build_monthly_summary(date)
        .context("database error")?;
    let value = serde_json::to_value(summary).context("failed to serialize summary")?;
    Ok(Json(value))
}

async fn get_range_summary(
    State(state): State<AppState>,
    Query(params): Query<RangeQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let start = parse_date_param(&params.start)?;
    let end = parse_date_param(&params.end)?;
    if start > end {
        return Err(ApiError::BadRequest(format!(
            "start {start} is after end {end}"
        )));
    }
    let title = format!("{start} to {end}");
    let summary = state
        .db()
        .build_period_summary(start, end, &title)
        .context("database error")?;
    let value = serde_json::to_value(summary).context("failed to serialize summary")?;
    Ok(Json(value))
}

async fn list_expenses(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<Expense>>, ApiError> {
    let expenses = match params.month.as_deref() {
        Some(m) => {
            let (start, end) = month_bounds(parse_month_param(m)?);
            let mut rows = state
                .db()
                .expenses_in_range(start, end)
                .context("database error")?;
            rows.reverse();
            rows
        }
        None => state.db().all_expenses().context("database error")?,
    };
    Ok(Json(expenses))
}

async fn clear_expenses(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = state.db().clear_all().context("database error")?;
    tracing::info!(removed, "cleared all entries via API");
    Ok(Json(serde_json::json!({ "cleared": removed })))
}

async fn update_expense(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateExpenseRequest>,
) -> Result<Json<Expense>, ApiError> {
    if req.amount.is_none() && req.meal.is_none() && req.date.is_none() && req.note.is_none() {
        return Err(ApiError::BadRequest(
            "At least one field must be provided".to_string(),
        ));
    }

    if let Some(amount) = req.amount {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ApiError::BadRequest(
                "amount must be greater than 0".to_string(),
            ));
        }
    }

    let update = UpdateExpense {
        amount: req.amount,
        meal: req.meal.as_deref().map(parse_meal_param).transpose()?,
        date: req.date.as_deref().map(parse_date_param).transpose()?,
        note: req.note,
    };

    let entry = state
        .db()
        .update_expense(id, &update)
        .context("failed to update entry")?;
    entry
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Entry {id} not found")))
}

async fn delete_expense(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if state.db().delete_expense(id).context("database error")? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Entry {id} not found")))
    }
}

async fn export_csv(State(state): State<AppState>) -> Result<Response, ApiError> {
    let mut expenses = state.db().all_expenses().context("database error")?;
    expenses.reverse();

    let mut body = Vec::new();
    write_csv(&mut body, &expenses).context("failed to write CSV")?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"tiffin-expenses.csv\"",
            ),
        ],
        body,
    )
        .into_response())
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/day/{date}", get(get_day).delete(clear_day))
        .route("/api/day/{date}/{meal}", put(set_meal).delete(delete_meal))
        .route("/api/summary", get(get_range_summary))
        .route("/api/summary/month/{month}", get(get_month_summary))
        .route("/api/expenses", get(list_expenses).delete(clear_expenses))
        .route(
            "/api/expenses/{id}",
            put(update_expense).delete(delete_expense),
        )
        .route("/api/export", get(export_csv))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(db: Database, port: u16, bind: &str) -> anyhow::Result<()> {
    let state = AppState {
        db: Arc::new(Mutex::new(db)),
    };

    let app = build_router(state);

    if bind != "127.0.0.1" && bind != "localhost" {
        eprintln!(
            "Warning: Listening on {bind}. Any device on your network can read and change your expenses."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    eprintln!("Listening on http://{bind}:{port}");
    tracing::info!(%bind, port, "server started");
    axum::serve(listener, app).await?;

    Ok(())
}
