// HTTP gateway
// Decodes requests, runs the payroll operation on the blocking pool, and
// answers with the {success, message} envelope.

use crate::entities::LedgerEntry;
use crate::error::PayrollError;
use crate::reconciliation::ReconciliationResult;
use crate::service::PayrollService;
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Form, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    service: Arc<PayrollService>,
}

impl AppState {
    pub fn new(service: PayrollService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

// ============================================================================
// Envelope & request bodies
// ============================================================================

/// Body of every response
#[derive(Debug, Serialize)]
pub struct ApiResponse<T = ()> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl ApiResponse<()> {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: f64,
}

/// Withdrawal credentials, accepted from the form body or the query string
#[derive(Debug, Default, Deserialize)]
pub struct WithdrawParams {
    pub employee_id: Option<String>,
    pub secret_id: Option<String>,
}

impl WithdrawParams {
    /// Form values win over query values
    fn merge(form: Option<WithdrawParams>, query: WithdrawParams) -> WithdrawParams {
        let form = form.unwrap_or_default();
        WithdrawParams {
            employee_id: non_blank(form.employee_id).or(non_blank(query.employee_id)),
            secret_id: non_blank(form.secret_id).or(non_blank(query.secret_id)),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Serialize)]
pub struct BalanceData {
    pub balance: f64,
}

#[derive(Debug, Serialize)]
pub struct LedgerData {
    pub entries: Vec<LedgerEntry>,
    pub reconciliation: ReconciliationResult,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Payroll(#[from] PayrollError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Worker failed: {0}")]
    Internal(String),

    #[error("Not implemented")]
    NotImplemented,

    #[error("No route for this path")]
    RouteNotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,
}

pub type ApiResult<T> = Result<T, ApiError>;

fn status_for(err: &PayrollError) -> StatusCode {
    match err {
        PayrollError::Validation(_) => StatusCode::BAD_REQUEST,
        PayrollError::NotFound(_) => StatusCode::NOT_FOUND,
        PayrollError::Unauthorized => StatusCode::UNAUTHORIZED,
        PayrollError::AlreadyWithdrawn => StatusCode::FORBIDDEN,
        PayrollError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Payroll(e) => (status_for(e), e.public_message()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "Invalid request".to_string()),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            ApiError::NotImplemented => (StatusCode::NOT_IMPLEMENTED, "Not implemented".to_string()),
            ApiError::RouteNotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "Method not allowed".to_string(),
            ),
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
        } else {
            debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        (status, Json(ApiResponse::fail(message))).into_response()
    }
}

/// Run a synchronous service call off the async workers
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T, PayrollError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /topup
async fn top_up(
    State(state): State<AppState>,
    payload: Result<Json<AmountRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let service = state.service.clone();
    blocking(move || service.top_up(request.amount)).await?;

    Ok(Json(ApiResponse::ok("Balance topped up successfully")))
}

/// POST /deduct
async fn deduct(
    State(state): State<AppState>,
    payload: Result<Json<AmountRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let service = state.service.clone();
    blocking(move || service.deduct(request.amount)).await?;

    Ok(Json(ApiResponse::ok("Balance deducted successfully")))
}

/// POST /withdraw
async fn withdraw(
    State(state): State<AppState>,
    query: Result<Query<WithdrawParams>, QueryRejection>,
    form: Option<Form<WithdrawParams>>,
) -> ApiResult<Json<ApiResponse>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let params = WithdrawParams::merge(form.map(|Form(f)| f), query);

    let employee_id = params
        .employee_id
        .ok_or_else(|| ApiError::BadRequest("employee_id is required".to_string()))?;
    let employee_id: i64 = employee_id
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("employee_id is not a number: {}", employee_id)))?;
    let secret_id = params
        .secret_id
        .ok_or_else(|| ApiError::BadRequest("secret_id is required".to_string()))?;

    let service = state.service.clone();
    blocking(move || service.withdraw(employee_id, &secret_id)).await?;

    Ok(Json(ApiResponse::ok("Salary withdrawn successfully")))
}

/// POST /position and POST /employee: reserved, no management surface yet
async fn not_implemented() -> ApiError {
    ApiError::NotImplemented
}

/// Unmatched paths
async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

/// Known path, wrong method
async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// GET /health
async fn health_check() -> Json<ApiResponse> {
    Json(ApiResponse::ok("OK"))
}

/// GET /balance
async fn get_balance(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<BalanceData>>> {
    let service = state.service.clone();
    let balance = blocking(move || service.balance()).await?;

    Ok(Json(ApiResponse::with_data("OK", BalanceData { balance })))
}

/// GET /ledger
async fn get_ledger(State(state): State<AppState>) -> ApiResult<Json<ApiResponse<LedgerData>>> {
    let service = state.service.clone();
    let (entries, reconciliation) = blocking(move || service.ledger_report()).await?;
    let data = LedgerData {
        entries,
        reconciliation,
    };

    Ok(Json(ApiResponse::with_data("OK", data)))
}

// ============================================================================
// Router
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/topup", post(top_up))
        .route("/deduct", post(deduct))
        .route("/withdraw", post(withdraw))
        .route("/position", post(not_implemented))
        .route("/employee", post(not_implemented))
        .route("/health", get(health_check))
        .route("/balance", get(get_balance))
        .route("/ledger", get(get_ledger))
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&PayrollError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&PayrollError::NotFound(1)), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&PayrollError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&PayrollError::AlreadyWithdrawn), StatusCode::FORBIDDEN);
        assert_eq!(
            status_for(&PayrollError::Storage {
                operation: "update balance",
                source: rusqlite::Error::QueryReturnedNoRows,
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_form_values_win_over_query() {
        let form = WithdrawParams {
            employee_id: Some("7".to_string()),
            secret_id: Some("  ".to_string()),
        };
        let query = WithdrawParams {
            employee_id: Some("8".to_string()),
            secret_id: Some("from-query".to_string()),
        };

        let merged = WithdrawParams::merge(Some(form), query);

        assert_eq!(merged.employee_id.as_deref(), Some("7"));
        assert_eq!(merged.secret_id.as_deref(), Some("from-query"));
    }

    #[test]
    fn test_envelope_omits_empty_data() {
        let json = serde_json::to_value(ApiResponse::ok("done")).unwrap();
        assert_eq!(json, serde_json::json!({"success": true, "message": "done"}));
    }
}
