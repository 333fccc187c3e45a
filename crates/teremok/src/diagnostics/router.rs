use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    FormulaSubmission, Lead, LeadStatusUpdate, Product, ResultFilter, RspSubmission,
    SubmissionReceipt, TypologySubmission, UserId,
};
use super::notifications::OperatorNotifier;
use super::repository::{DiagnosticRepository, RepositoryError};
use super::service::{DiagnosticService, DiagnosticServiceError};

type SharedService<R, N> = Arc<DiagnosticService<R, N>>;

/// Router builder exposing diagnostic submission, lookup, lead and export endpoints.
pub fn diagnostics_router<R, N>(service: SharedService<R, N>) -> Router
where
    R: DiagnosticRepository + 'static,
    N: OperatorNotifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/diagnostics/typology",
            post(submit_typology_handler::<R, N>),
        )
        .route(
            "/api/v1/diagnostics/formula",
            post(submit_formula_handler::<R, N>),
        )
        .route("/api/v1/diagnostics/rsp", post(submit_rsp_handler::<R, N>))
        .route(
            "/api/v1/diagnostics/access/:user_id",
            get(access_handler::<R, N>),
        )
        .route("/api/v1/diagnostics/results", get(list_results_handler::<R, N>))
        .route(
            "/api/v1/diagnostics/results/:user_id",
            get(latest_result_handler::<R, N>),
        )
        .route(
            "/api/v1/diagnostics/catalog/:product",
            get(catalog_handler::<R, N>),
        )
        .route(
            "/api/v1/diagnostics/statistics",
            get(statistics_handler::<R, N>),
        )
        .route(
            "/api/v1/leads",
            post(submit_lead_handler::<R, N>).get(list_leads_handler::<R, N>),
        )
        .route(
            "/api/v1/leads/:user_id/status",
            post(lead_status_handler::<R, N>),
        )
        .route("/api/v1/exports/results.csv", get(export_handler::<R, N>))
        .with_state(service)
}

pub(crate) async fn submit_typology_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Json(submission): Json<TypologySubmission>,
) -> Response
where
    R: DiagnosticRepository + 'static,
    N: OperatorNotifier + 'static,
{
    receipt_response(service.submit_typology(submission))
}

pub(crate) async fn submit_formula_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Json(submission): Json<FormulaSubmission>,
) -> Response
where
    R: DiagnosticRepository + 'static,
    N: OperatorNotifier + 'static,
{
    receipt_response(service.submit_formula(submission))
}

pub(crate) async fn submit_rsp_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Json(submission): Json<RspSubmission>,
) -> Response
where
    R: DiagnosticRepository + 'static,
    N: OperatorNotifier + 'static,
{
    receipt_response(service.submit_rsp(submission))
}

/// Whether the user would pass the access gate right now.
pub(crate) async fn access_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(user_id): Path<i64>,
) -> Response
where
    R: DiagnosticRepository + 'static,
    N: OperatorNotifier + 'static,
{
    let allowed = service.can_start(UserId(user_id));
    (
        StatusCode::OK,
        Json(json!({ "user_id": user_id, "allowed": allowed })),
    )
        .into_response()
}

pub(crate) async fn latest_result_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(user_id): Path<i64>,
) -> Response
where
    R: DiagnosticRepository + 'static,
    N: OperatorNotifier + 'static,
{
    match service.latest_result(UserId(user_id)) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(DiagnosticServiceError::Repository(RepositoryError::NotFound)) => {
            let payload = json!({
                "user_id": user_id,
                "error": "no diagnostic result recorded",
            });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        Err(other) => error_response(other),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResultQuery {
    #[serde(default)]
    product: Option<String>,
    #[serde(default)]
    primary: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    /// Calendar days to look back, today included.
    #[serde(default)]
    days: Option<u32>,
}

impl ResultQuery {
    fn into_filter(self) -> Result<ResultFilter, String> {
        let product = match self.product.as_deref() {
            None | Some("all") | Some("") => None,
            Some(raw) => Some(raw.parse::<Product>()?),
        };
        let since = match self.days {
            None => None,
            Some(0) => return Err("days must be at least 1".to_string()),
            Some(days) => window_start(Utc::now(), days),
        };
        Ok(ResultFilter {
            product,
            primary: self.primary.filter(|primary| !primary.is_empty() && primary != "all"),
            since,
            limit: self.limit,
        })
    }
}

/// Midnight UTC opening a window of `days` calendar days ending on `now`.
pub(crate) fn window_start(now: DateTime<Utc>, days: u32) -> Option<DateTime<Utc>> {
    let first = now
        .date_naive()
        .checked_sub_signed(Duration::days(i64::from(days) - 1))?;
    Some(Utc.from_utc_datetime(&first.and_hms_opt(0, 0, 0)?))
}

pub(crate) async fn list_results_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Query(query): Query<ResultQuery>,
) -> Response
where
    R: DiagnosticRepository + 'static,
    N: OperatorNotifier + 'static,
{
    let filter = match query.into_filter() {
        Ok(filter) => filter,
        Err(message) => return bad_request(message),
    };

    match service.results(&filter) {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(other) => error_response(other),
    }
}

pub(crate) async fn statistics_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Query(query): Query<ResultQuery>,
) -> Response
where
    R: DiagnosticRepository + 'static,
    N: OperatorNotifier + 'static,
{
    let filter = match query.into_filter() {
        Ok(filter) => filter,
        Err(message) => return bad_request(message),
    };

    match service.statistics(&filter) {
        Ok(statistics) => (StatusCode::OK, Json(statistics)).into_response(),
        Err(other) => error_response(other),
    }
}

pub(crate) async fn catalog_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(product): Path<String>,
) -> Response
where
    R: DiagnosticRepository + 'static,
    N: OperatorNotifier + 'static,
{
    let product = match product.parse::<Product>() {
        Ok(product) => product,
        Err(message) => {
            return (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
        }
    };

    let catalogs = service.catalogs();
    let body = match product {
        Product::Typology => serde_json::to_value(&catalogs.typology),
        Product::Formula => serde_json::to_value(&catalogs.formula),
        Product::Rsp => serde_json::to_value(&catalogs.rsp),
    };

    match body {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn submit_lead_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Json(lead): Json<Lead>,
) -> Response
where
    R: DiagnosticRepository + 'static,
    N: OperatorNotifier + 'static,
{
    match service.submit_lead(lead) {
        Ok(lead) => (StatusCode::ACCEPTED, Json(lead)).into_response(),
        Err(other) => error_response(other),
    }
}

pub(crate) async fn list_leads_handler<R, N>(
    State(service): State<SharedService<R, N>>,
) -> Response
where
    R: DiagnosticRepository + 'static,
    N: OperatorNotifier + 'static,
{
    match service.leads() {
        Ok(leads) => (StatusCode::OK, Json(leads)).into_response(),
        Err(other) => error_response(other),
    }
}

pub(crate) async fn lead_status_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(user_id): Path<i64>,
    Json(update): Json<LeadStatusUpdate>,
) -> Response
where
    R: DiagnosticRepository + 'static,
    N: OperatorNotifier + 'static,
{
    match service.update_lead_status(UserId(user_id), update) {
        Ok(lead) => (StatusCode::OK, Json(lead)).into_response(),
        Err(other) => error_response(other),
    }
}

pub(crate) async fn export_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Query(query): Query<ResultQuery>,
) -> Response
where
    R: DiagnosticRepository + 'static,
    N: OperatorNotifier + 'static,
{
    let filter = match query.into_filter() {
        Ok(filter) => filter,
        Err(message) => return bad_request(message),
    };

    let mut buffer = Vec::new();
    match service.export_results(&filter, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            buffer,
        )
            .into_response(),
        Err(other) => error_response(other),
    }
}

fn receipt_response(result: Result<SubmissionReceipt, DiagnosticServiceError>) -> Response {
    match result {
        Ok(receipt) => (StatusCode::CREATED, Json(receipt)).into_response(),
        Err(other) => error_response(other),
    }
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn error_response(error: DiagnosticServiceError) -> Response {
    let status = match &error {
        DiagnosticServiceError::MissingUserId => StatusCode::BAD_REQUEST,
        DiagnosticServiceError::AccessDenied(_) => StatusCode::FORBIDDEN,
        DiagnosticServiceError::InvalidLead(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DiagnosticServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        DiagnosticServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        DiagnosticServiceError::Repository(RepositoryError::Unavailable(_))
        | DiagnosticServiceError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}
