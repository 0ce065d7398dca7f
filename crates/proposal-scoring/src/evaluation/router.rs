use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{ActorId, OpportunityScope, RequirementId, SupplierId};
use super::error::ScoringError;
use super::matrix::MatrixFilter;
use super::repository::ScoringRepository;
use super::service::ScoringService;

const OPPORTUNITY_ROOT: &str = "/api/v1/tenants/:tenant_id/opportunities/:opportunity_id";

/// Router builder exposing the scoring engine over HTTP.
pub fn scoring_router<R>(service: Arc<ScoringService<R>>) -> Router
where
    R: ScoringRepository + 'static,
{
    Router::new()
        .route(
            &format!("{OPPORTUNITY_ROOT}/comparison"),
            post(comparison_handler::<R>),
        )
        .route(
            &format!("{OPPORTUNITY_ROOT}/scoring-matrix"),
            get(matrix_handler::<R>),
        )
        .route(
            &format!("{OPPORTUNITY_ROOT}/scoring-matrix/export"),
            get(export_handler::<R>),
        )
        .route(
            &format!(
                "{OPPORTUNITY_ROOT}/suppliers/:supplier_id/requirements/:requirement_id/override"
            ),
            put(apply_override_handler::<R>).delete(clear_override_handler::<R>),
        )
        .route(
            &format!("{OPPORTUNITY_ROOT}/suppliers/:supplier_id/scores/regenerate"),
            post(regenerate_handler::<R>),
        )
        .route(
            &format!("{OPPORTUNITY_ROOT}/suppliers/:supplier_id/scoring-items"),
            get(scoring_items_handler::<R>),
        )
        .route(
            &format!("{OPPORTUNITY_ROOT}/suppliers/:supplier_id/readiness"),
            post(readiness_handler::<R>),
        )
        .route(
            &format!("{OPPORTUNITY_ROOT}/readiness"),
            post(readiness_batch_handler::<R>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpportunityPath {
    tenant_id: String,
    opportunity_id: String,
}

impl OpportunityPath {
    fn scope(&self) -> OpportunityScope {
        OpportunityScope::new(self.tenant_id.as_str(), self.opportunity_id.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SupplierPath {
    tenant_id: String,
    opportunity_id: String,
    supplier_id: String,
}

impl SupplierPath {
    fn scope(&self) -> OpportunityScope {
        OpportunityScope::new(self.tenant_id.as_str(), self.opportunity_id.as_str())
    }

    fn supplier(&self) -> SupplierId {
        SupplierId(self.supplier_id.clone())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RequirementPath {
    tenant_id: String,
    opportunity_id: String,
    supplier_id: String,
    requirement_id: String,
}

/// Query string for matrix reads; filters mirror [`MatrixFilter`].
#[derive(Debug, Default, Deserialize)]
pub(crate) struct MatrixQuery {
    #[serde(default)]
    force_recompute: bool,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    only_differentiators: bool,
    #[serde(default)]
    only_failed_or_partial: bool,
    #[serde(default)]
    search: Option<String>,
}

impl MatrixQuery {
    fn filter(&self) -> MatrixFilter {
        MatrixFilter {
            category: self.category.clone(),
            only_differentiators: self.only_differentiators,
            only_failed_or_partial: self.only_failed_or_partial,
            search_term: self.search.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OverrideRequest {
    score: f64,
    reason: String,
    actor_id: String,
}

pub(crate) async fn comparison_handler<R>(
    State(service): State<Arc<ScoringService<R>>>,
    Path(path): Path<OpportunityPath>,
) -> Response
where
    R: ScoringRepository + 'static,
{
    match service.run_comparison(&path.scope()) {
        Ok(breakdowns) => (StatusCode::OK, axum::Json(breakdowns)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn matrix_handler<R>(
    State(service): State<Arc<ScoringService<R>>>,
    Path(path): Path<OpportunityPath>,
    Query(query): Query<MatrixQuery>,
) -> Response
where
    R: ScoringRepository + 'static,
{
    match service.scoring_matrix_view(&path.scope(), query.force_recompute, &query.filter()) {
        Ok(matrix) => (StatusCode::OK, axum::Json(matrix)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn export_handler<R>(
    State(service): State<Arc<ScoringService<R>>>,
    Path(path): Path<OpportunityPath>,
    Query(query): Query<MatrixQuery>,
) -> Response
where
    R: ScoringRepository + 'static,
{
    match service.export_scoring_matrix(&path.scope(), &query.filter()) {
        Ok(csv) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            csv,
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn apply_override_handler<R>(
    State(service): State<Arc<ScoringService<R>>>,
    Path(path): Path<RequirementPath>,
    axum::Json(request): axum::Json<OverrideRequest>,
) -> Response
where
    R: ScoringRepository + 'static,
{
    let scope = OpportunityScope::new(path.tenant_id, path.opportunity_id);
    match service.apply_override(
        &scope,
        &SupplierId(path.supplier_id),
        &RequirementId(path.requirement_id),
        request.score,
        &request.reason,
        &ActorId(request.actor_id),
    ) {
        Ok(score) => (StatusCode::OK, axum::Json(score)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn clear_override_handler<R>(
    State(service): State<Arc<ScoringService<R>>>,
    Path(path): Path<RequirementPath>,
) -> Response
where
    R: ScoringRepository + 'static,
{
    let scope = OpportunityScope::new(path.tenant_id, path.opportunity_id);
    match service.clear_override(
        &scope,
        &SupplierId(path.supplier_id),
        &RequirementId(path.requirement_id),
    ) {
        Ok(score) => (StatusCode::OK, axum::Json(score)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn regenerate_handler<R>(
    State(service): State<Arc<ScoringService<R>>>,
    Path(path): Path<SupplierPath>,
) -> Response
where
    R: ScoringRepository + 'static,
{
    match service.regenerate_scores(&path.scope(), &path.supplier()) {
        Ok(scores) => (StatusCode::OK, axum::Json(scores)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn scoring_items_handler<R>(
    State(service): State<Arc<ScoringService<R>>>,
    Path(path): Path<SupplierPath>,
) -> Response
where
    R: ScoringRepository + 'static,
{
    match service.scoring_items(&path.scope(), &path.supplier()) {
        Ok(items) => (StatusCode::OK, axum::Json(items)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn readiness_handler<R>(
    State(service): State<Arc<ScoringService<R>>>,
    Path(path): Path<SupplierPath>,
) -> Response
where
    R: ScoringRepository + 'static,
{
    match service.classify_readiness(&path.scope(), &path.supplier()) {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn readiness_batch_handler<R>(
    State(service): State<Arc<ScoringService<R>>>,
    Path(path): Path<OpportunityPath>,
) -> Response
where
    R: ScoringRepository + 'static,
{
    match service.classify_readiness_batch(&path.scope()) {
        Ok(batch) => (StatusCode::OK, axum::Json(batch)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Map engine errors onto status codes; "no data" is an empty state, not a failure.
pub(crate) fn error_response(err: ScoringError) -> Response {
    let (status, payload) = match &err {
        ScoringError::NoData(detail) => (
            StatusCode::OK,
            json!({
                "status": "no_data",
                "detail": detail,
            }),
        ),
        ScoringError::Validation(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": err.to_string() }),
        ),
        ScoringError::NotFound { kind, id } => (
            StatusCode::NOT_FOUND,
            json!({
                "error": err.to_string(),
                "kind": kind,
                "id": id,
            }),
        ),
        ScoringError::ConcurrencyConflict(_) => (
            StatusCode::CONFLICT,
            json!({
                "error": err.to_string(),
                "retry": true,
            }),
        ),
        ScoringError::Export(_) | ScoringError::Repository(_) => {
            tracing::error!(error = %err, "scoring request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": err.to_string() }),
            )
        }
    };
    (status, axum::Json(payload)).into_response()
}
