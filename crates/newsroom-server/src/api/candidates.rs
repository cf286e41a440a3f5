use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use newsroom_core::CandidateStatus;
use newsroom_db::{CandidateFilter, CandidateRow};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{
    map_db_error, normalize_limit, require_publication, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

const MAX_BULK_IDS: usize = 500;

#[derive(Debug, Deserialize)]
pub(super) struct CandidatesQuery {
    pub status: Option<String>,
    pub min_score: Option<f64>,
    pub limit: Option<i64>,
    pub source_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct StatusUpdate {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct BulkStatusUpdate {
    pub ids: Vec<i64>,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub(super) struct CandidateItem {
    id: i64,
    source_id: Option<i64>,
    url: String,
    title: Option<String>,
    snippet: Option<String>,
    author: Option<String>,
    published_date: Option<DateTime<Utc>>,
    keyword_score: f64,
    recency_score: f64,
    source_weight: f64,
    relevance_score: f64,
    status: String,
    extra_metadata: serde_json::Value,
    discovered_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct BulkUpdateResult {
    updated: u64,
    status: CandidateStatus,
}

impl From<CandidateRow> for CandidateItem {
    fn from(row: CandidateRow) -> Self {
        Self {
            id: row.id,
            source_id: row.source_id,
            url: row.url,
            title: row.title,
            snippet: row.snippet,
            author: row.author,
            published_date: row.published_date,
            keyword_score: row.keyword_score,
            recency_score: row.recency_score,
            source_weight: row.source_weight,
            relevance_score: row.relevance_score,
            status: row.status,
            extra_metadata: row.extra_metadata,
            discovered_at: row.discovered_at,
        }
    }
}

fn parse_status(request_id: &str, raw: &str) -> Result<CandidateStatus, ApiError> {
    raw.parse::<CandidateStatus>()
        .map_err(|message| ApiError::new(request_id, "validation_error", message))
}

/// Status shown when the caller does not ask for one: publications under
/// editorial review expose `selected` candidates, others expose `new`.
pub(super) fn default_status(review_mode: bool) -> CandidateStatus {
    if review_mode {
        CandidateStatus::Selected
    } else {
        CandidateStatus::New
    }
}

pub(super) async fn list_candidates(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(publication_id): Path<i64>,
    Query(query): Query<CandidatesQuery>,
) -> Result<Json<ApiResponse<Vec<CandidateItem>>>, ApiError> {
    let requested = query
        .status
        .as_deref()
        .map(|raw| parse_status(&req_id.0, raw))
        .transpose()?;
    if query.min_score.is_some_and(|s| !s.is_finite()) {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "min_score must be a finite number",
        ));
    }

    let publication = require_publication(&state, &req_id.0, publication_id).await?;
    let filter = CandidateFilter {
        publication_id,
        status: Some(requested.unwrap_or_else(|| default_status(publication.review_mode))),
        min_score: query.min_score,
        source_id: query.source_id,
        limit: normalize_limit(query.limit),
    };

    let rows = newsroom_db::list_candidates(&state.pool, &filter)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(CandidateItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn update_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((publication_id, candidate_id)): Path<(i64, i64)>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<ApiResponse<CandidateItem>>, ApiError> {
    let status = parse_status(&req_id.0, &body.status)?;

    let row = newsroom_db::update_candidate_status(&state.pool, publication_id, candidate_id, status)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(
        publication_id,
        candidate_id,
        status = status.as_str(),
        "candidate status updated"
    );

    Ok(Json(ApiResponse {
        data: CandidateItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn bulk_update_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(publication_id): Path<i64>,
    Json(body): Json<BulkStatusUpdate>,
) -> Result<Json<ApiResponse<BulkUpdateResult>>, ApiError> {
    let status = parse_status(&req_id.0, &body.status)?;
    if body.ids.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "ids must not be empty",
        ));
    }
    if body.ids.len() > MAX_BULK_IDS {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            format!("at most {MAX_BULK_IDS} ids per request"),
        ));
    }

    let updated =
        newsroom_db::bulk_update_candidate_status(&state.pool, publication_id, &body.ids, status)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(
        publication_id,
        requested = body.ids.len(),
        updated,
        status = status.as_str(),
        "bulk candidate status update"
    );

    Ok(Json(ApiResponse {
        data: BulkUpdateResult { updated, status },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_mode_selects_default_status() {
        assert_eq!(default_status(true), CandidateStatus::Selected);
        assert_eq!(default_status(false), CandidateStatus::New);
    }

    #[test]
    fn candidate_item_is_serializable() {
        let item = CandidateItem {
            id: 9,
            source_id: Some(2),
            url: "https://wire.example/markets/wheat".to_string(),
            title: Some("Wheat exports climb".to_string()),
            snippet: None,
            author: None,
            published_date: Some(Utc::now()),
            keyword_score: 100.0,
            recency_score: 100.0,
            source_weight: 1.0,
            relevance_score: 100.0,
            status: "new".to_string(),
            extra_metadata: serde_json::json!({ "triage_verdict": "relevant" }),
            discovered_at: Utc::now(),
        };

        let json = serde_json::to_string(&item).expect("serialize candidate");
        assert!(json.contains("\"relevance_score\":100.0"));
        assert!(json.contains("\"triage_verdict\":\"relevant\""));
    }

    #[test]
    fn bulk_result_serializes_status_lowercase() {
        let json = serde_json::to_value(BulkUpdateResult {
            updated: 3,
            status: CandidateStatus::Rejected,
        })
        .expect("serialize");
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["updated"], 3);
    }

    #[test]
    fn parse_status_rejects_unknown_values() {
        let err = parse_status("req-1", "archived").expect_err("unknown status");
        assert_eq!(err.error.code, "validation_error");
    }
}
