use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;

use crate::middleware::RequestId;
use crate::runner::spawn_run;

use super::{require_publication, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct ResearchAccepted {
    publication_id: i64,
    status: &'static str,
}

/// Start an on-demand research run. The run continues in the background;
/// progress is observed through the candidates it persists.
pub(super) async fn trigger_research(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(publication_id): Path<i64>,
) -> Result<(StatusCode, Json<ApiResponse<ResearchAccepted>>), ApiError> {
    let Some(claim) = state.runner.try_claim(publication_id) else {
        return Err(ApiError::new(
            req_id.0,
            "conflict",
            format!("research already running for publication {publication_id}"),
        ));
    };

    let publication = require_publication(&state, &req_id.0, publication_id).await?;
    if !publication.is_active {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            format!("publication {publication_id} is inactive"),
        ));
    }

    spawn_run(claim, "api");

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: ResearchAccepted {
                publication_id,
                status: "accepted",
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}
