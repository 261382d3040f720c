use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use churnwatch_analysis::{JobSnapshot, Spike, SubmittedJob};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_analysis_error, map_store_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct SubmitAnalysisRequest {
    pub product_name: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SpikeCheckItem {
    pub job_id: i64,
    /// `spike_detected` or `no_change`.
    pub status: &'static str,
    pub spike: Option<Spike>,
    pub notified: usize,
    pub failed_notifications: usize,
}

pub(super) async fn submit_analysis(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<SubmitAnalysisRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SubmittedJob>>), ApiError> {
    let submitted = state
        .executor
        .submit(&body.product_name)
        .await
        .map_err(|e| map_analysis_error(req_id.0.clone(), &e))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(submitted, req_id.0)),
    ))
}

pub(super) async fn get_analysis(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<i64>,
) -> Result<Json<ApiResponse<JobSnapshot>>, ApiError> {
    let snapshot = state
        .orchestrator()
        .get_status(job_id)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "analysis job not found"))?;

    Ok(Json(ApiResponse::new(snapshot, req_id.0)))
}

pub(super) async fn check_spike(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(job_id): Path<i64>,
) -> Result<Json<ApiResponse<SpikeCheckItem>>, ApiError> {
    let check = state
        .orchestrator()
        .check_spike(job_id)
        .await
        .map_err(|e| map_analysis_error(req_id.0.clone(), &e))?;

    let item = SpikeCheckItem {
        job_id: check.job_id,
        status: if check.spike.is_some() {
            "spike_detected"
        } else {
            "no_change"
        },
        spike: check.spike,
        notified: check.notified,
        failed_notifications: check.failed_notifications,
    };

    Ok(Json(ApiResponse::new(item, req_id.0)))
}
