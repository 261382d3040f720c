use axum::{
    extract::{Path, State},
    Extension, Json,
};
use churnwatch_analysis::Dashboard;

use crate::middleware::RequestId;

use super::{map_analysis_error, ApiError, ApiResponse, AppState};

/// Latest completed analysis for a product; a defaulted payload when there
/// is none yet.
pub(super) async fn get_dashboard(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(product_name): Path<String>,
) -> Result<Json<ApiResponse<Dashboard>>, ApiError> {
    let dashboard = state
        .orchestrator()
        .dashboard(&product_name)
        .await
        .map_err(|e| map_analysis_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(dashboard, req_id.0)))
}
