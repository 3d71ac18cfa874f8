use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
};

use bakery_common::{Capability, EscalationCategory};
use bakery_escalation::ScanReport;

use crate::auth::StaffSession;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub async fn api_scan(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
    Path(category): Path<String>,
) -> ApiResult<Json<ScanReport>> {
    let category: EscalationCategory = category
        .parse()
        .map_err(|_| ApiError::not_found(format!("unknown escalation category: {category}")))?;

    let report = state.bakery.escalation.scan_as(&session.actor, category).await?;
    Ok(Json(report))
}

/// Every category in turn, as the scan loop does.
pub async fn api_scan_all(
    State(state): State<Arc<AppState>>,
    session: StaffSession,
) -> ApiResult<Json<Vec<ScanReport>>> {
    session.actor.require(Capability::TriggerEscalation)?;
    let reports = state.bakery.escalation.scan_all().await?;
    Ok(Json(reports))
}
