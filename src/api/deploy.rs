//! Deploy endpoint
//!
//! POST /api/deploy
//!
//! Always answers 200 with a `ProvisionResult`; callers inspect `status` to
//! learn whether a service was created. An unreadable body is reported as an
//! `invalid_request` failure with no attempts.

use axum::{body::Bytes, extract::State, Json};

use crate::schemas::deploy::{FailureReason, ProvisionFailure, ProvisionResult, ServiceRequest};
use crate::server::state::AppState;

pub async fn deploy(State(state): State<AppState>, body: Bytes) -> Json<ProvisionResult> {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(failure) => {
            tracing::warn!(error = %failure.last_error, "Deploy request rejected");
            return Json(ProvisionResult::Failure(failure));
        }
    };

    tracing::info!(
        repository = %request.repository_url,
        env_count = request.environment_variables.len(),
        "Deploy requested"
    );

    Json(state.dispatcher.dispatch(request).await)
}

/// An empty body is a request for the default repository with no variables
fn parse_request(body: &[u8]) -> Result<ServiceRequest, ProvisionFailure> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ServiceRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        ProvisionFailure::new(
            FailureReason::InvalidRequest,
            format!("Malformed deploy request: {}", e),
            0,
        )
    })
}
