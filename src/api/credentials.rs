//! Credential pool administration
//!
//! GET/POST/DELETE /api/credentials and PUT /api/settings. Tokens are never
//! returned in full.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::db::StoreDocument;
use crate::error::ApiError;
use crate::server::state::AppState;
use crate::services::credential_pool::{parse_credentials, MIN_OWNER_ID_LEN};

#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialView {
    pub token: String,
    pub owner_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PoolView {
    pub count: usize,
    pub credentials: Vec<CredentialView>,
    pub default_repository: String,
    pub default_owner: String,
}

#[derive(Debug, Deserialize)]
pub struct AddCredentialRequest {
    pub token: String,
    #[serde(default)]
    pub owner_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSettingsRequest {
    pub default_repository: Option<String>,
    pub default_owner: Option<String>,
}

fn pool_view(state: &AppState, doc: &StoreDocument) -> PoolView {
    let owner = state.dispatcher.fallback_owner(doc);
    let credentials: Vec<CredentialView> = parse_credentials(&doc.credentials, owner)
        .into_iter()
        .map(|record| CredentialView {
            token: record.masked_token(),
            owner_id: record.owner_id().to_string(),
        })
        .collect();

    PoolView {
        count: credentials.len(),
        credentials,
        default_repository: state.dispatcher.default_repository(doc).to_string(),
        default_owner: owner.to_string(),
    }
}

/// GET /api/credentials
pub async fn list_credentials(State(state): State<AppState>) -> Result<Json<PoolView>, ApiError> {
    let doc = state.store.load().await?;
    Ok(Json(pool_view(&state, &doc)))
}

/// POST /api/credentials
pub async fn add_credential(
    State(state): State<AppState>,
    Json(body): Json<AddCredentialRequest>,
) -> Result<(StatusCode, Json<PoolView>), ApiError> {
    let token = body.token.trim();
    if token.is_empty() {
        return Err(ApiError::InvalidRequest("token is required".into()));
    }
    if [token, body.owner_id.as_str()]
        .iter()
        .any(|field| field.contains(',') || field.contains('\n'))
    {
        return Err(ApiError::InvalidRequest(
            "token and owner_id may not contain commas or newlines".into(),
        ));
    }

    state.store.append_credential(token, body.owner_id.trim()).await?;
    tracing::info!(owner_id = %body.owner_id.trim(), "Credential added");

    let doc = state.store.load().await?;
    Ok((StatusCode::CREATED, Json(pool_view(&state, &doc))))
}

/// DELETE /api/credentials
pub async fn clear_credentials(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.store.clear_credentials().await?;
    tracing::warn!("Credential pool cleared");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/settings
pub async fn update_settings(
    State(state): State<AppState>,
    Json(body): Json<UpdateSettingsRequest>,
) -> Result<Json<PoolView>, ApiError> {
    if let Some(owner) = &body.default_owner {
        let owner = owner.trim();
        if !owner.is_empty() && owner.chars().count() < MIN_OWNER_ID_LEN {
            return Err(ApiError::InvalidRequest(format!(
                "default_owner must be at least {} characters",
                MIN_OWNER_ID_LEN
            )));
        }
        state.store.set_default_owner(owner).await?;
    }

    if let Some(repository) = &body.default_repository {
        state.store.set_default_repository(repository).await?;
    }

    let doc = state.store.load().await?;
    Ok(Json(pool_view(&state, &doc)))
}
