//! `POST /token` and the OIDC discovery surface (spec.md §6).

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::signing::jwks::JwksDocument;
use crate::token_endpoint::{SignedCallerIdentityRequest, TokenResponse};
use crate::AppState;

/// The wire form of a [`SignedCallerIdentityRequest`] — the client
/// base64-encodes this JSON object into the OAuth `client_secret` field.
/// The exact transport encoding of the presigned request is left to the
/// caller by spec.md §1 (SigV4 verification is an external collaborator);
/// this is the concrete choice this crate makes at its HTTP boundary.
#[derive(Debug, Deserialize)]
struct SignedRequestEnvelope {
    method: String,
    url: String,
    #[serde(default)]
    headers: Vec<(String, String)>,
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
    pub resource: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenSuccessResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

impl From<TokenResponse> for TokenSuccessResponse {
    fn from(r: TokenResponse) -> Self {
        Self { access_token: r.access_token, token_type: r.token_type, expires_in: r.expires_in }
    }
}

pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenSuccessResponse>, AppError> {
    if req.grant_type != "client_credentials" {
        return Err(AppError::ValidationFailed {
            field: "grant_type".to_string(),
            reason: "only 'client_credentials' is supported".to_string(),
        });
    }

    let envelope_json = BASE64.decode(&req.client_secret).map_err(|e| AppError::ValidationFailed {
        field: "client_secret".to_string(),
        reason: format!("not valid base64: {e}"),
    })?;
    let envelope: SignedRequestEnvelope =
        serde_json::from_slice(&envelope_json).map_err(|e| AppError::ValidationFailed {
            field: "client_secret".to_string(),
            reason: format!("not a valid signed-request envelope: {e}"),
        })?;

    let signed_request = SignedCallerIdentityRequest {
        method: envelope.method,
        url: envelope.url,
        headers: envelope.headers,
        body: envelope.body.into_bytes(),
    };

    let response = state
        .token_endpoint
        .issue_token(
            &req.client_id,
            &signed_request,
            req.resource.as_deref(),
            req.scope.as_deref(),
            &state.config.aws_region,
        )
        .await?;

    Ok(Json(response.into()))
}

pub async fn jwks(State(state): State<Arc<AppState>>) -> Json<JwksDocument> {
    Json(state.jwks.document().clone())
}

pub async fn openid_configuration(State(state): State<Arc<AppState>>) -> Json<crate::signing::jwks::OidcDiscovery> {
    Json((*state.discovery).clone())
}
