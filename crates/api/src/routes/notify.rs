//! Notification dispatch routes, one per audience scope.
//!
//! Every handler answers with the per-recipient acceptance results once all
//! jobs are enqueued. Delivery itself happens later; poll `/messages/{id}`.

use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;

use herald_common::error::AppError;
use herald_common::types::PerRecipientResult;
use herald_delivery::{Audience, DispatchRequest};

use crate::state::AppState;

pub const CLIENT_ID_HEADER: &str = "x-client-id";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/{id}", post(notify_user))
        .route("/spaces/{id}", post(notify_space))
        .route("/organizations/{id}", post(notify_organization))
        .route("/everyone", post(notify_everyone))
        .route("/uaa_scopes/{scope}", post(notify_scope))
        .route("/emails", post(notify_email))
}

/// Identity of the calling client, set by the authenticating proxy.
#[derive(Debug, Clone)]
pub struct ClientId(pub String);

impl<S> FromRequestParts<S> for ClientId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(CLIENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| ClientId(v.to_string()))
            .ok_or_else(|| AppError::Auth("Missing X-Client-Id header".to_string()))
    }
}

/// Request body shared by every notify route.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyParams {
    pub kind_id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub reply_to: Option<String>,
    /// Destination address, `/emails` only.
    #[serde(default)]
    pub to: Option<String>,
}

impl NotifyParams {
    fn validate(&self) -> Result<(), AppError> {
        if self.kind_id.trim().is_empty() {
            return Err(AppError::Validation("kind_id is required".to_string()));
        }
        if self.text.is_empty() && self.html.is_empty() {
            return Err(AppError::Validation(
                "text or html must be provided".to_string(),
            ));
        }
        Ok(())
    }

    fn into_request(self, client_id: String, audience: Audience) -> DispatchRequest {
        DispatchRequest {
            client_id,
            kind_id: self.kind_id,
            audience,
            subject: self.subject,
            text: self.text,
            html: self.html,
            reply_to: self.reply_to.filter(|r| !r.trim().is_empty()),
        }
    }
}

async fn dispatch(
    state: &AppState,
    client_id: String,
    audience: Audience,
    params: NotifyParams,
) -> Result<Json<Vec<PerRecipientResult>>, AppError> {
    params.validate()?;
    let request = params.into_request(client_id, audience);
    let results = state.system.dispatch(&request).await?;
    Ok(Json(results))
}

/// POST /users/:id - Notify a single user.
async fn notify_user(
    State(state): State<AppState>,
    ClientId(client_id): ClientId,
    Path(id): Path<String>,
    Json(params): Json<NotifyParams>,
) -> Result<Json<Vec<PerRecipientResult>>, AppError> {
    dispatch(&state, client_id, Audience::User(id), params).await
}

/// POST /spaces/:id - Notify every member of a space.
async fn notify_space(
    State(state): State<AppState>,
    ClientId(client_id): ClientId,
    Path(id): Path<String>,
    Json(params): Json<NotifyParams>,
) -> Result<Json<Vec<PerRecipientResult>>, AppError> {
    dispatch(&state, client_id, Audience::Space(id), params).await
}

/// POST /organizations/:id - Notify every member of an organization.
async fn notify_organization(
    State(state): State<AppState>,
    ClientId(client_id): ClientId,
    Path(id): Path<String>,
    Json(params): Json<NotifyParams>,
) -> Result<Json<Vec<PerRecipientResult>>, AppError> {
    dispatch(&state, client_id, Audience::Organization(id), params).await
}

/// POST /everyone - Notify every user known to the identity provider.
async fn notify_everyone(
    State(state): State<AppState>,
    ClientId(client_id): ClientId,
    Json(params): Json<NotifyParams>,
) -> Result<Json<Vec<PerRecipientResult>>, AppError> {
    dispatch(&state, client_id, Audience::Everyone, params).await
}

/// POST /uaa_scopes/:scope - Notify every user holding a scope.
async fn notify_scope(
    State(state): State<AppState>,
    ClientId(client_id): ClientId,
    Path(scope): Path<String>,
    Json(params): Json<NotifyParams>,
) -> Result<Json<Vec<PerRecipientResult>>, AppError> {
    dispatch(&state, client_id, Audience::UaaScope(scope), params).await
}

/// POST /emails - Notify a literal email address.
async fn notify_email(
    State(state): State<AppState>,
    ClientId(client_id): ClientId,
    Json(params): Json<NotifyParams>,
) -> Result<Json<Vec<PerRecipientResult>>, AppError> {
    let to = params
        .to
        .as_deref()
        .map(str::trim)
        .filter(|to| !to.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation("to is required".to_string()))?;

    dispatch(&state, client_id, Audience::Email(to), params).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> NotifyParams {
        NotifyParams {
            kind_id: "disk-alert".to_string(),
            subject: "Disk".to_string(),
            text: "95%".to_string(),
            html: String::new(),
            reply_to: Some("  ".to_string()),
            to: None,
        }
    }

    #[test]
    fn test_validate() {
        assert!(params().validate().is_ok());

        let mut missing_kind = params();
        missing_kind.kind_id = " ".to_string();
        assert!(matches!(
            missing_kind.validate(),
            Err(AppError::Validation(_))
        ));

        let mut no_body = params();
        no_body.text.clear();
        assert!(matches!(no_body.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_into_request_drops_blank_reply_to() {
        let request = params().into_request("monitoring".to_string(), Audience::Everyone);
        assert_eq!(request.client_id, "monitoring");
        assert_eq!(request.kind_id, "disk-alert");
        assert_eq!(request.reply_to, None);
    }
}
