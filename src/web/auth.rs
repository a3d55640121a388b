use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::{Config, Permission};
use crate::monitor::{LocationMonitor, RemoteSensor};
use crate::notify::NotificationCenter;
use crate::store::Storage;
use crate::web::api::error::ErrorResponse;

#[derive(Clone)]
pub struct AuthenticatedUser {
    pub name: String,
    pub permissions: HashSet<Permission>,
}

impl AuthenticatedUser {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<Storage>,
    pub monitor: Arc<Mutex<LocationMonitor<RemoteSensor>>>,
    pub notifications: NotificationCenter,
}

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidFormat,
    InvalidKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingAuth => "Missing Authorization header",
            AuthError::InvalidFormat => "Invalid Authorization format",
            AuthError::InvalidKey => "Invalid API key",
        };
        (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(message))).into_response()
    }
}

#[derive(Debug)]
pub struct PermissionError;

impl IntoResponse for PermissionError {
    fn into_response(self) -> Response {
        (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new("Insufficient permissions")),
        )
            .into_response()
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(&state.config, parts)
    }
}

fn authenticate(config: &Config, parts: &Parts) -> Result<AuthenticatedUser, AuthError> {
    let auth_header = parts
        .headers
        .get("Authorization")
        .ok_or(AuthError::MissingAuth)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat)?;

    let key = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat)?;

    let api_key = config.find_api_key(key).ok_or(AuthError::InvalidKey)?;

    Ok(AuthenticatedUser {
        name: api_key.name.clone(),
        permissions: api_key.permissions.clone(),
    })
}

pub fn require_permission(
    user: &AuthenticatedUser,
    permission: Permission,
) -> Result<(), PermissionError> {
    if user.has_permission(permission) {
        Ok(())
    } else {
        log::warn!("{} lacks {:?} permission", user.name, permission);
        Err(PermissionError)
    }
}
