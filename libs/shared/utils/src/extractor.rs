use std::sync::Arc;

use axum::{
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
    body::Body,
};

use shared_models::auth::User;
use shared_models::error::ApiError;
use shared_config::AppConfig;

use crate::jwt::validate_token;

// Middleware for authentication
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .ok_or_else(|| ApiError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| ApiError::Auth("Invalid authorization header format".to_string()))?;

    if !auth_value.starts_with("Bearer ") {
        return Err(ApiError::Auth("Invalid authorization header format".to_string()));
    }

    let token = &auth_value[7..];

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(ApiError::Auth)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Tenant capability check, performed once per operation before the core
/// logic runs. The entity's company is compared against the actor's claim;
/// admins bypass the check.
pub fn ensure_same_company(user: &User, entity_company_id: &str) -> Result<(), ApiError> {
    if user.role.as_deref() == Some("admin") {
        return Ok(());
    }

    match user.company_id.as_deref() {
        Some(company_id) if company_id == entity_company_id => Ok(()),
        _ => Err(ApiError::Forbidden(
            "Not authorized to access resources of another company".to_string(),
        )),
    }
}
