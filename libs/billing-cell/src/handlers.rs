// libs/billing-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::ApiError;
use shared_utils::extractor::ensure_same_company;

use crate::models::{ApplyPaymentsRequest, BillingError};
use crate::services::reconciliation::PaymentReconciliationService;

fn map_billing_error(e: BillingError) -> ApiError {
    match e {
        BillingError::InvoiceNotFound => ApiError::NotFound(e.to_string()),
        BillingError::ValidationError(msg) => ApiError::Validation(msg),
        BillingError::DatabaseError(msg) => ApiError::Internal(msg),
    }
}

#[axum::debug_handler]
pub async fn get_invoice(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let token = auth.token();

    let reconciliation_service = PaymentReconciliationService::new(&state);

    let invoice = reconciliation_service
        .get_invoice(invoice_id, token)
        .await
        .map_err(map_billing_error)?;

    ensure_same_company(&user, &invoice.company_id.to_string())?;

    Ok(Json(json!({
        "success": true,
        "invoice": invoice
    })))
}

#[axum::debug_handler]
pub async fn apply_payments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<ApplyPaymentsRequest>,
) -> Result<Json<Value>, ApiError> {
    let token = auth.token();

    let reconciliation_service = PaymentReconciliationService::new(&state);

    let current = reconciliation_service
        .get_invoice(invoice_id, token)
        .await
        .map_err(map_billing_error)?;
    ensure_same_company(&user, &current.company_id.to_string())?;

    let invoice = reconciliation_service
        .apply_payments(invoice_id, &request.payment_methods, token)
        .await
        .map_err(map_billing_error)?;

    Ok(Json(json!({
        "success": true,
        "invoice": invoice
    })))
}
