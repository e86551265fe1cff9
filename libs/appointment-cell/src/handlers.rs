// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::ApiError;
use shared_utils::extractor::ensure_same_company;

use crate::models::{
    AppointmentError, AppointmentSearchQuery, CancelAppointmentRequest,
    CreateAppointmentGroupRequest, CreateAppointmentRequest, RatingAppointmentRequest,
    RescheduleAppointmentRequest, UpdateAppointmentRequest, UpdateAppointmentStatusRequest,
};
use crate::services::availability::AvailabilityService;
use crate::services::booking::AppointmentBookingService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQueryParams {
    pub location_id: Uuid,
    pub date: NaiveDate,
    pub duration_minutes: u32,
}

// ==============================================================================
// HELPERS
// ==============================================================================

fn map_appointment_error(e: AppointmentError) -> ApiError {
    match e {
        AppointmentError::NotFound
        | AppointmentError::GroupNotFound
        | AppointmentError::LocationNotFound => ApiError::NotFound(e.to_string()),
        AppointmentError::InvalidGroupPrimary { .. } => ApiError::Conflict(e.to_string()),
        AppointmentError::InvalidStatusTransition { .. }
        | AppointmentError::InvalidBookingSource(_)
        | AppointmentError::CustomerChangeNotAllowed
        | AppointmentError::ValidationError(_) => ApiError::Validation(e.to_string()),
        AppointmentError::DatabaseError(msg) => ApiError::Internal(msg),
    }
}

fn actor_company_id(user: &User) -> Result<Uuid, ApiError> {
    let raw = user
        .company_id
        .as_deref()
        .ok_or_else(|| ApiError::Forbidden("Actor has no company scope".to_string()))?;

    raw.parse()
        .map_err(|_| ApiError::Forbidden("Actor company claim is not a valid id".to_string()))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, ApiError> {
    let token = auth.token();
    let company_id = actor_company_id(&user)?;

    let booking_service = AppointmentBookingService::new(&state);

    let created = booking_service
        .create_appointment(company_id, request, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": created.appointment,
        "details": created.details
    })))
}

#[axum::debug_handler]
pub async fn create_appointment_group(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentGroupRequest>,
) -> Result<Json<Value>, ApiError> {
    let token = auth.token();
    let company_id = actor_company_id(&user)?;

    let booking_service = AppointmentBookingService::new(&state);

    let created = booking_service
        .create_appointment_group(company_id, request, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "group": created.group,
        "appointments": created.appointments
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let token = auth.token();

    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_appointment_error)?;

    ensure_same_company(&user, &appointment.company_id.to_string())?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentSearchQuery>,
) -> Result<Json<Value>, ApiError> {
    let token = auth.token();

    // Admins search across companies, everyone else only within their own.
    let company_scope = if user.role.as_deref() == Some("admin") {
        None
    } else {
        Some(actor_company_id(&user)?)
    };

    let booking_service = AppointmentBookingService::new(&state);

    let appointments = booking_service
        .search_appointments(company_scope, query, token)
        .await
        .map_err(map_appointment_error)?;

    let count = appointments.len();

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
        "count": count
    })))
}

#[axum::debug_handler]
pub async fn staff_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(params): Query<AvailabilityQueryParams>,
) -> Result<Json<Value>, ApiError> {
    let token = auth.token();

    let availability_service = AvailabilityService::new(&state);

    let location_company = availability_service
        .location_company_id(params.location_id, token)
        .await
        .map_err(map_appointment_error)?;
    ensure_same_company(&user, &location_company.to_string())?;

    let slots = availability_service
        .staff_availability(params.location_id, params.date, params.duration_minutes, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "date": params.date,
        "slots": slots
    })))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, ApiError> {
    let token = auth.token();

    let booking_service = AppointmentBookingService::new(&state);

    let current = booking_service
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_appointment_error)?;
    ensure_same_company(&user, &current.company_id.to_string())?;

    let updated = booking_service
        .update_appointment(appointment_id, request, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated.appointment,
        "details": updated.details
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentStatusRequest>,
) -> Result<Json<Value>, ApiError> {
    let token = auth.token();

    let booking_service = AppointmentBookingService::new(&state);

    let current = booking_service
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_appointment_error)?;
    ensure_same_company(&user, &current.company_id.to_string())?;

    let updated = booking_service
        .update_appointment_status(appointment_id, request.status, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, ApiError> {
    let token = auth.token();

    let booking_service = AppointmentBookingService::new(&state);

    let current = booking_service
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_appointment_error)?;
    ensure_same_company(&user, &current.company_id.to_string())?;

    let rescheduled = booking_service
        .reschedule_appointment(appointment_id, request, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": rescheduled
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, ApiError> {
    let token = auth.token();

    let booking_service = AppointmentBookingService::new(&state);

    let current = booking_service
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_appointment_error)?;
    ensure_same_company(&user, &current.company_id.to_string())?;

    let cancelled = booking_service
        .cancel_appointment(appointment_id, request, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": cancelled,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn rating_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RatingAppointmentRequest>,
) -> Result<Json<Value>, ApiError> {
    let token = auth.token();

    let booking_service = AppointmentBookingService::new(&state);

    let current = booking_service
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_appointment_error)?;
    ensure_same_company(&user, &current.company_id.to_string())?;

    let rated = booking_service
        .rating_appointment(appointment_id, request, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": rated
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let token = auth.token();

    let booking_service = AppointmentBookingService::new(&state);

    let current = booking_service
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_appointment_error)?;
    ensure_same_company(&user, &current.company_id.to_string())?;

    booking_service
        .delete_appointment(appointment_id, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted"
    })))
}
