// libs/appointment-cell/src/services/booking.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;
use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentGroupWithMembers, AppointmentSearchQuery,
    AppointmentStatus, AppointmentWithDetails, BookingSource, CancelAppointmentRequest,
    CreateAppointmentDetailRequest, CreateAppointmentGroupRequest, CreateAppointmentRequest,
    RatingAppointmentRequest, RescheduleAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::lifecycle::AppointmentLifecycleService;

const MAX_CANCEL_REASON_CHARS: usize = 1000;
const MIN_GROUP_MEMBERS: usize = 2;
const MAX_GROUP_MEMBERS: usize = 50;

pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    lifecycle_service: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            lifecycle_service: AppointmentLifecycleService::new(),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            supabase,
            lifecycle_service: AppointmentLifecycleService::new(),
        }
    }

    /// Create an appointment with its details in one transaction.
    pub async fn create_appointment(
        &self,
        company_id: Uuid,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<AppointmentWithDetails, AppointmentError> {
        info!("Creating appointment for customer {} at location {}",
              request.customer_id, request.location_id);

        validate_create_request(&request, BookingSource::ALL_SOURCES)?;

        let appointment_id = Uuid::new_v4();
        let now = Utc::now();

        let details: Vec<Value> = request.details.iter()
            .map(|detail| detail_row(appointment_id, detail, now))
            .collect();

        let args = json!({
            "appointment": {
                "id": appointment_id,
                "company_id": company_id,
                "customer_id": request.customer_id,
                "location_id": request.location_id,
                "group_id": null,
                "status": AppointmentStatus::New.to_string(),
                "date": request.date.to_rfc3339(),
                "is_primary": request.is_primary.unwrap_or(true),
                "booking_source": request.booking_source.to_string(),
                "created_at": now.to_rfc3339(),
                "updated_at": now.to_rfc3339()
            },
            "details": details
        });

        let created: Value = self.supabase
            .rpc("create_appointment", auth_token, args)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let appointment = parse_appointment_with_details(created)?;
        info!("Appointment {} created with {} details",
              appointment.appointment.id, appointment.details.len());

        Ok(appointment)
    }

    /// Create a batch of appointments sharing one date and location.
    /// Exactly one member must be primary.
    pub async fn create_appointment_group(
        &self,
        company_id: Uuid,
        request: CreateAppointmentGroupRequest,
        auth_token: &str,
    ) -> Result<AppointmentGroupWithMembers, AppointmentError> {
        info!("Creating appointment group at location {} with {} members",
              request.location_id, request.appointments.len());

        validate_group_request(&request)?;

        let group_id = Uuid::new_v4();
        let now = Utc::now();

        let mut appointments = Vec::with_capacity(request.appointments.len());
        for member in &request.appointments {
            let appointment_id = Uuid::new_v4();
            let details: Vec<Value> = member.details.iter()
                .map(|detail| detail_row(appointment_id, detail, now))
                .collect();

            appointments.push(json!({
                "appointment": {
                    "id": appointment_id,
                    "company_id": company_id,
                    "customer_id": member.customer_id,
                    "location_id": request.location_id,
                    "group_id": group_id,
                    "status": AppointmentStatus::New.to_string(),
                    "date": member.date.to_rfc3339(),
                    "is_primary": member.is_primary.unwrap_or(false),
                    "booking_source": request.booking_source.to_string(),
                    "created_at": now.to_rfc3339(),
                    "updated_at": now.to_rfc3339()
                },
                "details": details
            }));
        }

        let args = json!({
            "group": {
                "id": group_id,
                "company_id": company_id,
                "location_id": request.location_id,
                "date": request.date.to_rfc3339(),
                "created_at": now.to_rfc3339(),
                "updated_at": now.to_rfc3339()
            },
            "appointments": appointments
        });

        let created: Value = self.supabase
            .rpc("create_appointment_group", auth_token, args)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let group = parse_group_with_members(created)?;
        info!("Appointment group {} created", group.group.id);

        Ok(group)
    }

    /// Get appointment by ID; soft-deleted rows are invisible.
    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&deleted_at=is.null",
            appointment_id
        );
        let result: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    /// Change appointment status, rejecting transitions outside the
    /// allow-matrix.
    pub async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;

        // Reverting to `new` is a re-booking move, only valid after a no-show.
        if new_status == AppointmentStatus::New && current.status != AppointmentStatus::NoShow {
            return Err(AppointmentError::ValidationError(
                "Appointment cannot revert to new unless it was marked no_show".to_string(),
            ));
        }

        self.lifecycle_service
            .validate_status_transition(current.status, new_status)?;

        let updated = self.patch_appointment(
            appointment_id,
            json!({
                "status": new_status.to_string(),
                "updated_at": Utc::now().to_rfc3339()
            }),
            auth_token,
        ).await?;

        info!("Appointment {} status {} -> {}", appointment_id, current.status, new_status);
        Ok(updated)
    }

    /// Partial update: date change plus nested add/update/delete of details
    /// and nested new sibling appointments, all in one transaction. Changing
    /// the owning customer is a business-rule violation.
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<AppointmentWithDetails, AppointmentError> {
        debug!("Updating appointment: {}", appointment_id);

        let current = self.get_appointment(appointment_id, auth_token).await?;

        if let Some(customer_id) = request.customer_id {
            if customer_id != current.customer_id {
                warn!("Rejected customer change on appointment {}", appointment_id);
                return Err(AppointmentError::CustomerChangeNotAllowed);
            }
        }

        for detail in &request.create_details {
            validate_detail(detail)?;
        }
        for patch in &request.update_details {
            if let Some(ref staff_ids) = patch.staff_ids {
                if staff_ids.is_empty() {
                    return Err(AppointmentError::ValidationError(
                        "Appointment detail requires at least one staff".to_string(),
                    ));
                }
            }
            if let Some(duration) = patch.duration_minutes {
                if duration <= 0 {
                    return Err(AppointmentError::ValidationError(
                        "Appointment detail duration must be a positive integer".to_string(),
                    ));
                }
            }
        }
        for sibling in &request.create_appointments {
            validate_create_request(sibling, BookingSource::ALL_SOURCES)?;
        }

        let now = Utc::now();
        let new_details: Vec<Value> = request.create_details.iter()
            .map(|detail| detail_row(appointment_id, detail, now))
            .collect();

        let mut siblings = Vec::with_capacity(request.create_appointments.len());
        for member in &request.create_appointments {
            let sibling_id = Uuid::new_v4();
            let details: Vec<Value> = member.details.iter()
                .map(|detail| detail_row(sibling_id, detail, now))
                .collect();

            siblings.push(json!({
                "appointment": {
                    "id": sibling_id,
                    "company_id": current.company_id,
                    "customer_id": member.customer_id,
                    "location_id": member.location_id,
                    "group_id": current.group_id,
                    "status": AppointmentStatus::New.to_string(),
                    "date": member.date.to_rfc3339(),
                    "is_primary": member.is_primary.unwrap_or(false),
                    "booking_source": member.booking_source.to_string(),
                    "created_at": now.to_rfc3339(),
                    "updated_at": now.to_rfc3339()
                },
                "details": details
            }));
        }

        let args = json!({
            "appointment_id": appointment_id,
            "set": {
                "date": request.date.map(|d| d.to_rfc3339()),
                "updated_at": now.to_rfc3339()
            },
            "create_details": new_details,
            "update_details": request.update_details,
            "delete_details": request.delete_details,
            "create_appointments": siblings
        });

        let updated: Value = self.supabase
            .rpc("update_appointment", auth_token, args)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let appointment = parse_appointment_with_details(updated)?;
        info!("Appointment {} updated", appointment_id);

        Ok(appointment)
    }

    /// Cancel with a mandatory audit reason.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment: {}", appointment_id);

        validate_cancel_reason(&request.cancel_reason)?;

        let current = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle_service
            .validate_status_transition(current.status, AppointmentStatus::Cancel)?;

        let cancelled = self.patch_appointment(
            appointment_id,
            json!({
                "status": AppointmentStatus::Cancel.to_string(),
                "cancel_reason": request.cancel_reason,
                "updated_at": Utc::now().to_rfc3339()
            }),
            auth_token,
        ).await?;

        info!("Appointment {} cancelled", appointment_id);
        Ok(cancelled)
    }

    /// Move the appointment in time without touching its status.
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Rescheduling appointment: {}", appointment_id);

        // Existence check before the write.
        self.get_appointment(appointment_id, auth_token).await?;

        let rescheduled = self.patch_appointment(
            appointment_id,
            json!({
                "date": request.new_date.to_rfc3339(),
                "updated_at": Utc::now().to_rfc3339()
            }),
            auth_token,
        ).await?;

        info!("Appointment {} rescheduled to {}", appointment_id, request.new_date);
        Ok(rescheduled)
    }

    /// Record a customer rating; only completed appointments are ratable.
    pub async fn rating_appointment(
        &self,
        appointment_id: Uuid,
        request: RatingAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        validate_rating(request.number_rating)?;

        let current = self.get_appointment(appointment_id, auth_token).await?;
        if current.status != AppointmentStatus::Completed {
            return Err(AppointmentError::ValidationError(
                "Only completed appointments can be rated".to_string(),
            ));
        }

        let rated = self.patch_appointment(
            appointment_id,
            json!({
                "number_rating": request.number_rating,
                "content_review": request.content_review,
                "updated_at": Utc::now().to_rfc3339()
            }),
            auth_token,
        ).await?;

        info!("Appointment {} rated {}", appointment_id, request.number_rating);
        Ok(rated)
    }

    /// Soft delete: the row keeps its audit trail, lookups stop seeing it.
    pub async fn delete_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        self.get_appointment(appointment_id, auth_token).await?;

        self.patch_appointment(
            appointment_id,
            json!({
                "deleted_at": Utc::now().to_rfc3339(),
                "updated_at": Utc::now().to_rfc3339()
            }),
            auth_token,
        ).await?;

        info!("Appointment {} soft-deleted", appointment_id);
        Ok(())
    }

    /// Search appointments with filters. A company scope, when given, is
    /// forced into the query so callers can never read across tenants.
    pub async fn search_appointments(
        &self,
        company_scope: Option<Uuid>,
        query: AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Searching appointments with filters: {:?}", query);

        let mut query_parts = vec!["deleted_at=is.null".to_string()];

        if let Some(company_id) = company_scope {
            query_parts.push(format!("company_id=eq.{}", company_id));
        }

        if let Some(customer_id) = query.customer_id {
            query_parts.push(format!("customer_id=eq.{}", customer_id));
        }
        if let Some(location_id) = query.location_id {
            query_parts.push(format!("location_id=eq.{}", location_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(booking_source) = query.booking_source {
            query_parts.push(format!("booking_source=eq.{}", booking_source));
        }
        if let Some(from_date) = query.from_date {
            // URL-encoded RFC3339 format for PostgREST
            let date_str = from_date.to_rfc3339();
            let encoded_date = urlencoding::encode(&date_str);
            query_parts.push(format!("date=gte.{}", encoded_date));
        }
        if let Some(to_date) = query.to_date {
            let date_str = to_date.to_rfc3339();
            let encoded_date = urlencoding::encode(&date_str);
            query_parts.push(format!("date=lte.{}", encoded_date));
        }

        let mut path = format!(
            "/rest/v1/appointments?{}&order=date.desc",
            query_parts.join("&")
        );

        if let Some(limit) = query.limit {
            path.push_str(&format!("&limit={}", limit));
        }
        if let Some(offset) = query.offset {
            path.push_str(&format!("&offset={}", offset));
        }

        let result: Vec<Value> = self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e)))
    }

    async fn patch_appointment(
        &self,
        appointment_id: Uuid,
        body: Value,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let filter = format!("id=eq.{}", appointment_id);
        let result = self.supabase
            .update_returning("appointments", &filter, auth_token, body)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }
}

impl BookingSource {
    pub const ALL_SOURCES: &'static [BookingSource] = &[
        BookingSource::Scheduled,
        BookingSource::WalkIn,
        BookingSource::Marketplace,
    ];

    /// Walk-ins are booked singly at the desk, never as a group batch.
    pub const GROUP_SOURCES: &'static [BookingSource] =
        &[BookingSource::Scheduled, BookingSource::Marketplace];
}

// ==============================================================================
// VALIDATION
// ==============================================================================

pub fn validate_create_request(
    request: &CreateAppointmentRequest,
    allowed_sources: &[BookingSource],
) -> Result<(), AppointmentError> {
    if !allowed_sources.contains(&request.booking_source) {
        return Err(AppointmentError::InvalidBookingSource(
            request.booking_source.to_string(),
        ));
    }

    if request.details.is_empty() {
        return Err(AppointmentError::ValidationError(
            "Appointment requires at least one detail".to_string(),
        ));
    }

    for detail in &request.details {
        validate_detail(detail)?;
    }

    Ok(())
}

pub fn validate_detail(detail: &CreateAppointmentDetailRequest) -> Result<(), AppointmentError> {
    if detail.staff_ids.is_empty() {
        return Err(AppointmentError::ValidationError(
            "Appointment detail requires at least one staff".to_string(),
        ));
    }
    if detail.duration_minutes <= 0 {
        return Err(AppointmentError::ValidationError(
            "Appointment detail duration must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_group_request(
    request: &CreateAppointmentGroupRequest,
) -> Result<(), AppointmentError> {
    if !BookingSource::GROUP_SOURCES.contains(&request.booking_source) {
        return Err(AppointmentError::InvalidBookingSource(
            request.booking_source.to_string(),
        ));
    }

    let member_count = request.appointments.len();
    if !(MIN_GROUP_MEMBERS..=MAX_GROUP_MEMBERS).contains(&member_count) {
        return Err(AppointmentError::ValidationError(format!(
            "Appointment group requires between {} and {} members, got {}",
            MIN_GROUP_MEMBERS, MAX_GROUP_MEMBERS, member_count
        )));
    }

    let primary_count = request.appointments.iter()
        .filter(|member| member.is_primary == Some(true))
        .count();
    if primary_count != 1 {
        return Err(AppointmentError::InvalidGroupPrimary { count: primary_count });
    }

    for member in &request.appointments {
        if member.details.is_empty() {
            return Err(AppointmentError::ValidationError(
                "Appointment requires at least one detail".to_string(),
            ));
        }
        for detail in &member.details {
            validate_detail(detail)?;
        }
    }

    Ok(())
}

pub fn validate_cancel_reason(reason: &str) -> Result<(), AppointmentError> {
    if reason.trim().is_empty() {
        return Err(AppointmentError::ValidationError(
            "Cancel reason is required".to_string(),
        ));
    }
    if reason.chars().count() > MAX_CANCEL_REASON_CHARS {
        return Err(AppointmentError::ValidationError(format!(
            "Cancel reason cannot exceed {} characters",
            MAX_CANCEL_REASON_CHARS
        )));
    }
    Ok(())
}

pub fn validate_rating(number_rating: i32) -> Result<(), AppointmentError> {
    if !(0..=5).contains(&number_rating) {
        return Err(AppointmentError::ValidationError(
            "Rating must be between 0 and 5".to_string(),
        ));
    }
    Ok(())
}

// ==============================================================================
// ROW / RESPONSE HELPERS
// ==============================================================================

fn detail_row(
    appointment_id: Uuid,
    detail: &CreateAppointmentDetailRequest,
    now: chrono::DateTime<Utc>,
) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "appointment_id": appointment_id,
        "service_id": detail.service_id,
        "staff_ids": detail.staff_ids,
        "resource_id": detail.resource_id,
        "start_time": detail.start_time.to_rfc3339(),
        "duration_minutes": detail.duration_minutes,
        "status": AppointmentStatus::New.to_string(),
        "created_at": now.to_rfc3339(),
        "updated_at": now.to_rfc3339()
    })
}

fn parse_appointment_with_details(value: Value) -> Result<AppointmentWithDetails, AppointmentError> {
    serde_json::from_value(value)
        .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
}

fn parse_group_with_members(value: Value) -> Result<AppointmentGroupWithMembers, AppointmentError> {
    serde_json::from_value(value)
        .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment group: {}", e)))
}
