// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub company_id: Uuid,
    pub customer_id: Uuid,
    pub location_id: Uuid,
    pub group_id: Option<Uuid>,
    pub status: AppointmentStatus,
    pub date: DateTime<Utc>,
    pub is_primary: bool,
    pub booking_source: BookingSource,
    pub cancel_reason: Option<String>,
    pub number_rating: Option<i32>,
    pub content_review: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One service line-item within an appointment. Details live and die with
/// their appointment but are updatable independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDetail {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub service_id: Uuid,
    pub staff_ids: Vec<Uuid>,
    pub resource_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Batch of appointments booked together for one date and location.
/// Exactly one member carries `is_primary = true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentGroup {
    pub id: Uuid,
    pub company_id: Uuid,
    pub location_id: Uuid,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    New,
    Confirmed,
    Arrived,
    InService,
    Completed,
    Cancel,
    NoShow,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 7] = [
        AppointmentStatus::New,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Arrived,
        AppointmentStatus::InService,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancel,
        AppointmentStatus::NoShow,
    ];

    /// Row/column index into the transition matrix.
    pub fn index(self) -> usize {
        match self {
            AppointmentStatus::New => 0,
            AppointmentStatus::Confirmed => 1,
            AppointmentStatus::Arrived => 2,
            AppointmentStatus::InService => 3,
            AppointmentStatus::Completed => 4,
            AppointmentStatus::Cancel => 5,
            AppointmentStatus::NoShow => 6,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::New => write!(f, "new"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Arrived => write!(f, "arrived"),
            AppointmentStatus::InService => write!(f, "in_service"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancel => write!(f, "cancel"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingSource {
    Scheduled,
    WalkIn,
    Marketplace,
}

impl fmt::Display for BookingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingSource::Scheduled => write!(f, "scheduled"),
            BookingSource::WalkIn => write!(f, "walk_in"),
            BookingSource::Marketplace => write!(f, "marketplace"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentDetailRequest {
    pub service_id: Uuid,
    pub staff_ids: Vec<Uuid>,
    pub resource_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub customer_id: Uuid,
    pub location_id: Uuid,
    pub date: DateTime<Utc>,
    pub booking_source: BookingSource,
    pub is_primary: Option<bool>,
    pub details: Vec<CreateAppointmentDetailRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAppointmentDetailRequest {
    pub id: Uuid,
    pub service_id: Option<Uuid>,
    pub staff_ids: Option<Vec<Uuid>>,
    pub resource_id: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub status: Option<AppointmentStatus>,
}

/// Partial edit of an appointment and its nested details in one call.
/// New sibling appointments expand the owning group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub customer_id: Option<Uuid>,
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub create_details: Vec<CreateAppointmentDetailRequest>,
    #[serde(default)]
    pub update_details: Vec<UpdateAppointmentDetailRequest>,
    #[serde(default)]
    pub delete_details: Vec<Uuid>,
    #[serde(default)]
    pub create_appointments: Vec<CreateAppointmentRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentGroupRequest {
    pub location_id: Uuid,
    pub date: DateTime<Utc>,
    pub booking_source: BookingSource,
    pub appointments: Vec<CreateAppointmentRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAppointmentStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub cancel_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingAppointmentRequest {
    pub number_rating: i32,
    pub content_review: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub customer_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub booking_source: Option<BookingSource>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentWithDetails {
    pub appointment: Appointment,
    pub details: Vec<AppointmentDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentGroupWithMembers {
    pub group: AppointmentGroup,
    pub appointments: Vec<AppointmentWithDetails>,
}

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

/// One slot in the working-day template. Order matters: the last seed is the
/// closing slot and never accepts a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotSeed {
    pub time: String,
    pub is_avail: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffUnavailability {
    pub staff_id: Uuid,
    pub times: Vec<String>,
}

/// Ephemeral per-request availability entry; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub time: String,
    pub staff_id: Uuid,
    pub is_avail: bool,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Appointment group not found")]
    GroupNotFound,

    #[error("Location not found")]
    LocationNotFound,

    #[error("Status transition not allowed: {from} -> {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Booking source not allowed: {0}")]
    InvalidBookingSource(String),

    #[error("Appointment group requires exactly one primary member, got {count}")]
    InvalidGroupPrimary { count: usize },

    #[error("Appointment customer cannot be changed after creation")]
    CustomerChangeNotAllowed,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
