// libs/appointment-cell/src/services/availability.rs
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::models::{AppointmentError, SlotSeed, StaffUnavailability, TimeSlot};

/// Parse a `HH:MM` slot label into minutes since midnight.
fn slot_minutes(label: &str) -> Result<u32, AppointmentError> {
    let (hh, mm) = label
        .split_once(':')
        .ok_or_else(|| AppointmentError::ValidationError(format!("Invalid slot label: {}", label)))?;

    let hours: u32 = hh.parse().map_err(|_| {
        AppointmentError::ValidationError(format!("Invalid slot label: {}", label))
    })?;
    let minutes: u32 = mm.parse().map_err(|_| {
        AppointmentError::ValidationError(format!("Invalid slot label: {}", label))
    })?;

    if hours > 23 || minutes > 59 {
        return Err(AppointmentError::ValidationError(format!(
            "Invalid slot label: {}",
            label
        )));
    }

    Ok(hours * 60 + minutes)
}

/// Format minutes since midnight back into a `HH:MM` label.
pub fn slot_label(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Generate an all-available slot template over the working-day window,
/// closing slot included.
pub fn build_slot_template(
    open: &str,
    close: &str,
    interval_minutes: u32,
) -> Result<Vec<SlotSeed>, AppointmentError> {
    let open_min = slot_minutes(open)?;
    let close_min = slot_minutes(close)?;

    if interval_minutes == 0 || open_min >= close_min {
        return Err(AppointmentError::ValidationError(
            "Invalid working-day window".to_string(),
        ));
    }

    let mut seeds = Vec::new();
    let mut at = open_min;
    while at <= close_min {
        seeds.push(SlotSeed {
            time: slot_label(at),
            is_avail: true,
        });
        at += interval_minutes;
    }

    Ok(seeds)
}

/// Compute per-slot, per-staff availability for one location day.
///
/// Slot arithmetic is minutes since midnight; labels stay `HH:MM`. Staff
/// assignment is deterministic: the first roster staff without an
/// unavailability at the slot, falling back to the first roster staff.
///
/// Suppression rules, applied in order:
///  - the closing slot never accepts a booking;
///  - a slot whose start + duration runs past closing is unavailable;
///  - on the current UTC day, slots earlier than `now` are unavailable;
///  - on a day strictly in the past, every slot is unavailable.
pub fn compute_availability(
    staff_ids: &[Uuid],
    unavailable: &[StaffUnavailability],
    template: &[SlotSeed],
    duration_minutes: u32,
    target_date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Vec<TimeSlot>, AppointmentError> {
    if template.is_empty() {
        return Ok(Vec::new());
    }
    let Some(&fallback_staff) = staff_ids.first() else {
        warn!("Availability requested for an empty staff roster");
        return Ok(Vec::new());
    };

    let last_minutes = slot_minutes(&template[template.len() - 1].time)?;

    let mut slots = Vec::with_capacity(template.len());
    for seed in template {
        let minutes = slot_minutes(&seed.time)?;

        let staff_id = staff_ids
            .iter()
            .copied()
            .find(|candidate| {
                !unavailable.iter().any(|entry| {
                    entry.staff_id == *candidate && entry.times.iter().any(|t| t == &seed.time)
                })
            })
            .unwrap_or(fallback_staff);

        let mut is_avail = seed.is_avail;

        // No bookings starting at closing time, and none that would run past it.
        if minutes == last_minutes || minutes + duration_minutes > last_minutes {
            is_avail = false;
        }

        slots.push(TimeSlot {
            time: seed.time.clone(),
            staff_id,
            is_avail,
        });
    }

    let today = now.date_naive();
    if target_date == today {
        let now_minutes = now.hour() * 60 + now.minute();
        for slot in &mut slots {
            if slot_minutes(&slot.time)? < now_minutes {
                slot.is_avail = false;
            }
        }
    } else if target_date < today {
        for slot in &mut slots {
            slot.is_avail = false;
        }
    }

    Ok(slots)
}

// ==============================================================================
// AVAILABILITY SERVICE
// ==============================================================================

use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::AppointmentStatus;

#[derive(Debug, Deserialize)]
struct LocationHours {
    open_time: String,
    close_time: String,
    slot_interval_minutes: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct StaffRow {
    id: Uuid,
}

#[derive(Debug, Deserialize)]
struct LocationCompanyRow {
    company_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct BookedDetail {
    staff_ids: Vec<Uuid>,
    start_time: DateTime<Utc>,
    duration_minutes: i32,
    status: AppointmentStatus,
}

pub struct AvailabilityService {
    supabase: Arc<SupabaseClient>,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Per-slot, per-staff availability for one location day: roster and
    /// existing bookings are loaded, booked slots become per-staff
    /// unavailability lists, then the calculator applies the suppression
    /// rules.
    pub async fn staff_availability(
        &self,
        location_id: Uuid,
        target_date: NaiveDate,
        duration_minutes: u32,
        auth_token: &str,
    ) -> Result<Vec<TimeSlot>, AppointmentError> {
        debug!("Computing availability for location {} on {}", location_id, target_date);

        let hours = self.get_location_hours(location_id, auth_token).await?;
        let interval = hours.slot_interval_minutes.unwrap_or(15);
        let template = build_slot_template(&hours.open_time, &hours.close_time, interval)?;

        let staff_ids = self.get_location_staff(location_id, auth_token).await?;
        let unavailable = self
            .get_booked_times(location_id, target_date, interval, auth_token)
            .await?;

        compute_availability(
            &staff_ids,
            &unavailable,
            &template,
            duration_minutes,
            target_date,
            Utc::now(),
        )
    }

    /// Company owning a location, resolved for the tenant guard before any
    /// roster or booking data is read.
    pub async fn location_company_id(
        &self,
        location_id: Uuid,
        auth_token: &str,
    ) -> Result<Uuid, AppointmentError> {
        let path = format!(
            "/rest/v1/locations?id=eq.{}&select=company_id",
            location_id
        );
        let rows: Vec<LocationCompanyRow> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        rows.first()
            .map(|row| row.company_id)
            .ok_or(AppointmentError::LocationNotFound)
    }

    async fn get_location_hours(
        &self,
        location_id: Uuid,
        auth_token: &str,
    ) -> Result<LocationHours, AppointmentError> {
        let path = format!(
            "/rest/v1/locations?id=eq.{}&select=open_time,close_time,slot_interval_minutes",
            location_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::LocationNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse location: {}", e)))
    }

    async fn get_location_staff(
        &self,
        location_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Uuid>, AppointmentError> {
        let path = format!(
            "/rest/v1/staff?location_id=eq.{}&deleted_at=is.null&select=id",
            location_id
        );
        let rows: Vec<StaffRow> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    /// Booked slot labels per staff for the target day. Cancelled and no-show
    /// details do not block a slot.
    async fn get_booked_times(
        &self,
        location_id: Uuid,
        target_date: NaiveDate,
        interval_minutes: u32,
        auth_token: &str,
    ) -> Result<Vec<StaffUnavailability>, AppointmentError> {
        let day_start = target_date.and_time(chrono::NaiveTime::MIN).and_utc();
        let day_end = day_start + ChronoDuration::days(1);

        // URL-encoded RFC3339 format for PostgREST range filters
        let from_str = day_start.to_rfc3339();
        let to_str = day_end.to_rfc3339();
        let from = urlencoding::encode(&from_str);
        let to = urlencoding::encode(&to_str);

        let path = format!(
            "/rest/v1/appointment_details?select=staff_ids,start_time,duration_minutes,status,appointment:appointments!inner(location_id,deleted_at)&appointment.location_id=eq.{}&appointment.deleted_at=is.null&start_time=gte.{}&start_time=lt.{}",
            location_id, from, to
        );

        let rows: Vec<BookedDetail> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let mut by_staff: std::collections::HashMap<Uuid, Vec<String>> =
            std::collections::HashMap::new();

        for row in rows {
            if matches!(row.status, AppointmentStatus::Cancel | AppointmentStatus::NoShow) {
                continue;
            }

            let start = row.start_time.hour() * 60 + row.start_time.minute();
            let end = start + row.duration_minutes.max(0) as u32;

            let mut at = start;
            while at < end {
                for staff_id in &row.staff_ids {
                    by_staff.entry(*staff_id).or_default().push(slot_label(at));
                }
                at += interval_minutes;
            }
        }

        Ok(by_staff
            .into_iter()
            .map(|(staff_id, times)| StaffUnavailability { staff_id, times })
            .collect())
    }
}
