// libs/appointment-cell/tests/availability_test.rs

use assert_matches::assert_matches;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{AppointmentError, SlotSeed, StaffUnavailability, TimeSlot};
use appointment_cell::services::availability::{
    build_slot_template, compute_availability, slot_label, AvailabilityService,
};
use shared_utils::test_utils::TestConfig;

fn staff(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

fn template() -> Vec<SlotSeed> {
    // 09:00 .. 10:00 in 15-minute steps, closing slot included
    build_slot_template("09:00", "10:00", 15).expect("valid window")
}

fn far_future() -> (NaiveDate, DateTime<Utc>) {
    let target = NaiveDate::from_ymd_opt(2031, 6, 20).expect("valid date");
    let now = Utc.with_ymd_and_hms(2031, 6, 1, 8, 0, 0).single().expect("valid time");
    (target, now)
}

fn slot<'a>(slots: &'a [TimeSlot], time: &str) -> &'a TimeSlot {
    slots.iter().find(|s| s.time == time).expect("slot present")
}

#[test]
fn template_covers_window_with_closing_slot() {
    let seeds = template();
    let labels: Vec<&str> = seeds.iter().map(|s| s.time.as_str()).collect();
    assert_eq!(labels, ["09:00", "09:15", "09:30", "09:45", "10:00"]);
    assert!(seeds.iter().all(|s| s.is_avail));
}

#[test]
fn slot_labels_are_zero_padded() {
    assert_eq!(slot_label(9 * 60 + 5), "09:05");
    assert_eq!(slot_label(0), "00:00");
    assert_eq!(slot_label(23 * 60 + 45), "23:45");
}

#[test]
fn closing_slot_never_accepts_a_booking() {
    let (target, now) = far_future();
    let slots = compute_availability(&[staff(1)], &[], &template(), 15, target, now)
        .expect("computes");

    assert!(!slot(&slots, "10:00").is_avail);
}

#[test]
fn slots_overrunning_closing_are_unavailable() {
    let (target, now) = far_future();
    let slots = compute_availability(&[staff(1)], &[], &template(), 30, target, now)
        .expect("computes");

    // 09:45 + 30min runs past 10:00; 09:30 + 30min lands exactly on closing
    assert!(!slot(&slots, "09:45").is_avail);
    assert!(slot(&slots, "09:30").is_avail);
    assert!(slot(&slots, "09:00").is_avail);
}

#[test]
fn same_day_slots_before_now_are_unavailable() {
    let target = NaiveDate::from_ymd_opt(2031, 6, 20).expect("valid date");
    let now = Utc.with_ymd_and_hms(2031, 6, 20, 9, 20, 0).single().expect("valid time");

    let slots = compute_availability(&[staff(1)], &[], &template(), 15, target, now)
        .expect("computes");

    assert!(!slot(&slots, "09:00").is_avail);
    assert!(!slot(&slots, "09:15").is_avail);
    assert!(slot(&slots, "09:30").is_avail);
    assert!(slot(&slots, "09:45").is_avail);
}

#[test]
fn past_day_is_entirely_unavailable() {
    let target = NaiveDate::from_ymd_opt(2031, 6, 19).expect("valid date");
    let now = Utc.with_ymd_and_hms(2031, 6, 20, 0, 0, 1).single().expect("valid time");

    let slots = compute_availability(&[staff(1)], &[], &template(), 15, target, now)
        .expect("computes");

    assert!(slots.iter().all(|s| !s.is_avail));
}

#[test]
fn staff_assignment_skips_busy_staff_deterministically() {
    let (target, now) = far_future();
    let roster = [staff(1), staff(2)];
    let busy = [StaffUnavailability {
        staff_id: staff(1),
        times: vec!["09:15".to_string()],
    }];

    let slots = compute_availability(&roster, &busy, &template(), 15, target, now)
        .expect("computes");

    // First roster staff wherever free, next staff where the first is booked
    assert_eq!(slot(&slots, "09:00").staff_id, staff(1));
    assert_eq!(slot(&slots, "09:15").staff_id, staff(2));
    assert_eq!(slot(&slots, "09:30").staff_id, staff(1));
}

#[test]
fn fully_booked_slot_falls_back_to_first_roster_staff() {
    let (target, now) = far_future();
    let roster = [staff(1), staff(2)];
    let busy = [
        StaffUnavailability {
            staff_id: staff(1),
            times: vec!["09:15".to_string()],
        },
        StaffUnavailability {
            staff_id: staff(2),
            times: vec!["09:15".to_string()],
        },
    ];

    let slots = compute_availability(&roster, &busy, &template(), 15, target, now)
        .expect("computes");

    assert_eq!(slot(&slots, "09:15").staff_id, staff(1));
}

#[test]
fn empty_roster_yields_no_slots() {
    let (target, now) = far_future();
    let slots = compute_availability(&[], &[], &template(), 15, target, now)
        .expect("computes");

    assert!(slots.is_empty());
}

#[test]
fn invalid_window_is_rejected() {
    assert!(build_slot_template("10:00", "09:00", 15).is_err());
    assert!(build_slot_template("09:00", "10:00", 0).is_err());
    assert!(build_slot_template("9am", "10:00", 15).is_err());
}

#[tokio::test]
async fn location_company_lookup_feeds_the_tenant_guard() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let service = AvailabilityService::new(&config);
    let company_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![
            json!({ "company_id": company_id }),
        ]))
        .mount(&mock_server)
        .await;

    let owner = service
        .location_company_id(Uuid::new_v4(), "test_token")
        .await
        .expect("lookup succeeds");
    assert_eq!(owner, company_id);
}

#[tokio::test]
async fn unknown_location_surfaces_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    let service = AvailabilityService::new(&config);

    Mock::given(method("GET"))
        .and(path("/rest/v1/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&mock_server)
        .await;

    let result = service.location_company_id(Uuid::new_v4(), "test_token").await;
    assert_matches!(result, Err(AppointmentError::LocationNotFound));
}
