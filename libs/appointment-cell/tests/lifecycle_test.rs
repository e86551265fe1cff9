// libs/appointment-cell/tests/lifecycle_test.rs

use appointment_cell::models::{AppointmentError, AppointmentStatus};
use appointment_cell::services::lifecycle::AppointmentLifecycleService;
use assert_matches::assert_matches;

use AppointmentStatus::*;

/// The full allow-matrix, row per current status, column per candidate.
/// Column order matches `AppointmentStatus::ALL`.
const EXPECTED: [(AppointmentStatus, [bool; 7]); 7] = [
    (New,       [false, true,  true,  true,  true,  true,  true ]),
    (Confirmed, [true,  false, true,  true,  true,  true,  true ]),
    (Arrived,   [true,  true,  false, true,  true,  true,  true ]),
    (InService, [true,  true,  true,  false, true,  true,  true ]),
    (Completed, [false, false, false, false, false, false, false]),
    (Cancel,    [false, false, false, false, false, false, false]),
    (NoShow,    [true,  false, false, false, false, false, false]),
];

#[test]
fn transition_matrix_matches_expected_table_exactly() {
    let lifecycle = AppointmentLifecycleService::new();

    for (from, row) in EXPECTED {
        for (to, expected) in AppointmentStatus::ALL.into_iter().zip(row) {
            assert_eq!(
                lifecycle.is_transition_allowed(from, to),
                expected,
                "transition {} -> {} should be {}",
                from,
                to,
                expected
            );
        }
    }
}

#[test]
fn completed_and_cancel_are_absorbing() {
    let lifecycle = AppointmentLifecycleService::new();

    for from in [Completed, Cancel] {
        for to in AppointmentStatus::ALL {
            assert!(
                !lifecycle.is_transition_allowed(from, to),
                "{} must have no outgoing transitions, found {} -> {}",
                from,
                from,
                to
            );
        }
        assert!(lifecycle.is_terminal(from));
    }
}

#[test]
fn no_show_only_reactivates_to_new() {
    let lifecycle = AppointmentLifecycleService::new();

    assert_eq!(lifecycle.allowed_transitions(NoShow), vec![New]);
    assert!(!lifecycle.is_terminal(NoShow));
}

#[test]
fn idempotent_status_writes_are_rejected() {
    let lifecycle = AppointmentLifecycleService::new();

    for status in AppointmentStatus::ALL {
        assert!(
            !lifecycle.is_transition_allowed(status, status),
            "{} -> {} must be rejected",
            status,
            status
        );
    }
}

#[test]
fn disallowed_transition_surfaces_structured_error() {
    let lifecycle = AppointmentLifecycleService::new();

    let result = lifecycle.validate_status_transition(Completed, Confirmed);
    assert_matches!(
        result,
        Err(AppointmentError::InvalidStatusTransition {
            from: Completed,
            to: Confirmed
        })
    );

    assert!(lifecycle.validate_status_transition(New, Confirmed).is_ok());
}

#[test]
fn active_statuses_can_reach_every_other_status() {
    let lifecycle = AppointmentLifecycleService::new();

    for from in [New, Confirmed, Arrived, InService] {
        let reachable = lifecycle.allowed_transitions(from);
        assert_eq!(reachable.len(), 6, "{} should reach all other statuses", from);
        assert!(!reachable.contains(&from));
    }
}
