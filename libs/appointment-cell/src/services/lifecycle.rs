// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// Fixed allow-matrix over (current status, candidate status), indexed by
/// `AppointmentStatus::index()`. Rows are the current status, columns the
/// candidate. `completed` and `cancel` are absorbing; the only way out of
/// `no_show` is re-activation back to `new`. The diagonal is false
/// everywhere: idempotent status writes are rejected, callers must check
/// current state first.
#[rustfmt::skip]
const TRANSITIONS: [[bool; 7]; 7] = [
    // to:       new    conf   arr    insvc  comp   canc   noshow
    /* new       */ [false, true,  true,  true,  true,  true,  true ],
    /* confirmed */ [true,  false, true,  true,  true,  true,  true ],
    /* arrived   */ [true,  true,  false, true,  true,  true,  true ],
    /* in_service*/ [true,  true,  true,  false, true,  true,  true ],
    /* completed */ [false, false, false, false, false, false, false],
    /* cancel    */ [false, false, false, false, false, false, false],
    /* no_show   */ [true,  false, false, false, false, false, false],
];

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn is_transition_allowed(
        &self,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> bool {
        TRANSITIONS[from.index()][to.index()]
    }

    /// Validate that a status transition is allowed. Disallowed transitions
    /// are always rejected, never coerced.
    pub fn validate_status_transition(
        &self,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", from, to);

        if !self.is_transition_allowed(from, to) {
            warn!("Invalid status transition attempted: {} -> {}", from, to);
            return Err(AppointmentError::InvalidStatusTransition { from, to });
        }

        Ok(())
    }

    /// All statuses reachable from the given one.
    pub fn allowed_transitions(&self, from: AppointmentStatus) -> Vec<AppointmentStatus> {
        AppointmentStatus::ALL
            .into_iter()
            .filter(|to| self.is_transition_allowed(from, *to))
            .collect()
    }

    /// Terminal statuses have no outgoing transitions at all.
    pub fn is_terminal(&self, status: AppointmentStatus) -> bool {
        self.allowed_transitions(status).is_empty()
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
