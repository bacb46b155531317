//! The session transition table.
//!
//! Pure functions only; the [`QueueService`](crate::service::QueueService)
//! evaluates them inside the office critical section after re-reading the
//! current status. Three outcomes per check: the transition proceeds, it is a
//! duplicate of something already done (benign), or it is illegal.

use turno_core::types::SessionStatus;

/// A status-changing operation on a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// WAITING -> READY (operator calls the client forward).
    Ready,
    /// WAITING | READY -> ACTIVE (service starts at a desk).
    Activate,
    /// ACTIVE -> COMPLETED.
    Complete,
    /// Non-terminal -> CANCELLED.
    Cancel,
    /// Non-terminal -> EXPIRED (timeout).
    Expire,
}

impl Transition {
    /// The status this transition produces when applied.
    #[must_use]
    pub fn target(self) -> SessionStatus {
        match self {
            Self::Ready => SessionStatus::Ready,
            Self::Activate => SessionStatus::Active,
            Self::Complete => SessionStatus::Completed,
            Self::Cancel => SessionStatus::Cancelled,
            Self::Expire => SessionStatus::Expired,
        }
    }
}

/// Verdict of checking a transition against the current status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    /// Legal; apply it.
    Allowed,
    /// The session is already where this transition leads. Benign no-op,
    /// reported as `applied = false`, never an error.
    AlreadyThere,
    /// Illegal from the current status.
    Rejected,
}

/// Check a transition against the session's current status.
///
/// `Expire` is special-cased to be idempotent across *all* terminal states:
/// a timer firing against an already-completed session is normal operation,
/// not a conflict.
#[must_use]
pub fn check(from: SessionStatus, transition: Transition) -> Gate {
    use SessionStatus::{Active, Ready, Waiting};

    if from == transition.target() {
        return Gate::AlreadyThere;
    }
    match transition {
        Transition::Ready => match from {
            Waiting => Gate::Allowed,
            _ => Gate::Rejected,
        },
        Transition::Activate => match from {
            Waiting | Ready => Gate::Allowed,
            _ => Gate::Rejected,
        },
        Transition::Complete => match from {
            Active => Gate::Allowed,
            _ => Gate::Rejected,
        },
        Transition::Cancel => match from {
            Waiting | Ready | Active => Gate::Allowed,
            _ => Gate::Rejected,
        },
        Transition::Expire => {
            if from.is_terminal() {
                Gate::AlreadyThere
            } else {
                Gate::Allowed
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use turno_core::types::ALL_STATUSES;

    const TRANSITIONS: [Transition; 5] = [
        Transition::Ready,
        Transition::Activate,
        Transition::Complete,
        Transition::Cancel,
        Transition::Expire,
    ];

    #[test]
    fn full_table() {
        use Gate::{AlreadyThere, Allowed, Rejected};
        use SessionStatus::{Active, Cancelled, Completed, Expired, Ready, Waiting};

        // Rows follow ALL_STATUSES order; columns follow TRANSITIONS order.
        let expected = [
            // ready        activate      complete  cancel    expire
            [Allowed, Allowed, Rejected, Allowed, Allowed],        // WAITING
            [AlreadyThere, Allowed, Rejected, Allowed, Allowed],   // READY
            [Rejected, AlreadyThere, Allowed, Allowed, Allowed],   // ACTIVE
            [Rejected, Rejected, AlreadyThere, Rejected, AlreadyThere], // COMPLETED
            [Rejected, Rejected, Rejected, Rejected, AlreadyThere],     // EXPIRED
            [Rejected, Rejected, Rejected, AlreadyThere, AlreadyThere], // CANCELLED
        ];

        for (row, from) in ALL_STATUSES.iter().enumerate() {
            for (col, transition) in TRANSITIONS.iter().enumerate() {
                assert_eq!(
                    check(*from, *transition),
                    expected[row][col],
                    "check({from}, {transition:?})"
                );
            }
        }
        // Spot-check the enum values used above are the ones we think.
        assert_eq!(ALL_STATUSES, [Waiting, Ready, Active, Completed, Expired, Cancelled]);
    }

    #[test]
    fn targets() {
        assert_eq!(Transition::Ready.target(), SessionStatus::Ready);
        assert_eq!(Transition::Activate.target(), SessionStatus::Active);
        assert_eq!(Transition::Complete.target(), SessionStatus::Completed);
        assert_eq!(Transition::Cancel.target(), SessionStatus::Cancelled);
        assert_eq!(Transition::Expire.target(), SessionStatus::Expired);
    }

    #[test]
    fn expire_is_idempotent_from_every_terminal() {
        for status in ALL_STATUSES {
            if status.is_terminal() {
                assert_eq!(check(status, Transition::Expire), Gate::AlreadyThere);
            } else {
                assert_eq!(check(status, Transition::Expire), Gate::Allowed);
            }
        }
    }

    #[test]
    fn no_transition_leaves_a_terminal_state() {
        for status in ALL_STATUSES.iter().filter(|s| s.is_terminal()) {
            for transition in TRANSITIONS {
                assert_ne!(
                    check(*status, transition),
                    Gate::Allowed,
                    "{status} must not allow {transition:?}"
                );
            }
        }
    }
}
