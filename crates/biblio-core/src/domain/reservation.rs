//! Reservation record and waitlist lifecycle.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::errors::CirculationError;
use super::ids::{BookId, BorrowerId, ReservationId};

/// Waitlist state.
///
/// State transitions:
/// - Pending -> Ready (copy became available; pickup window starts)
/// - Ready -> Fulfilled (borrower collects; caller then borrows)
/// - Pending | Ready -> Cancelled (borrower)
/// - Pending | Ready -> Expired (sweeper, past `expires_at`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Ready,
    Cancelled,
    Fulfilled,
    Expired,
}

impl ReservationStatus {
    /// Active reservations occupy a queue slot.
    pub fn is_active(self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Ready)
    }
}

/// One waitlist entry for one borrower on one book.
///
/// Queue position is never stored: it is computed on read as the 1-based rank
/// by `created_at` (ULID id as tie-breaker) among the book's active entries,
/// so it survives concurrent cancellations and expirations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub book_id: BookId,
    pub borrower_id: BorrowerId,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub notified_at: Option<DateTime<Utc>>,
    pub fulfilled_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn new(
        id: ReservationId,
        book_id: BookId,
        borrower_id: BorrowerId,
        now: DateTime<Utc>,
        expiry_days: i64,
    ) -> Self {
        Self {
            id,
            book_id,
            borrower_id,
            status: ReservationStatus::Pending,
            created_at: now,
            expires_at: now + Duration::days(expiry_days),
            notified_at: None,
            fulfilled_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Promote to Ready: the pickup window replaces the original wait window.
    pub fn mark_ready(
        &mut self,
        now: DateTime<Utc>,
        pickup_deadline_days: i64,
    ) -> Result<(), CirculationError> {
        if self.status != ReservationStatus::Pending {
            return Err(CirculationError::InvalidState(format!(
                "cannot mark {:?} reservation ready",
                self.status
            )));
        }
        self.status = ReservationStatus::Ready;
        self.notified_at = Some(now);
        self.expires_at = now + Duration::days(pickup_deadline_days);
        Ok(())
    }

    /// The borrower collected the copy. Does not create the borrowing; the
    /// caller issues a separate borrow so queue promotion stays untangled
    /// from borrow-limit checks.
    pub fn fulfill(&mut self, now: DateTime<Utc>) -> Result<(), CirculationError> {
        if self.status != ReservationStatus::Ready {
            return Err(CirculationError::InvalidState(format!(
                "cannot fulfill {:?} reservation",
                self.status
            )));
        }
        self.status = ReservationStatus::Fulfilled;
        self.fulfilled_at = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), CirculationError> {
        if self.status == ReservationStatus::Fulfilled {
            return Err(CirculationError::InvalidState(
                "reservation already fulfilled".to_string(),
            ));
        }
        self.status = ReservationStatus::Cancelled;
        Ok(())
    }

    /// Sweeper transition; a no-op on non-active entries.
    pub fn expire(&mut self) -> bool {
        if self.is_active() {
            self.status = ReservationStatus::Expired;
            true
        } else {
            false
        }
    }
}
