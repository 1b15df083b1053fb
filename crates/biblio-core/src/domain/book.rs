//! Book record and inventory counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::CirculationError;
use super::ids::BookId;

/// Shelf status of a book title.
///
/// `Available`/`Borrowed` are derived from the copy counters; `Reserved` is an
/// operator-set marker for titles held back for the reservation desk;
/// `Maintenance`/`Lost` override everything and make the title unborrowable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    Available,
    Borrowed,
    Reserved,
    Maintenance,
    Lost,
}

/// One catalog title with its copy counters.
///
/// Design:
/// - This is the single source of truth for inventory counts.
/// - Counter mutation only happens through `try_claim_copy`, `release_copy`
///   and `adjust_inventory`; the store calls these under its lock so the
///   conditional decrement is atomic.
/// - Invariant: `0 <= available_copies <= total_copies` at all times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub total_copies: u32,
    pub available_copies: u32,
    pub status: BookStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn new(
        id: BookId,
        isbn: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        total_copies: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let status = if total_copies == 0 {
            BookStatus::Borrowed
        } else {
            BookStatus::Available
        };
        Self {
            id,
            isbn: isbn.into(),
            title: title.into(),
            author: author.into(),
            total_copies,
            available_copies: total_copies,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    /// Maintenance and lost titles cannot circulate.
    pub fn is_borrowable(&self) -> bool {
        !matches!(self.status, BookStatus::Maintenance | BookStatus::Lost)
    }

    /// Decrement `available_copies` only if it is currently positive.
    ///
    /// This is the conditional half of the claim-then-create transaction: the
    /// caller must hold the store lock so the check and the write are one
    /// indivisible step. Returns whether the claim succeeded.
    pub fn try_claim_copy(&mut self, now: DateTime<Utc>) -> bool {
        if self.available_copies == 0 {
            return false;
        }
        self.available_copies -= 1;
        if self.available_copies == 0 && self.status == BookStatus::Available {
            self.status = BookStatus::Borrowed;
        }
        self.updated_at = now;
        true
    }

    /// Return one copy to the shelf, capped at `total_copies`.
    pub fn release_copy(&mut self, now: DateTime<Utc>) {
        if self.available_copies < self.total_copies {
            self.available_copies += 1;
        }
        if self.available_copies > 0 && self.status == BookStatus::Borrowed {
            self.status = BookStatus::Available;
        }
        self.updated_at = now;
    }

    /// Apply `delta` to both `total_copies` and `available_copies`.
    ///
    /// Over/under adjustment is rejected, never truncated or clamped: if
    /// either counter would leave the `u32` range the book is untouched.
    pub fn adjust_inventory(
        &mut self,
        delta: i64,
        now: DateTime<Utc>,
    ) -> Result<(), CirculationError> {
        let new_total = i64::from(self.total_copies) + delta;
        let new_available = i64::from(self.available_copies) + delta;
        let (Ok(new_total), Ok(new_available)) =
            (u32::try_from(new_total), u32::try_from(new_available))
        else {
            return Err(CirculationError::InvalidAdjustment(format!(
                "delta {delta} would leave total={new_total}, available={new_available}"
            )));
        };
        self.total_copies = new_total;
        self.available_copies = new_available;
        match self.status {
            BookStatus::Available if self.available_copies == 0 => {
                self.status = BookStatus::Borrowed;
            }
            BookStatus::Borrowed if self.available_copies > 0 => {
                self.status = BookStatus::Available;
            }
            _ => {}
        }
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::BookId;
    use ulid::Ulid;

    fn book(copies: u32) -> Book {
        Book::new(
            BookId::from_ulid(Ulid::new()),
            "978-0-0000-0000-0",
            "The Rust Programming Language",
            "Klabnik & Nichols",
            copies,
            Utc::now(),
        )
    }

    #[test]
    fn claim_decrements_until_empty() {
        let mut b = book(2);
        let now = Utc::now();

        assert!(b.try_claim_copy(now));
        assert_eq!(b.available_copies, 1);
        assert_eq!(b.status, BookStatus::Available);

        assert!(b.try_claim_copy(now));
        assert_eq!(b.available_copies, 0);
        assert_eq!(b.status, BookStatus::Borrowed);

        assert!(!b.try_claim_copy(now));
        assert_eq!(b.available_copies, 0);
    }

    #[test]
    fn release_restores_availability() {
        let mut b = book(1);
        let now = Utc::now();
        assert!(b.try_claim_copy(now));

        b.release_copy(now);
        assert_eq!(b.available_copies, 1);
        assert_eq!(b.status, BookStatus::Available);
    }

    #[test]
    fn release_is_capped_at_total() {
        let mut b = book(1);
        b.release_copy(Utc::now());
        assert_eq!(b.available_copies, 1);
        assert_eq!(b.total_copies, 1);
    }

    #[test]
    fn release_does_not_revive_maintenance_title() {
        let mut b = book(1);
        let now = Utc::now();
        assert!(b.try_claim_copy(now));
        b.status = BookStatus::Maintenance;

        b.release_copy(now);
        assert_eq!(b.status, BookStatus::Maintenance);
    }

    #[test]
    fn adjust_rejects_negative_counters() {
        let mut b = book(2);
        let now = Utc::now();
        assert!(b.try_claim_copy(now)); // available=1, total=2

        // Removing 2 copies would leave available=-1.
        let err = b.adjust_inventory(-2, now).unwrap_err();
        assert!(matches!(err, CirculationError::InvalidAdjustment(_)));
        assert_eq!(b.total_copies, 2);
        assert_eq!(b.available_copies, 1);
    }

    #[test]
    fn adjust_rejects_counters_past_u32_range() {
        let mut b = book(2);
        let now = Utc::now();

        let err = b
            .adjust_inventory(i64::from(u32::MAX), now)
            .unwrap_err();
        assert!(matches!(err, CirculationError::InvalidAdjustment(_)));
        assert_eq!(b.total_copies, 2);
        assert_eq!(b.available_copies, 2);
    }

    #[test]
    fn adjust_applies_to_both_counters() {
        let mut b = book(1);
        let now = Utc::now();
        assert!(b.try_claim_copy(now)); // available=0 -> Borrowed

        b.adjust_inventory(3, now).unwrap();
        assert_eq!(b.total_copies, 4);
        assert_eq!(b.available_copies, 3);
        assert_eq!(b.status, BookStatus::Available);
    }
}
