//! Borrowing record and loan lifecycle.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::errors::CirculationError;
use super::ids::{BookId, BorrowerId, BorrowingId};

/// Loan state.
///
/// State transitions:
/// - Active -> Returned (return)
/// - Active -> Overdue (sweeper, past due date) -> Returned
/// - Active | Overdue -> Lost (operator)
/// - renew is a self-loop on Active/Overdue
///
/// Returned records are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorrowingStatus {
    Active,
    Overdue,
    Returned,
    Lost,
}

impl BorrowingStatus {
    /// Open borrowings hold a copy and count against the borrower's limit.
    pub fn is_open(self) -> bool {
        matches!(self, BorrowingStatus::Active | BorrowingStatus::Overdue)
    }
}

/// One loan of one copy to one borrower.
///
/// Design:
/// - Single source of truth for the loan's state; all transitions go through
///   the methods below, never direct field writes.
/// - `max_renewals` is frozen at creation from the borrower's role policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Borrowing {
    pub id: BorrowingId,
    pub book_id: BookId,
    pub borrower_id: BorrowerId,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: BorrowingStatus,
    pub renewed_count: u32,
    pub max_renewals: u32,
}

impl Borrowing {
    pub fn new(
        id: BorrowingId,
        book_id: BookId,
        borrower_id: BorrowerId,
        now: DateTime<Utc>,
        loan_days: i64,
        max_renewals: u32,
    ) -> Self {
        Self {
            id,
            book_id,
            borrower_id,
            borrowed_at: now,
            due_date: now + Duration::days(loan_days),
            returned_at: None,
            status: BorrowingStatus::Active,
            renewed_count: 0,
            max_renewals,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Past due at `now`, or already marked by the sweeper.
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.status == BorrowingStatus::Overdue || (self.is_open() && now > self.due_date)
    }

    /// Close the loan. Fails on already-returned (immutable) and lost records.
    pub fn mark_returned(&mut self, now: DateTime<Utc>) -> Result<(), CirculationError> {
        match self.status {
            BorrowingStatus::Returned => Err(CirculationError::AlreadyReturned),
            BorrowingStatus::Lost => Err(CirculationError::InvalidState(
                "borrowing is marked lost".to_string(),
            )),
            BorrowingStatus::Active | BorrowingStatus::Overdue => {
                self.status = BorrowingStatus::Returned;
                self.returned_at = Some(now);
                Ok(())
            }
        }
    }

    /// Renew: reset to a fresh loan period from `now` (not an extension of
    /// the old due date) and consume one renewal.
    pub fn renew(&mut self, now: DateTime<Utc>, loan_days: i64) -> Result<(), CirculationError> {
        if matches!(
            self.status,
            BorrowingStatus::Returned | BorrowingStatus::Lost
        ) {
            return Err(CirculationError::CannotRenew(format!(
                "borrowing is {:?}",
                self.status
            )));
        }
        if self.renewed_count >= self.max_renewals {
            return Err(CirculationError::CannotRenew(format!(
                "renewal cap reached ({}/{})",
                self.renewed_count, self.max_renewals
            )));
        }
        self.due_date = now + Duration::days(loan_days);
        self.renewed_count += 1;
        Ok(())
    }

    /// Sweeper transition; a no-op unless the loan is Active and past due.
    pub fn mark_overdue(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == BorrowingStatus::Active && now > self.due_date {
            self.status = BorrowingStatus::Overdue;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{BookId, BorrowerId, BorrowingId};
    use rstest::rstest;
    use ulid::Ulid;

    fn borrowing(now: DateTime<Utc>, max_renewals: u32) -> Borrowing {
        Borrowing::new(
            BorrowingId::from_ulid(Ulid::new()),
            BookId::from_ulid(Ulid::new()),
            BorrowerId::from_ulid(Ulid::new()),
            now,
            30,
            max_renewals,
        )
    }

    #[test]
    fn new_loan_is_active_with_full_period() {
        let now = Utc::now();
        let b = borrowing(now, 2);
        assert_eq!(b.status, BorrowingStatus::Active);
        assert_eq!(b.due_date, now + Duration::days(30));
        assert_eq!(b.renewed_count, 0);
    }

    #[test]
    fn return_sets_timestamp_and_is_final() {
        let now = Utc::now();
        let mut b = borrowing(now, 2);

        b.mark_returned(now).unwrap();
        assert_eq!(b.status, BorrowingStatus::Returned);
        assert_eq!(b.returned_at, Some(now));

        let err = b.mark_returned(now).unwrap_err();
        assert!(matches!(err, CirculationError::AlreadyReturned));
    }

    #[test]
    fn renew_resets_period_from_now() {
        let now = Utc::now();
        let mut b = borrowing(now, 2);

        let later = now + Duration::days(10);
        b.renew(later, 30).unwrap();

        assert_eq!(b.due_date, later + Duration::days(30));
        assert_eq!(b.renewed_count, 1);
    }

    #[test]
    fn renew_fails_at_cap() {
        let now = Utc::now();
        let mut b = borrowing(now, 2);
        b.renew(now, 30).unwrap();
        b.renew(now, 30).unwrap();

        let err = b.renew(now, 30).unwrap_err();
        assert!(matches!(err, CirculationError::CannotRenew(_)));
        assert_eq!(b.renewed_count, 2);
    }

    #[rstest]
    #[case::returned(BorrowingStatus::Returned)]
    #[case::lost(BorrowingStatus::Lost)]
    fn renew_fails_in_terminal_states(#[case] status: BorrowingStatus) {
        let now = Utc::now();
        let mut b = borrowing(now, 2);
        b.status = status;

        assert!(matches!(
            b.renew(now, 30),
            Err(CirculationError::CannotRenew(_))
        ));
    }

    #[test]
    fn overdue_marking_is_idempotent() {
        let now = Utc::now();
        let mut b = borrowing(now, 2);
        let past_due = now + Duration::days(31);

        assert!(b.mark_overdue(past_due));
        assert_eq!(b.status, BorrowingStatus::Overdue);
        // Second pass is a no-op.
        assert!(!b.mark_overdue(past_due));
    }

    #[test]
    fn not_marked_overdue_before_due_date() {
        let now = Utc::now();
        let mut b = borrowing(now, 2);
        assert!(!b.mark_overdue(now + Duration::days(29)));
        assert_eq!(b.status, BorrowingStatus::Active);
    }

    #[test]
    fn overdue_check_uses_status_or_clock() {
        let now = Utc::now();
        let mut b = borrowing(now, 2);

        assert!(!b.is_overdue_at(now));
        assert!(b.is_overdue_at(now + Duration::days(31)));

        b.status = BorrowingStatus::Overdue;
        assert!(b.is_overdue_at(now));
    }
}
