//! Fine record and the pure overdue-fine calculator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::CirculationError;
use super::ids::{BorrowerId, BorrowingId, FineId};

/// Whole overdue days between `due_date` and `returned_at`, rounded up.
///
/// Zero if the return is on time. One second late already counts as one day.
pub fn days_overdue(due_date: DateTime<Utc>, returned_at: DateTime<Utc>) -> i64 {
    let secs = (returned_at - due_date).num_seconds();
    if secs <= 0 { 0 } else { secs.div_ceil(86_400) }
}

/// Pure fine calculator: `ceil(days overdue) * rate`, rounded to cents.
///
/// No side effects; callable with `now` in place of `returned_at` for
/// estimated-fine previews on still-open loans.
pub fn overdue_fine(
    due_date: DateTime<Utc>,
    returned_at: DateTime<Utc>,
    rate_per_day: f64,
) -> f64 {
    let days = days_overdue(due_date, returned_at);
    round_to_cents(days as f64 * rate_per_day)
}

pub(crate) fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Payment state of a fine. A fully paid fine is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FineStatus {
    Unpaid,
    Partial,
    Paid,
}

/// A monetary penalty linked to one borrowing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fine {
    pub id: FineId,
    pub borrowing_id: BorrowingId,
    pub borrower_id: BorrowerId,
    pub amount: f64,
    pub paid_amount: f64,
    pub reason: String,
    pub status: FineStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Fine {
    pub fn new(
        id: FineId,
        borrowing_id: BorrowingId,
        borrower_id: BorrowerId,
        amount: f64,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            borrowing_id,
            borrower_id,
            amount,
            paid_amount: 0.0,
            reason: reason.into(),
            status: FineStatus::Unpaid,
            paid_at: None,
            created_at: now,
        }
    }

    /// Apply a payment. Moves Unpaid -> Partial -> Paid.
    pub fn record_payment(
        &mut self,
        paid: f64,
        now: DateTime<Utc>,
    ) -> Result<(), CirculationError> {
        if self.status == FineStatus::Paid {
            return Err(CirculationError::InvalidState(
                "fine already paid".to_string(),
            ));
        }
        if paid <= 0.0 {
            return Err(CirculationError::InvalidState(
                "payment must be positive".to_string(),
            ));
        }
        self.paid_amount = round_to_cents(self.paid_amount + paid);
        if self.paid_amount >= self.amount {
            self.status = FineStatus::Paid;
            self.paid_at = Some(now);
        } else {
            self.status = FineStatus::Partial;
        }
        Ok(())
    }

    /// Administrative waiver: forces the fine into the terminal Paid state.
    pub fn waive(&mut self, now: DateTime<Utc>) -> Result<(), CirculationError> {
        if self.status == FineStatus::Paid {
            return Err(CirculationError::InvalidState(
                "fine already paid".to_string(),
            ));
        }
        self.status = FineStatus::Paid;
        self.paid_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{BorrowerId, BorrowingId, FineId};
    use chrono::Duration;
    use rstest::rstest;
    use ulid::Ulid;

    #[rstest]
    #[case::on_time(0, 0)]
    #[case::one_second_late(1, 1)]
    #[case::just_under_a_day(86_399, 1)]
    #[case::exactly_one_day(86_400, 1)]
    #[case::one_day_and_a_bit(86_401, 2)]
    #[case::six_days(6 * 86_400, 6)]
    fn days_overdue_rounds_up(#[case] late_secs: i64, #[case] expected_days: i64) {
        let due = Utc::now();
        let returned = due + Duration::seconds(late_secs);
        assert_eq!(days_overdue(due, returned), expected_days);
    }

    #[test]
    fn early_return_is_never_negative() {
        let due = Utc::now();
        assert_eq!(days_overdue(due, due - Duration::days(3)), 0);
        assert_eq!(overdue_fine(due, due - Duration::days(3), 0.5), 0.0);
    }

    #[test]
    fn fine_is_days_times_rate_in_cents() {
        let due = Utc::now();
        let returned = due + Duration::days(6);
        // 6 days at 0.50/day.
        assert_eq!(overdue_fine(due, returned, 0.5), 3.00);
        // Rate with sub-cent product gets rounded.
        assert_eq!(overdue_fine(due, returned, 0.333), 2.00);
    }

    fn fine(amount: f64) -> Fine {
        Fine::new(
            FineId::from_ulid(Ulid::new()),
            BorrowingId::from_ulid(Ulid::new()),
            BorrowerId::from_ulid(Ulid::new()),
            amount,
            "Overdue by 6 day(s)",
            Utc::now(),
        )
    }

    #[test]
    fn payments_walk_unpaid_partial_paid() {
        let now = Utc::now();
        let mut f = fine(3.00);

        f.record_payment(1.00, now).unwrap();
        assert_eq!(f.status, FineStatus::Partial);
        assert!(f.paid_at.is_none());

        f.record_payment(2.00, now).unwrap();
        assert_eq!(f.status, FineStatus::Paid);
        assert_eq!(f.paid_at, Some(now));

        // Terminal: no further mutation.
        assert!(f.record_payment(1.00, now).is_err());
        assert!(f.waive(now).is_err());
    }

    #[test]
    fn waiver_forces_paid() {
        let now = Utc::now();
        let mut f = fine(3.00);
        f.waive(now).unwrap();
        assert_eq!(f.status, FineStatus::Paid);
        assert_eq!(f.paid_amount, 0.0);
    }

    #[test]
    fn non_positive_payment_is_rejected() {
        let now = Utc::now();
        let mut f = fine(3.00);
        assert!(f.record_payment(0.0, now).is_err());
        assert!(f.record_payment(-1.0, now).is_err());
    }
}
