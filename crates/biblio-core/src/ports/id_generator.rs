//! IdGenerator port.
//!
//! IDs are ULIDs assembled from the injected clock's timestamp plus a random
//! component, so the timestamp part of an id is deterministic under
//! `FixedClock` while ids stay unique.

use std::sync::Arc;

use ulid::Ulid;

use crate::domain::ids::{BookId, BorrowerId, BorrowingId, FineId, ReservationId};
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn book_id(&self) -> BookId;
    fn borrower_id(&self) -> BorrowerId;
    fn borrowing_id(&self) -> BorrowingId;
    fn reservation_id(&self) -> ReservationId;
    fn fine_id(&self) -> FineId;
}

/// ULID-based generator backed by a `Clock`.
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn next(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl IdGenerator for UlidGenerator {
    fn book_id(&self) -> BookId {
        BookId::from_ulid(self.next())
    }

    fn borrower_id(&self) -> BorrowerId {
        BorrowerId::from_ulid(self.next())
    }

    fn borrowing_id(&self) -> BorrowingId {
        BorrowingId::from_ulid(self.next())
    }

    fn reservation_id(&self) -> ReservationId {
        ReservationId::from_ulid(self.next())
    }

    fn fine_id(&self) -> FineId {
        FineId::from_ulid(self.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn generated_ids_are_unique() {
        let ids = UlidGenerator::new(Arc::new(SystemClock));
        let a = ids.borrowing_id();
        let b = ids.borrowing_id();
        assert_ne!(a, b);
    }

    #[test]
    fn timestamp_part_follows_the_clock() {
        let fixed = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let ids = UlidGenerator::new(Arc::new(FixedClock::new(fixed)));

        let id = ids.reservation_id();
        assert_eq!(
            id.as_ulid().timestamp_ms(),
            fixed.timestamp_millis() as u64
        );
    }
}
