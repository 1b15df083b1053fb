//! Repository ports: one trait per record family.
//!
//! The lifecycle engines are generic over these seams; the in-memory store in
//! `store::memory` is the development/test implementation, and a database
//! backend would be another.
//!
//! Contract notes:
//! - Every mutation takes `now` from the caller; repositories never read the
//!   wall clock themselves.
//! - `BookRepository::try_claim_copy` must be a single conditional atomic
//!   update ("decrement if positive"), never read-check-write.
//! - Lifecycle transitions (`mark_returned`, `renew`, `cancel`, ...) are
//!   conditional in the same way: the state check and the write are one
//!   indivisible step inside the store, so two racing callers cannot both
//!   observe the old state and both succeed. There is no blind `update`.
//! - `BorrowingRepository::insert` / `ReservationRepository::insert` enforce
//!   the one-active-record-per-(borrower, book) constraint as a storage-level
//!   backstop behind the engines' own checks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Book, BookId, Borrower, BorrowerId, Borrowing, BorrowingId, CirculationError, Fine, FineId,
    Reservation, ReservationId,
};

#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Catalog a new title. Fails if the ISBN is already cataloged.
    async fn insert(&self, book: Book) -> Result<(), CirculationError>;

    async fn get(&self, id: BookId) -> Result<Option<Book>, CirculationError>;

    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, CirculationError>;

    /// Atomically decrement `available_copies` if it is positive.
    ///
    /// Returns whether the claim succeeded; `NotFound` if the book is absent.
    /// This is the authoritative availability check — any earlier read is an
    /// optimization only.
    async fn try_claim_copy(
        &self,
        id: BookId,
        now: DateTime<Utc>,
    ) -> Result<bool, CirculationError>;

    /// Atomically increment `available_copies`, capped at `total_copies`.
    async fn release_copy(&self, id: BookId, now: DateTime<Utc>) -> Result<(), CirculationError>;

    /// Change `total_copies` and `available_copies` by `delta` together.
    ///
    /// Fails with `InvalidAdjustment` if either counter would go negative.
    async fn adjust_inventory(
        &self,
        id: BookId,
        delta: i64,
        now: DateTime<Utc>,
    ) -> Result<Book, CirculationError>;
}

#[async_trait]
pub trait BorrowerRepository: Send + Sync {
    async fn insert(&self, borrower: Borrower) -> Result<(), CirculationError>;

    async fn get(&self, id: BorrowerId) -> Result<Option<Borrower>, CirculationError>;
}

#[async_trait]
pub trait BorrowingRepository: Send + Sync {
    /// Append a new borrowing.
    ///
    /// Fails with `AlreadyHeld` if the borrower already has an open
    /// (active/overdue) borrowing of the same book.
    async fn insert(&self, borrowing: Borrowing) -> Result<(), CirculationError>;

    async fn get(&self, id: BorrowingId) -> Result<Option<Borrowing>, CirculationError>;

    /// Atomically transition an open borrowing to Returned.
    ///
    /// Of two racing returns exactly one succeeds; the loser gets
    /// `AlreadyReturned` without touching the record.
    async fn mark_returned(
        &self,
        id: BorrowingId,
        now: DateTime<Utc>,
    ) -> Result<Borrowing, CirculationError>;

    /// Atomically renew an open borrowing: fresh `loan_days` period from
    /// `now`, one renewal consumed. Fails with `CannotRenew` on a closed
    /// borrowing or an exhausted cap.
    async fn renew(
        &self,
        id: BorrowingId,
        now: DateTime<Utc>,
        loan_days: i64,
    ) -> Result<Borrowing, CirculationError>;

    /// Atomically flip an Active borrowing past its due date to Overdue.
    ///
    /// Returns whether anything changed; absent, closed or freshly renewed
    /// rows are a no-op, so the sweeper can never overwrite a racing return.
    async fn mark_overdue(
        &self,
        id: BorrowingId,
        now: DateTime<Utc>,
    ) -> Result<bool, CirculationError>;

    /// Open (active/overdue) borrowings held by a borrower.
    async fn count_open_for_borrower(
        &self,
        borrower_id: BorrowerId,
    ) -> Result<usize, CirculationError>;

    async fn find_open_for_pair(
        &self,
        borrower_id: BorrowerId,
        book_id: BookId,
    ) -> Result<Option<Borrowing>, CirculationError>;

    async fn list_for_borrower(
        &self,
        borrower_id: BorrowerId,
    ) -> Result<Vec<Borrowing>, CirculationError>;

    /// Active borrowings past due at `now`, oldest first, at most `limit`.
    /// Sweeper page source.
    async fn list_active_due_before(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Borrowing>, CirculationError>;

    /// All borrowings currently in the Overdue state.
    async fn list_overdue(&self) -> Result<Vec<Borrowing>, CirculationError>;
}

#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Append a new reservation.
    ///
    /// Fails with `AlreadyReserved` if the borrower already has an active
    /// (pending/ready) reservation for the same book.
    async fn insert(&self, reservation: Reservation) -> Result<(), CirculationError>;

    async fn get(&self, id: ReservationId) -> Result<Option<Reservation>, CirculationError>;

    /// Atomically cancel an unfulfilled reservation.
    async fn cancel(&self, id: ReservationId) -> Result<Reservation, CirculationError>;

    /// Atomically promote a Pending reservation to Ready, starting the
    /// pickup window. Fails with `InvalidState` from any other state, so a
    /// promotion racing a cancellation loses cleanly.
    async fn mark_ready(
        &self,
        id: ReservationId,
        now: DateTime<Utc>,
        pickup_deadline_days: i64,
    ) -> Result<Reservation, CirculationError>;

    /// Atomically close out a Ready reservation.
    async fn fulfill(
        &self,
        id: ReservationId,
        now: DateTime<Utc>,
    ) -> Result<Reservation, CirculationError>;

    /// Atomically expire an active reservation. Returns whether anything
    /// changed; absent or already-terminal rows are a no-op.
    async fn expire(&self, id: ReservationId) -> Result<bool, CirculationError>;

    async fn find_active_for_pair(
        &self,
        borrower_id: BorrowerId,
        book_id: BookId,
    ) -> Result<Option<Reservation>, CirculationError>;

    /// Active (pending/ready) reservations for a book in queue order:
    /// `created_at` ascending, id as tie-breaker.
    async fn list_active_for_book(
        &self,
        book_id: BookId,
    ) -> Result<Vec<Reservation>, CirculationError>;

    /// Active reservations whose `expires_at` has passed, oldest first, at
    /// most `limit`. Sweeper page source.
    async fn list_active_expiring_before(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reservation>, CirculationError>;
}

#[async_trait]
pub trait FineRepository: Send + Sync {
    async fn insert(&self, fine: Fine) -> Result<(), CirculationError>;

    async fn get(&self, id: FineId) -> Result<Option<Fine>, CirculationError>;

    /// Atomically apply a payment. A fully paid fine rejects further
    /// payments, so two racing final payments cannot both land.
    async fn record_payment(
        &self,
        id: FineId,
        paid: f64,
        now: DateTime<Utc>,
    ) -> Result<Fine, CirculationError>;

    /// Atomically waive an unpaid or partially paid fine.
    async fn waive(&self, id: FineId, now: DateTime<Utc>) -> Result<Fine, CirculationError>;

    async fn list_for_borrower(
        &self,
        borrower_id: BorrowerId,
    ) -> Result<Vec<Fine>, CirculationError>;
}
