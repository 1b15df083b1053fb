//! In-memory store implementing every repository port.
//!
//! One `tokio::sync::Mutex` guards the whole ledger, so each repository
//! primitive runs as an indivisible unit. `try_claim_copy` is a conditional
//! decrement under the lock, the in-memory equivalent of
//! `UPDATE books SET available = available - 1 WHERE id = ? AND available > 0`.
//! Lifecycle transitions apply the domain mutator on the stored record under
//! the same lock, so the state check and the write cannot interleave with
//! another caller, and the insert backstops check uniqueness and write in
//! one step.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{
    Book, BookId, Borrower, BorrowerId, Borrowing, BorrowingId, BorrowingStatus, CirculationError,
    Fine, FineId, FineStatus, Reservation, ReservationId, ReservationStatus,
};
use crate::observability::LedgerCounts;
use crate::ports::{
    BookRepository, BorrowerRepository, BorrowingRepository, FineRepository,
    ReservationRepository,
};

/// The ledger proper: single source of truth for all record families.
#[derive(Default)]
struct LedgerState {
    books: HashMap<BookId, Book>,
    isbn_index: HashMap<String, BookId>,
    borrowers: HashMap<BorrowerId, Borrower>,
    borrowings: HashMap<BorrowingId, Borrowing>,
    reservations: HashMap<ReservationId, Reservation>,
    fines: HashMap<FineId, Fine>,
}

impl LedgerState {
    fn counts(&self) -> LedgerCounts {
        let mut counts = LedgerCounts {
            books: self.books.len(),
            ..LedgerCounts::default()
        };
        for b in self.borrowings.values() {
            match b.status {
                BorrowingStatus::Active => counts.active_borrowings += 1,
                BorrowingStatus::Overdue => counts.overdue_borrowings += 1,
                BorrowingStatus::Returned => counts.returned_borrowings += 1,
                BorrowingStatus::Lost => {}
            }
        }
        for r in self.reservations.values() {
            match r.status {
                ReservationStatus::Pending => counts.pending_reservations += 1,
                ReservationStatus::Ready => counts.ready_reservations += 1,
                _ => {}
            }
        }
        counts.unpaid_fines = self
            .fines
            .values()
            .filter(|f| f.status != FineStatus::Paid)
            .count();
        counts
    }
}

/// Shared in-memory ledger. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn counts(&self) -> LedgerCounts {
        self.state.lock().await.counts()
    }
}

#[async_trait]
impl BookRepository for InMemoryStore {
    async fn insert(&self, book: Book) -> Result<(), CirculationError> {
        let mut state = self.state.lock().await;
        if state.isbn_index.contains_key(&book.isbn) {
            return Err(CirculationError::InvalidState(format!(
                "isbn {} already cataloged",
                book.isbn
            )));
        }
        state.isbn_index.insert(book.isbn.clone(), book.id);
        state.books.insert(book.id, book);
        Ok(())
    }

    async fn get(&self, id: BookId) -> Result<Option<Book>, CirculationError> {
        let state = self.state.lock().await;
        Ok(state.books.get(&id).cloned())
    }

    async fn find_by_isbn(&self, isbn: &str) -> Result<Option<Book>, CirculationError> {
        let state = self.state.lock().await;
        Ok(state
            .isbn_index
            .get(isbn)
            .and_then(|id| state.books.get(id))
            .cloned())
    }

    async fn try_claim_copy(
        &self,
        id: BookId,
        now: DateTime<Utc>,
    ) -> Result<bool, CirculationError> {
        let mut state = self.state.lock().await;
        let book = state
            .books
            .get_mut(&id)
            .ok_or(CirculationError::NotFound("book"))?;
        Ok(book.try_claim_copy(now))
    }

    async fn release_copy(&self, id: BookId, now: DateTime<Utc>) -> Result<(), CirculationError> {
        let mut state = self.state.lock().await;
        let book = state
            .books
            .get_mut(&id)
            .ok_or(CirculationError::NotFound("book"))?;
        book.release_copy(now);
        Ok(())
    }

    async fn adjust_inventory(
        &self,
        id: BookId,
        delta: i64,
        now: DateTime<Utc>,
    ) -> Result<Book, CirculationError> {
        let mut state = self.state.lock().await;
        let book = state
            .books
            .get_mut(&id)
            .ok_or(CirculationError::NotFound("book"))?;
        book.adjust_inventory(delta, now)?;
        Ok(book.clone())
    }
}

#[async_trait]
impl BorrowerRepository for InMemoryStore {
    async fn insert(&self, borrower: Borrower) -> Result<(), CirculationError> {
        let mut state = self.state.lock().await;
        state.borrowers.insert(borrower.id, borrower);
        Ok(())
    }

    async fn get(&self, id: BorrowerId) -> Result<Option<Borrower>, CirculationError> {
        let state = self.state.lock().await;
        Ok(state.borrowers.get(&id).cloned())
    }
}

#[async_trait]
impl BorrowingRepository for InMemoryStore {
    async fn insert(&self, borrowing: Borrowing) -> Result<(), CirculationError> {
        let mut state = self.state.lock().await;
        // Uniqueness backstop: one open borrowing per (borrower, book).
        let duplicate = state.borrowings.values().any(|b| {
            b.borrower_id == borrowing.borrower_id
                && b.book_id == borrowing.book_id
                && b.is_open()
        });
        if duplicate {
            return Err(CirculationError::AlreadyHeld);
        }
        state.borrowings.insert(borrowing.id, borrowing);
        Ok(())
    }

    async fn get(&self, id: BorrowingId) -> Result<Option<Borrowing>, CirculationError> {
        let state = self.state.lock().await;
        Ok(state.borrowings.get(&id).cloned())
    }

    async fn mark_returned(
        &self,
        id: BorrowingId,
        now: DateTime<Utc>,
    ) -> Result<Borrowing, CirculationError> {
        let mut state = self.state.lock().await;
        let borrowing = state
            .borrowings
            .get_mut(&id)
            .ok_or(CirculationError::NotFound("borrowing"))?;
        borrowing.mark_returned(now)?;
        Ok(borrowing.clone())
    }

    async fn renew(
        &self,
        id: BorrowingId,
        now: DateTime<Utc>,
        loan_days: i64,
    ) -> Result<Borrowing, CirculationError> {
        let mut state = self.state.lock().await;
        let borrowing = state
            .borrowings
            .get_mut(&id)
            .ok_or(CirculationError::NotFound("borrowing"))?;
        borrowing.renew(now, loan_days)?;
        Ok(borrowing.clone())
    }

    async fn mark_overdue(
        &self,
        id: BorrowingId,
        now: DateTime<Utc>,
    ) -> Result<bool, CirculationError> {
        let mut state = self.state.lock().await;
        let Some(borrowing) = state.borrowings.get_mut(&id) else {
            return Ok(false);
        };
        Ok(borrowing.mark_overdue(now))
    }

    async fn count_open_for_borrower(
        &self,
        borrower_id: BorrowerId,
    ) -> Result<usize, CirculationError> {
        let state = self.state.lock().await;
        Ok(state
            .borrowings
            .values()
            .filter(|b| b.borrower_id == borrower_id && b.is_open())
            .count())
    }

    async fn find_open_for_pair(
        &self,
        borrower_id: BorrowerId,
        book_id: BookId,
    ) -> Result<Option<Borrowing>, CirculationError> {
        let state = self.state.lock().await;
        Ok(state
            .borrowings
            .values()
            .find(|b| b.borrower_id == borrower_id && b.book_id == book_id && b.is_open())
            .cloned())
    }

    async fn list_for_borrower(
        &self,
        borrower_id: BorrowerId,
    ) -> Result<Vec<Borrowing>, CirculationError> {
        let state = self.state.lock().await;
        let mut out: Vec<Borrowing> = state
            .borrowings
            .values()
            .filter(|b| b.borrower_id == borrower_id)
            .cloned()
            .collect();
        out.sort_by_key(|b| (b.borrowed_at, b.id));
        Ok(out)
    }

    async fn list_active_due_before(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Borrowing>, CirculationError> {
        let state = self.state.lock().await;
        let mut out: Vec<Borrowing> = state
            .borrowings
            .values()
            .filter(|b| b.status == BorrowingStatus::Active && b.due_date < now)
            .cloned()
            .collect();
        out.sort_by_key(|b| (b.due_date, b.id));
        out.truncate(limit);
        Ok(out)
    }

    async fn list_overdue(&self) -> Result<Vec<Borrowing>, CirculationError> {
        let state = self.state.lock().await;
        let mut out: Vec<Borrowing> = state
            .borrowings
            .values()
            .filter(|b| b.status == BorrowingStatus::Overdue)
            .cloned()
            .collect();
        out.sort_by_key(|b| (b.due_date, b.id));
        Ok(out)
    }
}

#[async_trait]
impl ReservationRepository for InMemoryStore {
    async fn insert(&self, reservation: Reservation) -> Result<(), CirculationError> {
        let mut state = self.state.lock().await;
        // Uniqueness backstop: one active reservation per (borrower, book).
        let duplicate = state.reservations.values().any(|r| {
            r.borrower_id == reservation.borrower_id
                && r.book_id == reservation.book_id
                && r.is_active()
        });
        if duplicate {
            return Err(CirculationError::AlreadyReserved);
        }
        state.reservations.insert(reservation.id, reservation);
        Ok(())
    }

    async fn get(&self, id: ReservationId) -> Result<Option<Reservation>, CirculationError> {
        let state = self.state.lock().await;
        Ok(state.reservations.get(&id).cloned())
    }

    async fn cancel(&self, id: ReservationId) -> Result<Reservation, CirculationError> {
        let mut state = self.state.lock().await;
        let reservation = state
            .reservations
            .get_mut(&id)
            .ok_or(CirculationError::NotFound("reservation"))?;
        reservation.cancel()?;
        Ok(reservation.clone())
    }

    async fn mark_ready(
        &self,
        id: ReservationId,
        now: DateTime<Utc>,
        pickup_deadline_days: i64,
    ) -> Result<Reservation, CirculationError> {
        let mut state = self.state.lock().await;
        let reservation = state
            .reservations
            .get_mut(&id)
            .ok_or(CirculationError::NotFound("reservation"))?;
        reservation.mark_ready(now, pickup_deadline_days)?;
        Ok(reservation.clone())
    }

    async fn fulfill(
        &self,
        id: ReservationId,
        now: DateTime<Utc>,
    ) -> Result<Reservation, CirculationError> {
        let mut state = self.state.lock().await;
        let reservation = state
            .reservations
            .get_mut(&id)
            .ok_or(CirculationError::NotFound("reservation"))?;
        reservation.fulfill(now)?;
        Ok(reservation.clone())
    }

    async fn expire(&self, id: ReservationId) -> Result<bool, CirculationError> {
        let mut state = self.state.lock().await;
        let Some(reservation) = state.reservations.get_mut(&id) else {
            return Ok(false);
        };
        Ok(reservation.expire())
    }

    async fn find_active_for_pair(
        &self,
        borrower_id: BorrowerId,
        book_id: BookId,
    ) -> Result<Option<Reservation>, CirculationError> {
        let state = self.state.lock().await;
        Ok(state
            .reservations
            .values()
            .find(|r| r.borrower_id == borrower_id && r.book_id == book_id && r.is_active())
            .cloned())
    }

    async fn list_active_for_book(
        &self,
        book_id: BookId,
    ) -> Result<Vec<Reservation>, CirculationError> {
        let state = self.state.lock().await;
        let mut out: Vec<Reservation> = state
            .reservations
            .values()
            .filter(|r| r.book_id == book_id && r.is_active())
            .cloned()
            .collect();
        // Queue order: creation time, ULID as tie-breaker.
        out.sort_by_key(|r| (r.created_at, r.id));
        Ok(out)
    }

    async fn list_active_expiring_before(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reservation>, CirculationError> {
        let state = self.state.lock().await;
        let mut out: Vec<Reservation> = state
            .reservations
            .values()
            .filter(|r| r.is_active() && r.expires_at < now)
            .cloned()
            .collect();
        out.sort_by_key(|r| (r.expires_at, r.id));
        out.truncate(limit);
        Ok(out)
    }
}

#[async_trait]
impl FineRepository for InMemoryStore {
    async fn insert(&self, fine: Fine) -> Result<(), CirculationError> {
        let mut state = self.state.lock().await;
        state.fines.insert(fine.id, fine);
        Ok(())
    }

    async fn get(&self, id: FineId) -> Result<Option<Fine>, CirculationError> {
        let state = self.state.lock().await;
        Ok(state.fines.get(&id).cloned())
    }

    async fn record_payment(
        &self,
        id: FineId,
        paid: f64,
        now: DateTime<Utc>,
    ) -> Result<Fine, CirculationError> {
        let mut state = self.state.lock().await;
        let fine = state
            .fines
            .get_mut(&id)
            .ok_or(CirculationError::NotFound("fine"))?;
        fine.record_payment(paid, now)?;
        Ok(fine.clone())
    }

    async fn waive(&self, id: FineId, now: DateTime<Utc>) -> Result<Fine, CirculationError> {
        let mut state = self.state.lock().await;
        let fine = state
            .fines
            .get_mut(&id)
            .ok_or(CirculationError::NotFound("fine"))?;
        fine.waive(now)?;
        Ok(fine.clone())
    }

    async fn list_for_borrower(
        &self,
        borrower_id: BorrowerId,
    ) -> Result<Vec<Fine>, CirculationError> {
        let state = self.state.lock().await;
        let mut out: Vec<Fine> = state
            .fines
            .values()
            .filter(|f| f.borrower_id == borrower_id)
            .cloned()
            .collect();
        out.sort_by_key(|f| (f.created_at, f.id));
        Ok(out)
    }
}
