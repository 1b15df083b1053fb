//! Reservation queue engine: place, cancel, promote, fulfill, expire.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{
    ActorRole, BookId, BorrowerId, CirculationError, CirculationPolicy, Reservation,
    ReservationId, ReservationStatus,
};
use crate::ports::{BookRepository, BorrowerRepository, Clock, IdGenerator, ReservationRepository};

/// Where a reservation sits in its book's queue.
///
/// Computed from creation order at read time; cancellations ahead of a
/// reservation shrink `position` without any stored renumbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePosition {
    /// 1-based rank. 1 is next in line.
    pub position: usize,
    pub total: usize,
}

pub struct ReservationEngine {
    books: Arc<dyn BookRepository>,
    borrowers: Arc<dyn BorrowerRepository>,
    reservations: Arc<dyn ReservationRepository>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    policy: CirculationPolicy,
}

impl ReservationEngine {
    pub fn new(
        books: Arc<dyn BookRepository>,
        borrowers: Arc<dyn BorrowerRepository>,
        reservations: Arc<dyn ReservationRepository>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        policy: CirculationPolicy,
    ) -> Self {
        Self {
            books,
            borrowers,
            reservations,
            ids,
            clock,
            policy,
        }
    }

    /// Join the queue for a book with no copies on the shelf.
    pub async fn create(
        &self,
        borrower_id: BorrowerId,
        book_id: BookId,
    ) -> Result<Reservation, CirculationError> {
        let borrower = self
            .borrowers
            .get(borrower_id)
            .await?
            .ok_or(CirculationError::InactiveBorrower)?;
        if !borrower.active {
            return Err(CirculationError::InactiveBorrower);
        }

        let book = self
            .books
            .get(book_id)
            .await?
            .ok_or(CirculationError::NotFound("book"))?;
        if book.available_copies > 0 {
            // A copy is on the shelf; reserving it would just park inventory.
            return Err(CirculationError::AlreadyAvailable);
        }

        if self
            .reservations
            .find_active_for_pair(borrower_id, book_id)
            .await?
            .is_some()
        {
            return Err(CirculationError::AlreadyReserved);
        }

        let now = self.clock.now();
        let reservation = Reservation::new(
            self.ids.reservation_id(),
            book_id,
            borrower_id,
            now,
            self.policy.reservation_expiry_days,
        );
        self.reservations.insert(reservation.clone()).await?;

        info!(reservation = %reservation.id, %book_id, %borrower_id, "reservation placed");
        Ok(reservation)
    }

    /// Cancel an active reservation. Only the holder (or an admin) may.
    pub async fn cancel(
        &self,
        borrower_id: BorrowerId,
        reservation_id: ReservationId,
        actor_role: ActorRole,
    ) -> Result<Reservation, CirculationError> {
        let reservation = self
            .reservations
            .get(reservation_id)
            .await?
            .ok_or(CirculationError::NotFound("reservation"))?;
        if actor_role != ActorRole::Admin && reservation.borrower_id != borrower_id {
            return Err(CirculationError::Forbidden);
        }

        // Conditional at the store so a racing promotion cannot be undone.
        let reservation = self.reservations.cancel(reservation_id).await?;

        info!(reservation = %reservation.id, "reservation cancelled");
        Ok(reservation)
    }

    /// Flag a pending reservation as ready for pickup, starting the
    /// pickup-deadline window.
    pub async fn mark_ready(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Reservation, CirculationError> {
        let now = self.clock.now();
        let reservation = self
            .reservations
            .mark_ready(reservation_id, now, self.policy.pickup_deadline_days)
            .await?;

        info!(reservation = %reservation.id, pickup_until = %reservation.expires_at, "reservation ready for pickup");
        Ok(reservation)
    }

    /// Close out a ready reservation when the holder picks the copy up.
    pub async fn fulfill(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Reservation, CirculationError> {
        let reservation = self
            .reservations
            .fulfill(reservation_id, self.clock.now())
            .await?;

        info!(reservation = %reservation.id, "reservation fulfilled");
        Ok(reservation)
    }

    pub async fn get(
        &self,
        borrower_id: BorrowerId,
        reservation_id: ReservationId,
        actor_role: ActorRole,
    ) -> Result<Reservation, CirculationError> {
        let reservation = self
            .reservations
            .get(reservation_id)
            .await?
            .ok_or(CirculationError::NotFound("reservation"))?;
        if actor_role != ActorRole::Admin && reservation.borrower_id != borrower_id {
            return Err(CirculationError::Forbidden);
        }
        Ok(reservation)
    }

    /// Rank of an active reservation within its book's queue.
    ///
    /// `None` when the reservation has left the queue (cancelled, fulfilled
    /// or expired).
    pub async fn queue_position(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<QueuePosition>, CirculationError> {
        let reservation = self
            .reservations
            .get(reservation_id)
            .await?
            .ok_or(CirculationError::NotFound("reservation"))?;
        if !reservation.is_active() {
            return Ok(None);
        }

        let queue = self
            .reservations
            .list_active_for_book(reservation.book_id)
            .await?;
        let total = queue.len();
        let position = queue
            .iter()
            .position(|r| r.id == reservation_id)
            .map(|i| i + 1);
        Ok(position.map(|position| QueuePosition { position, total }))
    }

    /// Expire every active reservation whose deadline has passed.
    ///
    /// Walks bounded pages so a large backlog never pins the store; safe to
    /// run again at any time, expired rows simply stop matching.
    pub async fn expire_overdue(&self) -> Result<usize, CirculationError> {
        let now = self.clock.now();
        let page = self.policy.sweep_page_size;
        let mut expired = 0;

        loop {
            let batch = self
                .reservations
                .list_active_expiring_before(now, page)
                .await?;
            if batch.is_empty() {
                break;
            }
            let short_page = batch.len() < page;
            for stale in batch {
                // Conditional: a row that moved on between the page read and
                // this write is left alone.
                if self.reservations.expire(stale.id).await? {
                    expired += 1;
                    debug!(reservation = %stale.id, book = %stale.book_id, "reservation expired");
                }
            }
            if short_page {
                break;
            }
        }

        if expired > 0 {
            info!(expired, "reservation expiry sweep finished");
        }
        Ok(expired)
    }
}
