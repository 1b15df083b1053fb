//! Borrowing lifecycle engine: borrow, return, renew.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{
    overdue_fine, ActorRole, Borrowing, BorrowingId, BookId, BorrowerId, CirculationError,
    CirculationPolicy, Fine, Reservation,
};
use crate::ports::{
    BookRepository, BorrowerRepository, BorrowingRepository, Clock, FineRepository, IdGenerator,
    ReservationRepository,
};

/// What a return produced besides the closed borrowing.
#[derive(Debug)]
pub struct ReturnOutcome {
    pub borrowing: Borrowing,
    /// Present iff the loan came back overdue.
    pub fine: Option<Fine>,
    /// Head reservation promoted to Ready by this return, if any.
    pub promoted: Option<Reservation>,
}

/// Orchestrates the inventory store and the circulation ledger.
///
/// Holds no state of its own beyond the injected ports; every operation
/// reads, transitions and writes back within the call.
pub struct BorrowingEngine {
    books: Arc<dyn BookRepository>,
    borrowers: Arc<dyn BorrowerRepository>,
    borrowings: Arc<dyn BorrowingRepository>,
    reservations: Arc<dyn ReservationRepository>,
    fines: Arc<dyn FineRepository>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    policy: CirculationPolicy,
}

impl BorrowingEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        books: Arc<dyn BookRepository>,
        borrowers: Arc<dyn BorrowerRepository>,
        borrowings: Arc<dyn BorrowingRepository>,
        reservations: Arc<dyn ReservationRepository>,
        fines: Arc<dyn FineRepository>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        policy: CirculationPolicy,
    ) -> Self {
        Self {
            books,
            borrowers,
            borrowings,
            reservations,
            fines,
            ids,
            clock,
            policy,
        }
    }

    /// Lend one copy of `book_id` to `borrower_id`.
    ///
    /// The availability read in the early checks is only an early exit; the
    /// conditional claim is the authoritative check and may legitimately fail
    /// even after the read said a copy was there.
    pub async fn borrow(
        &self,
        borrower_id: BorrowerId,
        book_id: BookId,
    ) -> Result<Borrowing, CirculationError> {
        let borrower = self
            .borrowers
            .get(borrower_id)
            .await?
            .ok_or(CirculationError::InactiveBorrower)?;
        if !borrower.active {
            return Err(CirculationError::InactiveBorrower);
        }
        let role_policy = borrower.role.policy();

        let held = self.borrowings.count_open_for_borrower(borrower_id).await?;
        if held >= role_policy.max_books as usize {
            return Err(CirculationError::LimitReached {
                held,
                max: role_policy.max_books,
            });
        }

        let book = self
            .books
            .get(book_id)
            .await?
            .ok_or(CirculationError::NotFound("book"))?;
        if !book.is_borrowable() {
            return Err(CirculationError::NotBorrowable(book.status));
        }

        if self
            .borrowings
            .find_open_for_pair(borrower_id, book_id)
            .await?
            .is_some()
        {
            return Err(CirculationError::AlreadyHeld);
        }

        let now = self.clock.now();
        if !self.books.try_claim_copy(book_id, now).await? {
            warn!(%borrower_id, %book_id, "claim lost the race, no copies left");
            return Err(CirculationError::NoCopiesAvailable);
        }

        let borrowing = Borrowing::new(
            self.ids.borrowing_id(),
            book_id,
            borrower_id,
            now,
            role_policy.loan_days,
            role_policy.max_renewals,
        );

        // Claim and record creation are one unit: a failed insert must give
        // the claimed copy back, or the decrement is orphaned.
        if let Err(err) = self.borrowings.insert(borrowing.clone()).await {
            self.books.release_copy(book_id, now).await?;
            return Err(err);
        }

        info!(%borrower_id, %book_id, borrowing = %borrowing.id, due = %borrowing.due_date, "copy lent");
        Ok(borrowing)
    }

    /// Close a loan, release the copy, settle fines, promote the queue head.
    pub async fn return_book(
        &self,
        borrower_id: BorrowerId,
        borrowing_id: BorrowingId,
        actor_role: ActorRole,
    ) -> Result<ReturnOutcome, CirculationError> {
        let borrowing = self
            .borrowings
            .get(borrowing_id)
            .await?
            .ok_or(CirculationError::NotFound("borrowing"))?;
        authorize(&borrowing, borrower_id, actor_role)?;

        // The conditional transition is the authoritative duplicate check:
        // of two racing returns only one gets past this line, so the copy is
        // released exactly once.
        let now = self.clock.now();
        let borrowing = self.borrowings.mark_returned(borrowing_id, now).await?;
        let was_overdue = now > borrowing.due_date;

        self.books.release_copy(borrowing.book_id, now).await?;

        let promoted = self.promote_queue_head(borrowing.book_id).await?;

        let fine = if was_overdue {
            let days = crate::domain::days_overdue(borrowing.due_date, now).max(1);
            let amount = overdue_fine(borrowing.due_date, now, self.policy.fine_per_day)
                .max(self.policy.fine_per_day);
            let fine = Fine::new(
                self.ids.fine_id(),
                borrowing.id,
                borrowing.borrower_id,
                amount,
                format!("Overdue by {days} day(s)"),
                now,
            );
            self.fines.insert(fine.clone()).await?;
            info!(borrowing = %borrowing.id, amount, days, "overdue return fined");
            Some(fine)
        } else {
            None
        };

        info!(borrowing = %borrowing.id, book = %borrowing.book_id, "copy returned");
        Ok(ReturnOutcome {
            borrowing,
            fine,
            promoted,
        })
    }

    /// Renew a loan: a fresh full period from now, one renewal consumed.
    pub async fn renew(
        &self,
        borrower_id: BorrowerId,
        borrowing_id: BorrowingId,
        actor_role: ActorRole,
    ) -> Result<Borrowing, CirculationError> {
        let borrowing = self
            .borrowings
            .get(borrowing_id)
            .await?
            .ok_or(CirculationError::NotFound("borrowing"))?;
        authorize(&borrowing, borrower_id, actor_role)?;

        if self.policy.block_renewal_when_reserved {
            let queue = self
                .reservations
                .list_active_for_book(borrowing.book_id)
                .await?;
            if !queue.is_empty() {
                return Err(CirculationError::CannotRenew(format!(
                    "{} reservation(s) waiting on this book",
                    queue.len()
                )));
            }
        }

        let owner = self
            .borrowers
            .get(borrowing.borrower_id)
            .await?
            .ok_or(CirculationError::NotFound("borrower"))?;

        let now = self.clock.now();
        let borrowing = self
            .borrowings
            .renew(borrowing_id, now, owner.role.policy().loan_days)
            .await?;

        info!(borrowing = %borrowing.id, due = %borrowing.due_date, renewed = borrowing.renewed_count, "loan renewed");
        Ok(borrowing)
    }

    pub async fn get_borrowing(
        &self,
        borrower_id: BorrowerId,
        borrowing_id: BorrowingId,
        actor_role: ActorRole,
    ) -> Result<Borrowing, CirculationError> {
        let borrowing = self
            .borrowings
            .get(borrowing_id)
            .await?
            .ok_or(CirculationError::NotFound("borrowing"))?;
        authorize(&borrowing, borrower_id, actor_role)?;
        Ok(borrowing)
    }

    pub async fn list_borrowings(
        &self,
        borrower_id: BorrowerId,
    ) -> Result<Vec<Borrowing>, CirculationError> {
        self.borrowings.list_for_borrower(borrower_id).await
    }

    /// All borrowings the sweeper has marked overdue.
    pub async fn list_overdue(&self) -> Result<Vec<Borrowing>, CirculationError> {
        self.borrowings.list_overdue().await
    }

    /// Fine the loan would incur if returned right now.
    pub async fn estimate_fine(
        &self,
        borrower_id: BorrowerId,
        borrowing_id: BorrowingId,
        actor_role: ActorRole,
    ) -> Result<f64, CirculationError> {
        let borrowing = self.get_borrowing(borrower_id, borrowing_id, actor_role).await?;
        Ok(overdue_fine(
            borrowing.due_date,
            self.clock.now(),
            self.policy.fine_per_day,
        ))
    }

    /// Promote the queue head to Ready if it is still Pending.
    ///
    /// A head already in Ready means a previous return promoted it and the
    /// pickup window is running; nothing to do.
    async fn promote_queue_head(
        &self,
        book_id: BookId,
    ) -> Result<Option<Reservation>, CirculationError> {
        let queue = self.reservations.list_active_for_book(book_id).await?;
        let Some(head) = queue.into_iter().next() else {
            return Ok(None);
        };
        if head.status != crate::domain::ReservationStatus::Pending {
            return Ok(None);
        }
        let now = self.clock.now();
        match self
            .reservations
            .mark_ready(head.id, now, self.policy.pickup_deadline_days)
            .await
        {
            Ok(head) => {
                debug!(reservation = %head.id, %book_id, pickup_until = %head.expires_at, "queue head promoted to ready");
                Ok(Some(head))
            }
            // The head moved on between the listing and the write.
            Err(CirculationError::InvalidState(_)) | Err(CirculationError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

fn authorize(
    borrowing: &Borrowing,
    borrower_id: BorrowerId,
    actor_role: ActorRole,
) -> Result<(), CirculationError> {
    if actor_role == ActorRole::Admin || borrowing.borrower_id == borrower_id {
        Ok(())
    } else {
        Err(CirculationError::Forbidden)
    }
}
