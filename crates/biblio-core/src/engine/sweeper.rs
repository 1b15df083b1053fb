//! Background sweeper: marks overdue loans and expires stale reservations.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::domain::{CirculationError, CirculationPolicy};
use crate::engine::ReservationEngine;
use crate::ports::{BorrowingRepository, Clock};

/// One sweep pass over the ledger.
///
/// Both sweeps are idempotent: a transitioned row stops matching the scan,
/// so re-running after a crash or overlap repeats no work.
pub struct Sweeper {
    borrowings: Arc<dyn BorrowingRepository>,
    reservations: Arc<ReservationEngine>,
    clock: Arc<dyn Clock>,
    policy: CirculationPolicy,
}

/// What a single sweep pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub marked_overdue: usize,
    pub expired_reservations: usize,
}

impl Sweeper {
    pub fn new(
        borrowings: Arc<dyn BorrowingRepository>,
        reservations: Arc<ReservationEngine>,
        clock: Arc<dyn Clock>,
        policy: CirculationPolicy,
    ) -> Self {
        Self {
            borrowings,
            reservations,
            clock,
            policy,
        }
    }

    /// Run both sweeps once.
    pub async fn run_once(&self) -> Result<SweepReport, CirculationError> {
        let marked_overdue = self.mark_overdue_borrowings().await?;
        let expired_reservations = self.expire_overdue_reservations().await?;
        Ok(SweepReport {
            marked_overdue,
            expired_reservations,
        })
    }

    /// Expire reservations whose deadline has passed.
    pub async fn expire_overdue_reservations(&self) -> Result<usize, CirculationError> {
        self.reservations.expire_overdue().await
    }

    /// Flip every active loan past its due date to Overdue.
    ///
    /// Scans bounded pages; rows flipped by one page leave the filter before
    /// the next page is fetched, so the walk terminates.
    pub async fn mark_overdue_borrowings(&self) -> Result<usize, CirculationError> {
        let now = self.clock.now();
        let page = self.policy.sweep_page_size;
        let mut marked = 0;

        loop {
            let batch = self.borrowings.list_active_due_before(now, page).await?;
            if batch.is_empty() {
                break;
            }
            let short_page = batch.len() < page;
            for stale in batch {
                // Conditional: a return that raced the scan wins and the
                // row is left alone.
                if self.borrowings.mark_overdue(stale.id, now).await? {
                    marked += 1;
                    debug!(borrowing = %stale.id, due = %stale.due_date, "loan marked overdue");
                }
            }
            if short_page {
                break;
            }
        }

        if marked > 0 {
            info!(marked, "overdue sweep finished");
        }
        Ok(marked)
    }
}

/// Handle to a periodically running sweeper task.
/// - dropping `shutdown_tx` stops the loop
/// - `shutdown_and_join()` waits for the in-flight pass to finish
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Spawn the sweep loop with the given interval between passes.
    pub fn spawn(sweeper: Sweeper, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            sweep_loop(sweeper, interval, shutdown_rx).await;
        });

        Self { shutdown_tx, join }
    }

    /// Request shutdown. An in-flight pass runs to completion; no new pass
    /// starts afterwards.
    pub fn request_shutdown(&self) {
        // ignore send error: the receiver may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for the loop to exit.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

async fn sweep_loop(sweeper: Sweeper, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                // Err means the sender is gone: the handle was dropped
                // without an explicit shutdown. Stop rather than spin.
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        match sweeper.run_once().await {
            Ok(report) => {
                if report.marked_overdue > 0 || report.expired_reservations > 0 {
                    info!(
                        marked_overdue = report.marked_overdue,
                        expired_reservations = report.expired_reservations,
                        "sweep pass applied changes"
                    );
                }
            }
            Err(err) => {
                // A failed pass is retried on the next tick.
                error!(%err, "sweep pass failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Book, Borrower, BorrowerRole, Borrowing, BorrowingStatus, BookId, BorrowerId,
        BorrowingId,
    };
    use crate::ports::{
        BookRepository, BorrowerRepository, FixedClock, IdGenerator, ReservationRepository,
        UlidGenerator,
    };
    use crate::store::InMemoryStore;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

    struct Fixture {
        store: InMemoryStore,
        clock: Arc<FixedClock>,
        sweeper: Sweeper,
    }

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap()
    }

    fn fixture(policy: CirculationPolicy) -> Fixture {
        let store = InMemoryStore::new();
        let clock = Arc::new(FixedClock::new(start_time()));
        let ids = Arc::new(UlidGenerator::new(clock.clone()));
        let reservations = Arc::new(ReservationEngine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            ids,
            clock.clone(),
            policy.clone(),
        ));
        let sweeper = Sweeper::new(
            Arc::new(store.clone()),
            reservations,
            clock.clone(),
            policy,
        );
        Fixture {
            store,
            clock,
            sweeper,
        }
    }

    impl Fixture {
        async fn seed_loan(&self, loan_days: i64) -> BorrowingId {
            let ids = UlidGenerator::new(self.clock.clone());
            let borrower_id = BorrowerId::from_ulid(ulid::Ulid::new());
            BorrowerRepository::insert(
                &self.store,
                Borrower::new(borrower_id, "Kay", BorrowerRole::Student, self.clock.now()),
            )
            .await
            .unwrap();

            let book_id = BookId::from_ulid(ulid::Ulid::new());
            let mut book = Book::new(
                book_id,
                format!("isbn-{book_id}"),
                "Foundation",
                "Asimov",
                1,
                self.clock.now(),
            );
            assert!(book.try_claim_copy(self.clock.now()));
            BookRepository::insert(&self.store, book).await.unwrap();

            let loan = Borrowing::new(
                ids.borrowing_id(),
                book_id,
                borrower_id,
                self.clock.now(),
                loan_days,
                2,
            );
            let id = loan.id;
            BorrowingRepository::insert(&self.store, loan).await.unwrap();
            id
        }

        async fn loan(&self, id: BorrowingId) -> Borrowing {
            BorrowingRepository::get(&self.store, id)
                .await
                .unwrap()
                .unwrap()
        }
    }

    #[tokio::test]
    async fn sweep_marks_only_loans_past_due() {
        let fx = fixture(CirculationPolicy::default());
        let short = fx.seed_loan(5).await;
        let long = fx.seed_loan(30).await;

        fx.clock.advance(ChronoDuration::days(6));
        assert_eq!(fx.sweeper.mark_overdue_borrowings().await.unwrap(), 1);

        assert_eq!(fx.loan(short).await.status, BorrowingStatus::Overdue);
        assert_eq!(fx.loan(long).await.status, BorrowingStatus::Active);

        // Second pass finds nothing left to flip.
        assert_eq!(fx.sweeper.mark_overdue_borrowings().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sweep_walks_a_backlog_in_small_pages() {
        let fx = fixture(CirculationPolicy {
            sweep_page_size: 2,
            ..CirculationPolicy::default()
        });

        for _ in 0..5 {
            fx.seed_loan(5).await;
        }
        fx.clock.advance(ChronoDuration::days(10));

        let report = fx.sweeper.run_once().await.unwrap();
        assert_eq!(report.marked_overdue, 5);
        assert_eq!(report.expired_reservations, 0);

        let counts = fx.store.counts().await;
        assert_eq!(counts.overdue_borrowings, 5);
        assert_eq!(counts.active_borrowings, 0);
    }

    #[tokio::test]
    async fn run_once_covers_reservation_expiry_too() {
        let fx = fixture(CirculationPolicy::default());

        let book_id = BookId::from_ulid(ulid::Ulid::new());
        let mut book = Book::new(book_id, "isbn-e", "Dawn", "Butler", 1, fx.clock.now());
        assert!(book.try_claim_copy(fx.clock.now()));
        BookRepository::insert(&fx.store, book).await.unwrap();

        let borrower_id = BorrowerId::from_ulid(ulid::Ulid::new());
        BorrowerRepository::insert(
            &fx.store,
            Borrower::new(borrower_id, "Una", BorrowerRole::Student, fx.clock.now()),
        )
        .await
        .unwrap();
        ReservationRepository::insert(
            &fx.store,
            crate::domain::Reservation::new(
                crate::domain::ReservationId::from_ulid(ulid::Ulid::new()),
                book_id,
                borrower_id,
                fx.clock.now(),
                7,
            ),
        )
        .await
        .unwrap();

        fx.clock.advance(ChronoDuration::days(8));
        let report = fx.sweeper.run_once().await.unwrap();
        assert_eq!(report.expired_reservations, 1);
    }

    #[tokio::test]
    async fn sweep_leaves_returned_loans_alone() {
        let fx = fixture(CirculationPolicy::default());
        let loan = fx.seed_loan(5).await;

        fx.clock.advance(ChronoDuration::days(6));
        BorrowingRepository::mark_returned(&fx.store, loan, fx.clock.now())
            .await
            .unwrap();

        assert_eq!(fx.sweeper.mark_overdue_borrowings().await.unwrap(), 0);
        assert_eq!(fx.loan(loan).await.status, BorrowingStatus::Returned);
    }

    #[tokio::test]
    async fn loop_stops_when_the_sender_is_dropped() {
        let fx = fixture(CirculationPolicy::default());
        let Fixture { sweeper, .. } = fx;

        let (tx, rx) = watch::channel(false);
        drop(tx);

        // Without the sender the loop must exit, not spin forever.
        tokio::time::timeout(
            Duration::from_secs(1),
            sweep_loop(sweeper, Duration::from_millis(5), rx),
        )
        .await
        .expect("sweep loop should exit once the sender is gone");
    }

    #[tokio::test]
    async fn handle_spawns_and_shuts_down_cleanly() {
        let fx = fixture(CirculationPolicy::default());
        let loan = fx.seed_loan(5).await;
        fx.clock.advance(ChronoDuration::days(6));

        let Fixture { store, sweeper, .. } = fx;
        let handle = SweeperHandle::spawn(sweeper, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown_and_join().await;

        let rec = BorrowingRepository::get(&store, loan).await.unwrap().unwrap();
        assert_eq!(rec.status, BorrowingStatus::Overdue);
    }
}
