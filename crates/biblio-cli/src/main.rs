use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use tracing::info;

use biblio_core::domain::{ActorRole, Book, Borrower, BorrowerRole};
use biblio_core::engine::{BorrowingEngine, ReservationEngine, Sweeper, SweeperHandle};
use biblio_core::ports::{
    BookRepository, BorrowerRepository, Clock, FixedClock, IdGenerator, UlidGenerator,
};
use biblio_core::store::InMemoryStore;
use biblio_core::{CirculationError, CirculationPolicy};

/// Walks one copy of a book through a full circulation cycle: borrow,
/// reservation queue, overdue sweep, fined return, pickup promotion.
#[tokio::main]
async fn main() -> Result<(), CirculationError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let store = InMemoryStore::new();
    // Driven clock so the demo can jump straight past the due date.
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
            .single()
            .ok_or_else(|| CirculationError::InvalidState("bad demo start time".to_string()))?,
    ));
    let ids = Arc::new(UlidGenerator::new(clock.clone()));
    let policy = CirculationPolicy::default();

    let borrowing_engine = BorrowingEngine::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        ids.clone(),
        clock.clone(),
        policy.clone(),
    );
    let reservation_engine = Arc::new(ReservationEngine::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        ids.clone(),
        clock.clone(),
        policy.clone(),
    ));

    // (A) Catalog one single-copy title and two borrowers.
    let book_id = ids.book_id();
    BookRepository::insert(
        &store,
        Book::new(
            book_id,
            "978-0441013593",
            "Dune",
            "Frank Herbert",
            1,
            clock.now(),
        ),
    )
    .await?;

    let ada = ids.borrower_id();
    BorrowerRepository::insert(
        &store,
        Borrower::new(ada, "Ada", BorrowerRole::Student, clock.now()),
    )
    .await?;
    let grace = ids.borrower_id();
    BorrowerRepository::insert(
        &store,
        Borrower::new(grace, "Grace", BorrowerRole::Faculty, clock.now()),
    )
    .await?;

    // (B) Ada takes the last copy; Grace joins the queue.
    let loan = borrowing_engine.borrow(ada, book_id).await?;
    println!("Ada borrowed, due {}", loan.due_date);

    let reservation = reservation_engine.create(grace, book_id).await?;
    let pos = reservation_engine
        .queue_position(reservation.id)
        .await?
        .ok_or_else(|| CirculationError::InvalidState("reservation left queue".to_string()))?;
    println!("Grace queued at {}/{}", pos.position, pos.total);

    // (C) Time passes the due date; the background sweeper flags the loan.
    clock.advance(ChronoDuration::days(36));
    let sweeper = Sweeper::new(
        Arc::new(store.clone()),
        reservation_engine.clone(),
        clock.clone(),
        policy,
    );
    let handle = SweeperHandle::spawn(sweeper, Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.shutdown_and_join().await;

    for overdue in borrowing_engine.list_overdue().await? {
        println!("overdue: {} (due {})", overdue.id, overdue.due_date);
    }

    // The same sweep expired Grace's week-old reservation; she queues again.
    if reservation_engine.queue_position(reservation.id).await?.is_none() {
        println!("Grace's reservation expired while the copy was out");
    }
    let reservation = reservation_engine.create(grace, book_id).await?;

    // (D) Ada returns late: fine assessed, Grace promoted to pickup.
    let outcome = borrowing_engine
        .return_book(ada, loan.id, ActorRole::Borrower)
        .await?;
    if let Some(fine) = &outcome.fine {
        println!("fine for Ada: {:.2} ({})", fine.amount, fine.reason);
    }
    if let Some(promoted) = &outcome.promoted {
        println!("Grace may pick up until {}", promoted.expires_at);
    }

    // (E) Grace collects the copy.
    let fulfilled = reservation_engine.fulfill(reservation.id).await?;
    info!(reservation = %fulfilled.id, "demo complete");

    let counts = store.counts().await;
    println!("{}", serde_json::to_string_pretty(&counts).map_err(|e| {
        CirculationError::Storage(format!("serialize counts: {e}"))
    })?);

    Ok(())
}
