//! Ports: the abstraction seams between the engines and the outside world.
//!
//! Repositories wrap the persistent store, `Clock` wraps time and
//! `IdGenerator` wraps id creation; swapping implementations behind these
//! traits is how the engines stay deterministic under test.

pub mod clock;
pub mod id_generator;
pub mod repository;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::repository::{
    BookRepository, BorrowerRepository, BorrowingRepository, FineRepository,
    ReservationRepository,
};
