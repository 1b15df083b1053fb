//! Domain model: records, lifecycle transitions, ids, policy, errors.
//!
//! Records are plain values whose invariants can only change through their
//! transition methods; persistence stays with the repositories in `ports`.

pub mod book;
pub mod borrower;
pub mod borrowing;
pub mod errors;
pub mod fine;
pub mod ids;
pub mod policy;
pub mod reservation;

pub use book::{Book, BookStatus};
pub use borrower::{ActorRole, Borrower, BorrowerRole, RolePolicy};
pub use borrowing::{Borrowing, BorrowingStatus};
pub use errors::CirculationError;
pub use fine::{days_overdue, overdue_fine, Fine, FineStatus};
pub use ids::{BookId, BorrowerId, BorrowingId, FineId, ReservationId};
pub use policy::CirculationPolicy;
pub use reservation::{Reservation, ReservationStatus};
