//! Circulation engines. `BorrowingEngine` and `ReservationEngine` carry the
//! request-driven lifecycles; `Sweeper` applies the time-driven transitions.

pub mod borrowing;
pub mod reservation;
pub mod sweeper;

pub use self::borrowing::{BorrowingEngine, ReturnOutcome};
pub use self::reservation::{QueuePosition, ReservationEngine};
pub use self::sweeper::{SweepReport, Sweeper, SweeperHandle};
