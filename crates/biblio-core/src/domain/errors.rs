//! Error taxonomy for the circulation engine.
//!
//! Every variant except `Storage` is an expected, recoverable-by-caller
//! condition: the request layer maps them to user-facing responses. `Storage`
//! wraps unexpected infrastructure failures and propagates opaquely; the
//! engine neither swallows nor retries them.

use thiserror::Error;

use super::book::BookStatus;

#[derive(Debug, Error)]
pub enum CirculationError {
    /// A referenced entity is absent.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The actor lacks rights over the target record.
    #[error("actor does not own this record")]
    Forbidden,

    /// The operation is not valid from the record's current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The borrowing was already returned; returned records are immutable.
    #[error("borrowing already returned")]
    AlreadyReturned,

    /// Renewal refused (terminal state, cap reached, or reservation queue).
    #[error("cannot renew: {0}")]
    CannotRenew(String),

    /// Borrower is at their role's concurrent-borrow cap.
    #[error("borrow limit reached ({held}/{max})")]
    LimitReached { held: usize, max: u32 },

    /// The inventory claim lost the race or the shelf was already empty.
    #[error("no copies available")]
    NoCopiesAvailable,

    /// Borrower already holds an open borrowing of this exact book.
    #[error("borrower already holds this book")]
    AlreadyHeld,

    /// Borrower already has an active reservation for this book.
    #[error("borrower already has an active reservation for this book")]
    AlreadyReserved,

    /// The book has copies on the shelf; it should be borrowed, not reserved.
    #[error("book has available copies; borrow it directly")]
    AlreadyAvailable,

    /// The book is under maintenance or lost.
    #[error("book is not borrowable (status {0:?})")]
    NotBorrowable(BookStatus),

    /// Inventory adjustment would drive a counter negative.
    #[error("invalid inventory adjustment: {0}")]
    InvalidAdjustment(String),

    /// The borrower account is disabled or unknown at the auth boundary.
    #[error("borrower account is inactive")]
    InactiveBorrower,

    /// Opaque storage/infrastructure failure.
    #[error("storage error: {0}")]
    Storage(String),
}
