//! Domain identifiers (strongly-typed IDs).
//!
//! All record families share one generic `Id<T>` backed by a ULID. The marker
//! type `T` is phantom data: it costs nothing at runtime but makes it a
//! compile error to hand a `BookId` where a `BorrowingId` is expected.
//!
//! ULIDs sort by creation time, which the reservation queue relies on as a
//! tie-breaker when two reservations carry the same `created_at`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait for each ID family.
///
/// Provides the prefix used by `Display` ("book-", "borrowing-", ...).
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic ULID-backed identifier.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// Marker types, one per record family.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BookMarker {}

impl IdMarker for BookMarker {
    fn prefix() -> &'static str {
        "book-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BorrowerMarker {}

impl IdMarker for BorrowerMarker {
    fn prefix() -> &'static str {
        "borrower-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BorrowingMarker {}

impl IdMarker for BorrowingMarker {
    fn prefix() -> &'static str {
        "borrowing-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReservationMarker {}

impl IdMarker for ReservationMarker {
    fn prefix() -> &'static str {
        "reservation-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FineMarker {}

impl IdMarker for FineMarker {
    fn prefix() -> &'static str {
        "fine-"
    }
}

/// Identifier of a catalog Book.
pub type BookId = Id<BookMarker>;

/// Identifier of a Borrower account.
pub type BorrowerId = Id<BorrowerMarker>;

/// Identifier of a Borrowing (one loan of one copy).
pub type BorrowingId = Id<BorrowingMarker>;

/// Identifier of a Reservation (one waitlist entry).
pub type ReservationId = Id<ReservationMarker>;

/// Identifier of a Fine.
pub type FineId = Id<FineMarker>;
