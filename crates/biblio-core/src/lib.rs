#![feature(int_roundings)]
//! Core library circulation engine.
//!
//! The crate is split along one seam: `domain` holds the records and every
//! legal state transition, `ports` holds the traits the engines talk
//! through, `store` implements those traits in memory and `engine` wires the
//! lifecycles together. Time and id generation are injected, so every flow
//! is replayable under test with a `FixedClock`.

pub mod domain;
pub mod engine;
pub mod observability;
pub mod ports;
pub mod store;

pub use domain::{CirculationError, CirculationPolicy};
pub use engine::{BorrowingEngine, ReservationEngine, Sweeper, SweeperHandle};
pub use store::InMemoryStore;
