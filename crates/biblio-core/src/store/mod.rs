//! Storage backends. `memory` is the in-process implementation used by the
//! demo binary and the test suites.

mod memory;

pub use memory::InMemoryStore;
