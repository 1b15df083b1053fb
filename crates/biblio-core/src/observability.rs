//! Ledger state counts, for tests, demos and health reporting.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerCounts {
    pub books: usize,
    pub active_borrowings: usize,
    pub overdue_borrowings: usize,
    pub returned_borrowings: usize,
    pub pending_reservations: usize,
    pub ready_reservations: usize,
    pub unpaid_fines: usize,
}
