//! Borrower accounts and role-based circulation policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::BorrowerId;

/// Role of the acting principal, as supplied by the identity provider.
///
/// The engine trusts this input and never re-derives it. Admins may operate
/// on any borrowing; borrowers only on their own records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Admin,
    Borrower,
}

/// Borrower category; each maps to a fixed circulation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorrowerRole {
    Student,
    Faculty,
    Staff,
    Member,
}

/// Per-role circulation limits.
///
/// Table-driven: limits come from the role at call time, never hardcoded at
/// individual call sites. `max_renewals` is copied onto the borrowing at
/// creation so later policy changes don't rewrite history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePolicy {
    /// Max concurrent open (active/overdue) borrowings.
    pub max_books: u32,
    /// Loan period in days; renewal resets to a fresh period of this length.
    pub loan_days: i64,
    /// Renewal cap per borrowing.
    pub max_renewals: u32,
}

impl BorrowerRole {
    pub fn policy(self) -> RolePolicy {
        match self {
            BorrowerRole::Student => RolePolicy {
                max_books: 5,
                loan_days: 30,
                max_renewals: 2,
            },
            BorrowerRole::Faculty => RolePolicy {
                max_books: 10,
                loan_days: 60,
                max_renewals: 3,
            },
            BorrowerRole::Staff => RolePolicy {
                max_books: 8,
                loan_days: 45,
                max_renewals: 3,
            },
            BorrowerRole::Member => RolePolicy {
                max_books: 3,
                loan_days: 14,
                max_renewals: 1,
            },
        }
    }
}

/// A library patron.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Borrower {
    pub id: BorrowerId,
    pub name: String,
    pub role: BorrowerRole,
    /// Disabled accounts cannot borrow.
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Borrower {
    pub fn new(
        id: BorrowerId,
        name: impl Into<String>,
        role: BorrowerRole,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            active: true,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::student(BorrowerRole::Student, 5, 30, 2)]
    #[case::faculty(BorrowerRole::Faculty, 10, 60, 3)]
    #[case::staff(BorrowerRole::Staff, 8, 45, 3)]
    #[case::member(BorrowerRole::Member, 3, 14, 1)]
    fn policy_table(
        #[case] role: BorrowerRole,
        #[case] max_books: u32,
        #[case] loan_days: i64,
        #[case] max_renewals: u32,
    ) {
        let p = role.policy();
        assert_eq!(p.max_books, max_books);
        assert_eq!(p.loan_days, loan_days);
        assert_eq!(p.max_renewals, max_renewals);
    }
}
