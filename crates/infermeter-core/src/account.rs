//! Account types for infermeter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A user's balance-holding identity record.
///
/// The account tracks the credit balance, authentication material, and the
/// role/active flags. Balances are mutated only by the storage layer's
/// credit/debit compound operations; accounts are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// The user ID.
    pub id: UserId,

    /// Unique email, case-sensitive (no normalization is applied).
    pub email: String,

    /// Argon2id password hash in PHC string format.
    pub password_hash: String,

    /// Current credit balance, signed.
    ///
    /// The storage layer does not enforce non-negativity; the only
    /// enforcement point is the admission check at submission time.
    pub balance: i64,

    /// Administrative privileges flag.
    pub is_admin: bool,

    /// Active flag. Inactive accounts are rejected at authentication time.
    pub is_active: bool,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with zero balance and default flags.
    #[must_use]
    pub fn new(id: UserId, email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            email: email.into(),
            password_hash: password_hash.into(),
            balance: 0,
            is_admin: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Admission check: whether the balance covers a price.
    #[must_use]
    pub const fn can_afford(&self, price: i64) -> bool {
        self.balance >= price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_has_zero_balance() {
        let account = Account::new(UserId::generate(), "a@example.com", "$argon2id$stub");
        assert_eq!(account.balance, 0);
        assert!(!account.is_admin);
        assert!(account.is_active);
    }

    #[test]
    fn can_afford_boundary() {
        let mut account = Account::new(UserId::generate(), "a@example.com", "$argon2id$stub");
        account.balance = 50;

        assert!(account.can_afford(49));
        assert!(account.can_afford(50));
        assert!(!account.can_afford(51));
    }

    #[test]
    fn email_is_case_sensitive() {
        let a = Account::new(UserId::generate(), "User@Example.com", "h");
        assert_eq!(a.email, "User@Example.com");
    }
}
