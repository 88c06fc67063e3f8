//! `RocksDB` ledger storage for infermeter.
//!
//! This crate provides persistent storage for accounts and ledger
//! transactions using `RocksDB` with column families for efficient indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `accounts`: Primary account records, keyed by `user_id`
//! - `accounts_by_email`: Email uniqueness index for registration and login
//! - `transactions`: Ledger transactions, keyed by `transaction_id` (ULID)
//! - `transactions_by_user`: Index for listing transactions by user
//!
//! The relational store is the single source of truth for balances; the
//! message queue is never authoritative for a debit. Compound operations
//! (`credit_and_record`, `debit_and_record`, `rollback_charge`) apply the
//! balance mutation and the transaction row in one atomic `WriteBatch`, and
//! serialize their read-check-write section so concurrent submissions
//! cannot both pass the admission check.
//!
//! # Example
//!
//! ```no_run
//! use infermeter_store::{RocksStore, Store};
//! use infermeter_core::{Account, UserId};
//!
//! let store = RocksStore::open("/tmp/infermeter-db").unwrap();
//!
//! let account = Account::new(UserId::generate(), "a@example.com", "$argon2id$stub");
//! store.create_account(&account).unwrap();
//!
//! let (tx, balance) = store.credit_and_record(&account.id, 100, Some("seed".into())).unwrap();
//! assert_eq!(tx.amount, 100);
//! assert_eq!(balance, 100);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use infermeter_core::{Account, Transaction, TransactionId, TransactionKind, UserId};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer so services take an
/// `Arc<dyn Store>` injected at construction rather than a process-wide
/// handle.
pub trait Store: Send + Sync {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Create a new account, enforcing email uniqueness.
    ///
    /// The account record and the email index entry are written in one
    /// atomic batch.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::EmailTaken` if the email is already registered.
    fn create_account(&self, account: &Account) -> Result<()>;

    /// Get an account by user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, user_id: &UserId) -> Result<Option<Account>>;

    /// Look up an account by its exact (case-sensitive) email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_account_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Insert or update an account record.
    ///
    /// Balance changes must go through the compound operations instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_account(&self, account: &Account) -> Result<()>;

    // =========================================================================
    // Transaction Operations
    // =========================================================================

    /// Get a transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>>;

    /// List transactions for a user, newest first.
    ///
    /// Ordering is by ULID transaction id, a strict total order even for
    /// rows created within the same clock tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>>;

    /// List transactions across all users, newest first (admin variant).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_all_transactions(&self, limit: usize, offset: usize) -> Result<Vec<Transaction>>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Unconditional credit (deposit): balance += amount and a deposit
    /// transaction are committed atomically. Returns the created
    /// transaction and the resulting balance, so callers never re-read
    /// a balance that concurrent operations may have moved since.
    ///
    /// Amount positivity is an input-level precondition checked at the API
    /// boundary; the store records whatever positive amount it is given.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::Inactive` if the account is deactivated.
    /// - `StoreError::Overflow` if the deposit would overflow the balance.
    fn credit_and_record(
        &self,
        user_id: &UserId,
        amount: i64,
        comment: Option<String>,
    ) -> Result<(Transaction, i64)>;

    /// Debit at submission time: admission check, balance -= price, and the
    /// charge transaction are committed atomically. Returns the created
    /// transaction and the resulting balance.
    ///
    /// The admission check requires `balance >= price`.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::Inactive` if the account is deactivated.
    /// - `StoreError::InsufficientBalance` if the balance does not cover
    ///   the price.
    /// - `StoreError::Overflow` if the debit would overflow the balance.
    fn debit_and_record(
        &self,
        user_id: &UserId,
        price: i64,
        kind: TransactionKind,
        comment: Option<String>,
    ) -> Result<(Transaction, i64)>;

    /// Compensating rollback of a committed charge, used when dispatch
    /// fails after the debit. Restores the balance and removes the
    /// transaction and its index row in one atomic batch, leaving the
    /// ledger as if the submission had been rejected. Returns the restored
    /// balance.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist.
    fn rollback_charge(&self, transaction: &Transaction) -> Result<i64>;
}
