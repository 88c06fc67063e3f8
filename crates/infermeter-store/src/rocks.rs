//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store`
//! trait.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use infermeter_core::{Account, Transaction, TransactionId, TransactionKind, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes the read-check-write section of compound balance
    /// operations. Plain reads never take this lock.
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Load an account that must exist and be active.
    fn active_account(&self, user_id: &UserId) -> Result<Account> {
        let account = self.get_account(user_id)?.ok_or(StoreError::NotFound)?;
        if !account.is_active {
            return Err(StoreError::Inactive);
        }
        Ok(account)
    }

    /// Write an updated account plus a new transaction in one batch.
    fn commit_balance_change(&self, account: &Account, transaction: &Transaction) -> Result<()> {
        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_tx_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;

        let account_key = keys::account_key(&account.id);
        let tx_key = keys::transaction_key(&transaction.id);
        let user_tx_key = keys::user_transaction_key(&account.id, &transaction.id);

        let account_value = Self::serialize(account)?;
        let tx_value = Self::serialize(transaction)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_accounts, &account_key, &account_value);
        batch.put_cf(&cf_tx, &tx_key, &tx_value);
        batch.put_cf(&cf_tx_by_user, &user_tx_key, []); // Index entry (empty value)

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

}

impl Store for RocksStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    fn create_account(&self, account: &Account) -> Result<()> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");

        let cf_by_email = self.cf(cf::ACCOUNTS_BY_EMAIL)?;
        let email_key = keys::email_key(&account.email);

        let taken = self
            .db
            .get_cf(&cf_by_email, &email_key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        if taken {
            return Err(StoreError::EmailTaken {
                email: account.email.clone(),
            });
        }

        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let account_key = keys::account_key(&account.id);
        let account_value = Self::serialize(account)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_accounts, &account_key, &account_value);
        batch.put_cf(&cf_by_email, &email_key, account.id.as_bytes());

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_account(&self, user_id: &UserId) -> Result<Option<Account>> {
        let cf = self.cf(cf::ACCOUNTS)?;
        let key = keys::account_key(user_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let cf_by_email = self.cf(cf::ACCOUNTS_BY_EMAIL)?;

        let Some(id_bytes) = self
            .db
            .get_cf(&cf_by_email, keys::email_key(email))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let mut bytes = [0u8; 16];
        if id_bytes.len() != 16 {
            return Err(StoreError::Database("malformed email index entry".into()));
        }
        bytes.copy_from_slice(&id_bytes);
        let user_id = UserId::from_uuid(uuid::Uuid::from_bytes(bytes));

        self.get_account(&user_id)
    }

    fn put_account(&self, account: &Account) -> Result<()> {
        let cf = self.cf(cf::ACCOUNTS)?;
        let key = keys::account_key(&account.id);
        let value = Self::serialize(account)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    // =========================================================================
    // Transaction Operations
    // =========================================================================

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>> {
        let cf = self.cf(cf::TRANSACTIONS)?;
        let key = keys::transaction_key(transaction_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let cf_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;
        let prefix = keys::user_transactions_prefix(user_id);

        // ULID index keys are time-ordered, so reverse iteration from the
        // prefix's upper bound streams newest first without materializing
        // the user's full history.
        let mut upper = Vec::with_capacity(32);
        upper.extend_from_slice(&prefix);
        upper.extend_from_slice(&[0xFF; 16]);

        let iter = self.db.iterator_cf(
            &cf_by_user,
            IteratorMode::From(&upper, rocksdb::Direction::Reverse),
        );

        let mut transactions = Vec::new();
        let mut skipped = 0;

        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }
            if skipped < offset {
                skipped += 1;
                continue;
            }
            if transactions.len() >= limit {
                break;
            }

            let tx_id = keys::extract_transaction_id_from_user_key(&key);
            if let Some(tx) = self.get_transaction(&tx_id)? {
                transactions.push(tx);
            }
        }

        Ok(transactions)
    }

    fn list_all_transactions(&self, limit: usize, offset: usize) -> Result<Vec<Transaction>> {
        let cf_tx = self.cf(cf::TRANSACTIONS)?;

        // The primary CF is keyed by ULID, so reverse iteration over the
        // whole family is globally newest first.
        let mut transactions = Vec::new();
        let mut skipped = 0;

        for item in self.db.iterator_cf(&cf_tx, IteratorMode::End) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if skipped < offset {
                skipped += 1;
                continue;
            }
            if transactions.len() >= limit {
                break;
            }

            transactions.push(Self::deserialize(&value)?);
        }

        Ok(transactions)
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    fn credit_and_record(
        &self,
        user_id: &UserId,
        amount: i64,
        comment: Option<String>,
    ) -> Result<(Transaction, i64)> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");

        let mut account = self.active_account(user_id)?;
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(StoreError::Overflow)?;
        account.updated_at = chrono::Utc::now();

        let transaction = Transaction::deposit(*user_id, amount, comment);
        self.commit_balance_change(&account, &transaction)?;

        tracing::debug!(
            user_id = %user_id,
            amount = %amount,
            balance = %account.balance,
            "Deposit recorded"
        );

        Ok((transaction, account.balance))
    }

    fn debit_and_record(
        &self,
        user_id: &UserId,
        price: i64,
        kind: TransactionKind,
        comment: Option<String>,
    ) -> Result<(Transaction, i64)> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");

        let mut account = self.active_account(user_id)?;

        // Admission check and debit happen under one lock so concurrent
        // submissions cannot both observe a covering balance.
        if !account.can_afford(price) {
            return Err(StoreError::InsufficientBalance {
                balance: account.balance,
                required: price,
            });
        }

        account.balance = account
            .balance
            .checked_sub(price)
            .ok_or(StoreError::Overflow)?;
        account.updated_at = chrono::Utc::now();

        let transaction = Transaction::charge(*user_id, kind, price, comment);
        self.commit_balance_change(&account, &transaction)?;

        tracing::debug!(
            user_id = %user_id,
            kind = %kind,
            price = %price,
            balance = %account.balance,
            "Charge recorded"
        );

        Ok((transaction, account.balance))
    }

    fn rollback_charge(&self, transaction: &Transaction) -> Result<i64> {
        let _guard = self.write_lock.lock().expect("store lock poisoned");

        let mut account = self
            .get_account(&transaction.user_id)?
            .ok_or(StoreError::NotFound)?;

        account.balance = account
            .balance
            .checked_add(transaction.amount.abs())
            .ok_or(StoreError::Overflow)?;
        account.updated_at = chrono::Utc::now();

        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_tx_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;

        let account_value = Self::serialize(&account)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_accounts, keys::account_key(&account.id), &account_value);
        batch.delete_cf(&cf_tx, keys::transaction_key(&transaction.id));
        batch.delete_cf(
            &cf_tx_by_user,
            keys::user_transaction_key(&transaction.user_id, &transaction.id),
        );

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::warn!(
            user_id = %transaction.user_id,
            transaction_id = %transaction.id,
            restored_balance = %account.balance,
            "Charge rolled back"
        );

        Ok(account.balance)
    }
}
