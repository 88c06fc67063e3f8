//! Core types for the infermeter platform.
//!
//! This crate provides the foundational types shared by the service, the
//! storage layer, and the worker:
//!
//! - **Identifiers**: `UserId`, `TransactionId`, `TaskId`
//! - **Accounts**: `Account`
//! - **Ledger**: `Transaction`, `TransactionKind`
//! - **Jobs**: `JobDescriptor`, `TaskRequest`, `Reply`
//! - **Pricing**: `PriceTable`
//!
//! # Credit unit
//!
//! Balances and transaction amounts are **signed `i64` credits**. Deposits
//! are positive, charges negative; `TransactionKind` is a category label
//! only and never implies the sign. Integer credits avoid floating point
//! precision issues in the ledger.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod ids;
pub mod pricing;
pub mod task;
pub mod transaction;

pub use account::Account;
pub use ids::{IdError, TaskId, TransactionId, UserId};
pub use pricing::{PriceTable, PREDICTION_PRICE, SCAN3D_PRICE};
pub use task::{JobDescriptor, Reply, ReplyStatus, TaskRequest, TaskType};
pub use transaction::{Transaction, TransactionKind, UnknownKindError};
