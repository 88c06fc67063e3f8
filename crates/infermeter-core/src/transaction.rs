//! Ledger transaction types for infermeter.
//!
//! Every accepted balance-affecting operation creates exactly one
//! transaction; rejected operations create none. Transactions are immutable
//! once created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{TransactionId, UserId};

/// An immutable record of a balance-affecting event.
///
/// Amounts are **signed**: positive for deposits, negative for charges.
/// `kind` is a category label only and never implies the sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The user whose balance was affected.
    pub user_id: UserId,

    /// Transaction category.
    pub kind: TransactionKind,

    /// Signed amount in credits.
    pub amount: i64,

    /// Optional free-text annotation.
    pub comment: Option<String>,

    /// When the transaction was created. Server-assigned, never
    /// client-supplied.
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a deposit transaction (positive amount).
    #[must_use]
    pub fn deposit(user_id: UserId, amount: i64, comment: Option<String>) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            kind: TransactionKind::Deposit,
            amount: amount.abs(),
            comment,
            created_at: Utc::now(),
        }
    }

    /// Create a charge transaction for a priced job (negative amount).
    #[must_use]
    pub fn charge(user_id: UserId, kind: TransactionKind, price: i64, comment: Option<String>) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            kind,
            amount: -price.abs(),
            comment,
            created_at: Utc::now(),
        }
    }
}

/// Category of a ledger transaction.
///
/// Closed enumeration internally; serialized as a plain string at the API
/// boundary. Unknown strings are rejected with an invalid-argument error
/// rather than reaching storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Credits added to the balance.
    Deposit,

    /// Charge for an image prediction job.
    Prediction,

    /// Charge for a 3D scan analysis job.
    Scan3d,
}

impl TransactionKind {
    /// The wire/storage label for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Prediction => "prediction",
            Self::Scan3d => "scan3d",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognized transaction kind string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transaction kind: {0}")]
pub struct UnknownKindError(pub String);

impl FromStr for TransactionKind {
    type Err = UnknownKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(Self::Deposit),
            "prediction" => Ok(Self::Prediction),
            "scan3d" => Ok(Self::Scan3d),
            other => Err(UnknownKindError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_amount_is_positive() {
        let tx = Transaction::deposit(UserId::generate(), 100, Some("seed".into()));
        assert_eq!(tx.amount, 100);
        assert_eq!(tx.kind, TransactionKind::Deposit);
        assert_eq!(tx.comment.as_deref(), Some("seed"));
    }

    #[test]
    fn charge_amount_is_negative() {
        let tx = Transaction::charge(UserId::generate(), TransactionKind::Prediction, 50, None);
        assert_eq!(tx.amount, -50);
        assert_eq!(tx.kind, TransactionKind::Prediction);
    }

    #[test]
    fn kind_serializes_as_plain_string() {
        let json = serde_json::to_string(&TransactionKind::Scan3d).unwrap();
        assert_eq!(json, "\"scan3d\"");
    }

    #[test]
    fn kind_parse_roundtrip() {
        for kind in [
            TransactionKind::Deposit,
            TransactionKind::Prediction,
            TransactionKind::Scan3d,
        ] {
            assert_eq!(kind.as_str().parse::<TransactionKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = "withdrawal".parse::<TransactionKind>().unwrap_err();
        assert_eq!(err, UnknownKindError("withdrawal".into()));
    }
}
