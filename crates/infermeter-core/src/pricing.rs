//! Fixed price table for priced job submissions.

use serde::{Deserialize, Serialize};

use crate::TaskType;

/// Fixed price of an image prediction, in credits.
pub const PREDICTION_PRICE: i64 = 50;

/// Fixed price of a 3D scan analysis, in credits.
pub const SCAN3D_PRICE: i64 = 100;

/// Price table for priced task types.
///
/// Deposits are credit-only and have no price. Prices are fixed per task
/// type; there is no per-user or volume pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTable {
    /// Price of an image prediction.
    pub prediction: i64,

    /// Price of a 3D scan analysis.
    pub scan3d: i64,
}

impl PriceTable {
    /// Look up the price for a task type.
    #[must_use]
    pub const fn price(&self, task_type: TaskType) -> i64 {
        match task_type {
            TaskType::Prediction => self.prediction,
            TaskType::Scan3d => self.scan3d,
        }
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            prediction: PREDICTION_PRICE,
            scan3d: SCAN3D_PRICE,
        }
    }
}
