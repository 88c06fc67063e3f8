//! HTTP request handlers.

pub mod auth;
pub mod balance;
pub mod health;
pub mod predict;
pub mod transactions;
