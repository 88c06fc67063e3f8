//! Infermeter HTTP API Service.
//!
//! This crate provides the HTTP API for the infermeter service, including:
//!
//! - Registration and login
//! - Credit balance and transaction history
//! - Charged inference submission (image prediction, 3D scan analysis)
//! - Dispatch gateway to the worker queues
//!
//! # Authentication
//!
//! Bearer JWT signed with a server-held secret. Tokens are issued at login
//! and carry the account id in `sub`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers need async for the router

pub mod auth;
pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod submit;

pub use config::ServiceConfig;
pub use dispatch::{AmqpDispatcher, DispatchError, DispatchMode, Dispatcher, MemoryDispatcher};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
pub use submit::{submit, JobHandle};
