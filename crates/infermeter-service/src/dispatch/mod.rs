//! Job dispatch to the worker tier.
//!
//! Handlers talk to a [`Dispatcher`] trait object so the HTTP layer does not
//! know which broker (or test double) is behind it. The production
//! implementation is [`AmqpDispatcher`]; integration tests use
//! [`MemoryDispatcher`].

mod amqp;
mod memory;

pub use amqp::AmqpDispatcher;
pub use memory::MemoryDispatcher;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use infermeter_core::{JobDescriptor, Reply};

/// How a dispatched job's completion is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Publish and return immediately.
    FireAndForget,
    /// Publish, then block on a reply queue until a worker answers or the
    /// timeout elapses.
    WaitForReply {
        /// How long to wait for the worker's reply.
        timeout: Duration,
    },
}

/// Errors from the dispatch layer.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The broker could not be reached or refused the publish.
    #[error("messaging backend unavailable: {0}")]
    Unavailable(String),

    /// No reply arrived within the configured window. The job was published
    /// and may still complete.
    #[error("timed out waiting for worker reply")]
    Timeout,

    /// The publish succeeded but the reply channel failed afterwards. Like
    /// [`DispatchError::Timeout`], the job may still run.
    #[error("reply channel failed after publish: {0}")]
    ReplyLost(String),

    /// A reply arrived but could not be decoded.
    #[error("undecodable reply: {0}")]
    Codec(String),
}

/// Publishes job descriptors to worker queues.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Publish `descriptor` to `queue`.
    ///
    /// Returns `Ok(Some(reply))` when `mode` waits for a reply and one
    /// arrives, `Ok(None)` for fire-and-forget.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Unavailable`] if the publish itself fails; the
    /// caller must treat the job as never dispatched. [`DispatchError::Timeout`]
    /// or [`DispatchError::ReplyLost`] if the publish succeeded but no reply
    /// was observed; the job may still run.
    async fn dispatch(
        &self,
        queue: &str,
        descriptor: &JobDescriptor,
        mode: DispatchMode,
    ) -> Result<Option<Reply>, DispatchError>;
}
