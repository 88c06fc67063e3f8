//! In-memory dispatcher for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use infermeter_core::{JobDescriptor, Reply};

use super::{DispatchError, DispatchMode, Dispatcher};

/// Records published jobs instead of talking to a broker.
///
/// Tests can flip [`set_unavailable`](Self::set_unavailable) to simulate a
/// broker outage, or script the reply returned for wait-for-reply dispatch.
#[derive(Default)]
pub struct MemoryDispatcher {
    published: Mutex<Vec<(String, JobDescriptor)>>,
    unavailable: AtomicBool,
    reply_lost: AtomicBool,
    scripted_reply: Mutex<Option<Reply>>,
}

impl MemoryDispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the broker being down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Script the reply for the next wait-for-reply dispatch. When no reply
    /// is scripted, waiting dispatches time out.
    pub fn set_reply(&self, reply: Reply) {
        *self.scripted_reply.lock().unwrap() = Some(reply);
    }

    /// Simulate the reply channel dying after a successful publish. The job
    /// is still recorded in [`published`](Self::published).
    pub fn set_reply_lost(&self, lost: bool) {
        self.reply_lost.store(lost, Ordering::SeqCst);
    }

    /// All jobs published so far, in order, with their queue names.
    #[must_use]
    pub fn published(&self) -> Vec<(String, JobDescriptor)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dispatcher for MemoryDispatcher {
    async fn dispatch(
        &self,
        queue: &str,
        descriptor: &JobDescriptor,
        mode: DispatchMode,
    ) -> Result<Option<Reply>, DispatchError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DispatchError::Unavailable("broker down".into()));
        }

        self.published
            .lock()
            .unwrap()
            .push((queue.to_string(), descriptor.clone()));

        match mode {
            DispatchMode::FireAndForget => Ok(None),
            DispatchMode::WaitForReply { .. } => {
                if self.reply_lost.load(Ordering::SeqCst) {
                    return Err(DispatchError::ReplyLost("reply consumer closed".into()));
                }
                match self.scripted_reply.lock().unwrap().take() {
                    Some(reply) => Ok(Some(reply)),
                    None => Err(DispatchError::Timeout),
                }
            }
        }
    }
}
