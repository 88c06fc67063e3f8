//! AMQP dispatcher backed by lapin.
//!
//! Jobs are published as JSON to durable queues with persistent delivery.
//! Wait-for-reply dispatch uses the direct-reply pattern: an exclusive
//! auto-delete reply queue per request, correlated by task id.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};

use infermeter_core::{JobDescriptor, Reply};

use super::{DispatchError, DispatchMode, Dispatcher};

/// Delivery mode 2 marks messages persistent so they survive broker restarts.
const PERSISTENT: u8 = 2;

/// Dispatcher publishing to a RabbitMQ-compatible broker.
pub struct AmqpDispatcher {
    conn: Connection,
}

impl AmqpDispatcher {
    /// Connect to the broker, retrying with exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Unavailable`] once `attempts` connection
    /// attempts have been exhausted.
    pub async fn connect(url: &str, attempts: u32) -> Result<Self, DispatchError> {
        let mut delay = Duration::from_millis(500);
        let mut last_err = String::new();

        for attempt in 1..=attempts.max(1) {
            match Connection::connect(url, ConnectionProperties::default()).await {
                Ok(conn) => {
                    tracing::info!(attempt, "connected to message broker");
                    return Ok(Self { conn });
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "broker connection failed");
                    last_err = e.to_string();
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_secs(10));
                }
            }
        }

        Err(DispatchError::Unavailable(last_err))
    }

    async fn open_channel(&self) -> Result<Channel, DispatchError> {
        self.conn
            .create_channel()
            .await
            .map_err(|e| DispatchError::Unavailable(e.to_string()))
    }

    async fn declare_durable(
        channel: &Channel,
        queue: &str,
    ) -> Result<(), DispatchError> {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| DispatchError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn publish(
        channel: &Channel,
        queue: &str,
        payload: &[u8],
        properties: BasicProperties,
    ) -> Result<(), DispatchError> {
        channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await
            .map_err(|e| DispatchError::Unavailable(e.to_string()))?
            .await
            .map_err(|e| DispatchError::Unavailable(e.to_string()))?;
        Ok(())
    }

    /// Publish and wait for the correlated reply on a per-request queue.
    async fn publish_and_wait(
        &self,
        channel: &Channel,
        queue: &str,
        descriptor: &JobDescriptor,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Reply, DispatchError> {
        // Exclusive auto-delete queue, torn down when this consumer drops.
        let reply_queue = channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| DispatchError::Unavailable(e.to_string()))?;

        let correlation_id = descriptor.task_id.to_string();

        let mut consumer = channel
            .basic_consume(
                reply_queue.name().as_str(),
                "reply-consumer",
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| DispatchError::Unavailable(e.to_string()))?;

        let properties = BasicProperties::default()
            .with_delivery_mode(PERSISTENT)
            .with_content_type(ShortString::from("application/json"))
            .with_reply_to(reply_queue.name().clone())
            .with_correlation_id(ShortString::from(correlation_id.clone()));

        Self::publish(channel, queue, payload, properties).await?;

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        // The publish has succeeded past this point. Failures from here on
        // must not look like a failed dispatch: the job is in the queue and
        // the charge has to stand.
        loop {
            tokio::select! {
                () = &mut deadline => return Err(DispatchError::Timeout),
                delivery = consumer.next() => {
                    let Some(delivery) = delivery else {
                        return Err(DispatchError::ReplyLost(
                            "reply consumer closed".into(),
                        ));
                    };
                    let delivery = delivery
                        .map_err(|e| DispatchError::ReplyLost(e.to_string()))?;

                    // Stale replies from retried requests share the queue
                    // name space, so filter on correlation id.
                    let matches = delivery
                        .properties
                        .correlation_id()
                        .as_ref()
                        .is_some_and(|id| id.as_str() == correlation_id);
                    if !matches {
                        tracing::debug!("discarding uncorrelated reply");
                        continue;
                    }

                    let reply: Reply = serde_json::from_slice(&delivery.data)
                        .map_err(|e| DispatchError::Codec(e.to_string()))?;
                    return Ok(reply);
                }
            }
        }
    }
}

#[async_trait]
impl Dispatcher for AmqpDispatcher {
    async fn dispatch(
        &self,
        queue: &str,
        descriptor: &JobDescriptor,
        mode: DispatchMode,
    ) -> Result<Option<Reply>, DispatchError> {
        let payload = serde_json::to_vec(descriptor)
            .map_err(|e| DispatchError::Codec(e.to_string()))?;

        let channel = self.open_channel().await?;
        Self::declare_durable(&channel, queue).await?;

        match mode {
            DispatchMode::FireAndForget => {
                let properties = BasicProperties::default()
                    .with_delivery_mode(PERSISTENT)
                    .with_content_type(ShortString::from("application/json"));
                Self::publish(&channel, queue, &payload, properties).await?;
                tracing::info!(
                    queue,
                    task_id = %descriptor.task_id,
                    "job dispatched"
                );
                Ok(None)
            }
            DispatchMode::WaitForReply { timeout } => {
                let reply = self
                    .publish_and_wait(&channel, queue, descriptor, &payload, timeout)
                    .await?;
                tracing::info!(
                    queue,
                    task_id = %descriptor.task_id,
                    status = ?reply.status,
                    "job completed"
                );
                Ok(Some(reply))
            }
        }
    }
}
