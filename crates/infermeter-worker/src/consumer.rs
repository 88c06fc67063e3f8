//! AMQP consumption loop.
//!
//! One consumer per task queue, prefetch 1. Every delivery is acked after
//! processing, success or failure: the ledger already charged for the job
//! at submission time, so requeueing would only re-run work that can never
//! be re-billed. Failures are logged and forwarded to the dead-letter
//! queue for inspection.

use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions,
};
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection};

use infermeter_core::{JobDescriptor, Reply};

use crate::inference;

/// Delivery mode 2 marks messages persistent.
const PERSISTENT: u8 = 2;

/// Consume `queue` forever, running the mocked model on each delivery.
///
/// # Errors
///
/// Returns the underlying lapin error when the channel or consumer cannot
/// be set up. Per-message failures never abort the loop.
pub async fn consume_queue(
    conn: &Connection,
    queue: &str,
    dead_letter_queue: &str,
) -> Result<(), lapin::Error> {
    let channel = conn.create_channel().await?;
    channel
        .basic_qos(1, BasicQosOptions::default())
        .await?;

    for name in [queue, dead_letter_queue] {
        channel
            .queue_declare(
                name,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
    }

    let mut consumer = channel
        .basic_consume(
            queue,
            "infermeter-worker",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    tracing::info!(queue, "consuming");

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                tracing::error!(queue, error = %e, "consumer stream error");
                continue;
            }
        };

        if let Err(e) = handle_delivery(&channel, dead_letter_queue, &delivery).await {
            tracing::error!(queue, error = %e, "delivery handling failed");
        }

        // Ack regardless of outcome.
        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
            tracing::error!(queue, error = %e, "ack failed");
        }
    }

    tracing::warn!(queue, "consumer stream ended");
    Ok(())
}

async fn handle_delivery(
    channel: &Channel,
    dead_letter_queue: &str,
    delivery: &lapin::message::Delivery,
) -> Result<(), lapin::Error> {
    let descriptor: JobDescriptor = match serde_json::from_slice(&delivery.data) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            tracing::error!(error = %e, "undecodable job descriptor");
            publish_dead_letter(channel, dead_letter_queue, &delivery.data).await?;
            return Ok(());
        }
    };

    let reply = match inference::run(&descriptor) {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(
                task_id = %descriptor.task_id,
                error = %e,
                "inference failed"
            );
            publish_dead_letter(channel, dead_letter_queue, &delivery.data).await?;
            inference::failure_reply(&descriptor, &e)
        }
    };

    // Reply only when the submitter asked for one.
    if let Some(reply_to) = delivery.properties.reply_to() {
        publish_reply(channel, reply_to.as_str(), delivery, &reply).await?;
    }

    Ok(())
}

async fn publish_reply(
    channel: &Channel,
    reply_to: &str,
    delivery: &lapin::message::Delivery,
    reply: &Reply,
) -> Result<(), lapin::Error> {
    let payload = match serde_json::to_vec(reply) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(task_id = %reply.task_id, error = %e, "reply encoding failed");
            return Ok(());
        }
    };

    let mut properties = BasicProperties::default()
        .with_content_type(ShortString::from("application/json"));
    if let Some(correlation_id) = delivery.properties.correlation_id() {
        properties = properties.with_correlation_id(correlation_id.clone());
    }

    channel
        .basic_publish(
            "",
            reply_to,
            BasicPublishOptions::default(),
            &payload,
            properties,
        )
        .await?
        .await?;

    tracing::debug!(task_id = %reply.task_id, reply_to, "reply published");
    Ok(())
}

async fn publish_dead_letter(
    channel: &Channel,
    dead_letter_queue: &str,
    payload: &[u8],
) -> Result<(), lapin::Error> {
    channel
        .basic_publish(
            "",
            dead_letter_queue,
            BasicPublishOptions::default(),
            payload,
            BasicProperties::default().with_delivery_mode(PERSISTENT),
        )
        .await?
        .await?;
    Ok(())
}
