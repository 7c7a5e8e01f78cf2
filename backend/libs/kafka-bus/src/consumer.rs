use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::error::BusResult;
use crate::producer::EventProducer;

/// Handler invoked for each message delivered on a topic.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()>;
}

/// Exponential backoff retry schedule: attempt n waits 2^(n-1) seconds, so
/// the default 5 retries wait 1, 2, 4, 8 and 16 seconds.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 5 }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs(2u64.pow(attempt.saturating_sub(1)))
    }
}

enum ProcessOutcome {
    Handled,
    Exhausted(String),
    Cancelled,
}

/// Per-topic consumer loop.
///
/// Offsets are committed manually, only after the handler succeeded or the
/// message was dead-lettered, so the subscription never stalls on a poison
/// message and never loses one on a crash.
pub struct EventConsumer {
    consumer: StreamConsumer,
    producer: Arc<EventProducer>,
    topic: String,
    group_id: String,
    retry: RetryPolicy,
}

impl EventConsumer {
    pub fn new(
        brokers: &[String],
        topic: &str,
        group_id: &str,
        producer: Arc<EventProducer>,
    ) -> BusResult<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers.join(","))
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "30000")
            .create()?;

        consumer.subscribe(&[topic])?;

        Ok(Self {
            consumer,
            producer,
            topic: topic.to_string(),
            group_id: group_id.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run until the shutdown channel fires. Each message is processed with
    /// the retry policy; exhausted messages are published to the DLQ before
    /// the offset advances.
    pub async fn run(
        &self,
        mut shutdown: broadcast::Receiver<()>,
        handler: Arc<dyn MessageHandler>,
    ) {
        info!(
            topic = %self.topic,
            group_id = %self.group_id,
            "starting consumer"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!(topic = %self.topic, "consumer stopping");
                    break;
                }
                received = self.consumer.recv() => {
                    let message = match received {
                        Ok(m) => m,
                        Err(e) => {
                            error!(topic = %self.topic, error = %e, "kafka read error");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            continue;
                        }
                    };

                    let payload = message.payload().unwrap_or_default();
                    let outcome = run_with_retry(
                        &self.retry,
                        &mut shutdown,
                        payload,
                        handler.as_ref(),
                    )
                    .await;

                    match outcome {
                        ProcessOutcome::Handled => {}
                        ProcessOutcome::Cancelled => {
                            info!(topic = %self.topic, "consumer stopping mid-retry");
                            break;
                        }
                        ProcessOutcome::Exhausted(err) => {
                            error!(
                                topic = %self.topic,
                                partition = message.partition(),
                                offset = message.offset(),
                                error = %err,
                                "message failed after retries, routing to DLQ"
                            );
                            if let Err(dlq_err) = self
                                .producer
                                .publish_to_dlq(&self.topic, payload, &err)
                                .await
                            {
                                error!(topic = %self.topic, error = %dlq_err, "failed to publish to DLQ");
                            }
                        }
                    }

                    // Advance past the message whether it was handled or
                    // dead-lettered; redelivery is only wanted on crash.
                    if let Err(e) = self.consumer.commit_message(&message, CommitMode::Async) {
                        warn!(topic = %self.topic, error = %e, "failed to commit offset");
                    }
                }
            }
        }
    }
}

async fn run_with_retry(
    retry: &RetryPolicy,
    shutdown: &mut broadcast::Receiver<()>,
    payload: &[u8],
    handler: &dyn MessageHandler,
) -> ProcessOutcome {
    let mut last_error = String::new();

    for attempt in 0..=retry.max_retries {
        if attempt > 0 {
            let backoff = retry.backoff(attempt);
            info!(attempt, backoff_secs = backoff.as_secs(), "retrying message");
            tokio::select! {
                _ = shutdown.recv() => return ProcessOutcome::Cancelled,
                _ = tokio::time::sleep(backoff) => {}
            }
        }

        match handler.handle(payload).await {
            Ok(()) => return ProcessOutcome::Handled,
            Err(e) => {
                warn!(attempt = attempt + 1, error = %e, "handler failed");
                last_error = e.to_string();
            }
        }
    }

    ProcessOutcome::Exhausted(format!(
        "failed after {} attempts: {}",
        retry.max_retries + 1,
        last_error
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyHandler {
        calls: AtomicU32,
        succeed_on: u32,
    }

    #[async_trait]
    impl MessageHandler for FlakyHandler {
        async fn handle(&self, _payload: &[u8]) -> anyhow::Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.succeed_on {
                Ok(())
            } else {
                Err(anyhow::anyhow!("transient failure"))
            }
        }
    }

    #[test]
    fn backoff_schedule() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.backoff(1).as_secs(), 1);
        assert_eq!(retry.backoff(2).as_secs(), 2);
        assert_eq!(retry.backoff(3).as_secs(), 4);
        assert_eq!(retry.backoff(4).as_secs(), 8);
        assert_eq!(retry.backoff(5).as_secs(), 16);
    }

    #[tokio::test]
    async fn first_attempt_success_needs_no_backoff() {
        let (tx, mut rx) = broadcast::channel(1);
        let handler = FlakyHandler {
            calls: AtomicU32::new(0),
            succeed_on: 1,
        };

        let outcome =
            run_with_retry(&RetryPolicy::default(), &mut rx, b"{}", &handler).await;
        assert!(matches!(outcome, ProcessOutcome::Handled));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        drop(tx);
    }

    #[tokio::test]
    async fn zero_retries_exhausts_after_one_attempt() {
        let (tx, mut rx) = broadcast::channel(1);
        let handler = FlakyHandler {
            calls: AtomicU32::new(0),
            succeed_on: u32::MAX,
        };

        let outcome = run_with_retry(
            &RetryPolicy { max_retries: 0 },
            &mut rx,
            b"{}",
            &handler,
        )
        .await;

        match outcome {
            ProcessOutcome::Exhausted(err) => {
                assert!(err.contains("failed after 1 attempts"));
                assert!(err.contains("transient failure"));
            }
            _ => panic!("expected exhaustion"),
        }
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let (tx, mut rx) = broadcast::channel(1);
        let handler = FlakyHandler {
            calls: AtomicU32::new(0),
            succeed_on: 3,
        };

        let outcome =
            run_with_retry(&RetryPolicy::default(), &mut rx, b"{}", &handler).await;
        assert!(matches!(outcome, ProcessOutcome::Handled));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        drop(tx);
    }

    #[tokio::test]
    async fn cancellation_aborts_the_backoff_wait() {
        let (tx, mut rx) = broadcast::channel(1);
        let handler = FlakyHandler {
            calls: AtomicU32::new(0),
            succeed_on: u32::MAX,
        };

        tx.send(()).unwrap();
        let outcome =
            run_with_retry(&RetryPolicy::default(), &mut rx, b"{}", &handler).await;
        assert!(matches!(outcome, ProcessOutcome::Cancelled));
        // Only the initial attempt ran; the first backoff observed shutdown.
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }
}
