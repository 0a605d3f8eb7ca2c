use crate::{BusError, BusResult, EventBus, EventHandler, InboundRecord};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Kafka-backed [`EventBus`]. Producer is configured for idempotent
/// publishing; consumers disable auto-commit and acknowledge each record
/// explicitly once its handler has run.
pub struct KafkaEventBus {
    producer: FutureProducer,
    brokers: String,
}

impl KafkaEventBus {
    pub fn new(brokers: impl Into<String>) -> BusResult<Self> {
        let brokers = brokers.into();
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("max.in.flight.requests.per.connection", "5")
            .create()
            .map_err(|e| BusError::Broker(e.to_string()))?;

        Ok(Self { producer, brokers })
    }
}

#[async_trait]
impl EventBus for KafkaEventBus {
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> BusResult<()> {
        let record = FutureRecord::to(topic).key(key).payload(&payload);

        self.producer
            .send(record, Duration::from_secs(30))
            .await
            .map_err(|(err, _)| BusError::PublishFailed(err.to_string()))?;

        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
        handler: Arc<dyn EventHandler>,
    ) -> BusResult<()> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", group)
            .set("bootstrap.servers", &self.brokers)
            .set("enable.auto.commit", "false")
            .set("session.timeout.ms", "30000")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| BusError::SubscribeFailed(e.to_string()))?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| BusError::SubscribeFailed(e.to_string()))?;

        let topic = topic.to_string();
        let group = group.to_string();

        tokio::spawn(async move {
            loop {
                match consumer.recv().await {
                    Ok(msg) => {
                        let record = InboundRecord {
                            topic: topic.clone(),
                            partition: msg.partition(),
                            offset: msg.offset(),
                            key: msg
                                .key()
                                .map(|k| String::from_utf8_lossy(k).into_owned())
                                .unwrap_or_default(),
                            payload: msg.payload().unwrap_or_default().to_vec(),
                        };

                        if let Err(e) = handler.handle(record).await {
                            error!(topic = %topic, group = %group, error = %e, "handler failed");
                        }

                        // Per §4.3: ack the original record regardless of
                        // handler outcome. Failures are routed to the retry
                        // topic by the handler, not by withholding commit.
                        if let Err(e) =
                            consumer.commit_message(&msg, rdkafka::consumer::CommitMode::Async)
                        {
                            warn!(topic = %topic, group = %group, error = %e, "commit failed");
                        }
                    }
                    Err(e) => {
                        error!(topic = %topic, group = %group, error = %e, "consumer recv error");
                        debug!("backing off before retrying recv");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });

        Ok(())
    }
}
