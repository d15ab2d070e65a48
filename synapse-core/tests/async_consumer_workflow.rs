use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use synapse_core::consumer::{AsyncMessageConsumer, ConsumerConfig, ConsumerState, IdleBackoff};
use synapse_core::models::{DecodedMessage, ErrorInfo, PublishOptions, PullRequest};
use synapse_core::protocols::{AsyncMessageHandler, AsyncPublisher, AsyncSubscriber};
use synapse_core::{InMemoryBroker, JsonCodec};

const TOPIC: &str = "shipments";
const SUB: &str = "shipments-dispatch";
const ERRORS: &str = "shipment-errors";
const ERRORS_SUB: &str = "shipment-errors-audit";

#[derive(Debug, Serialize, Deserialize)]
struct Shipment {
    shipment_id: String,
    #[serde(default)]
    fragile: bool,
}

#[derive(Default)]
struct DispatchHandler {
    dispatched: Mutex<Vec<String>>,
}

#[async_trait]
impl AsyncMessageHandler<Shipment> for DispatchHandler {
    async fn handle(&self, message: DecodedMessage<Shipment>) -> anyhow::Result<()> {
        tokio::time::sleep(Duration::from_millis(2)).await;
        if message.fragile && message.delivery_attempt() == Some(1) {
            anyhow::bail!("no fragile-goods courier available");
        }
        self.dispatched
            .lock()
            .unwrap()
            .push(message.shipment_id.clone());
        Ok(())
    }
}

fn broker() -> InMemoryBroker {
    let broker = InMemoryBroker::new();
    broker.create_subscription(TOPIC, SUB).unwrap();
    broker.create_subscription(ERRORS, ERRORS_SUB).unwrap();
    broker
}

async fn publish(broker: &InMemoryBroker, shipment_id: &str, fragile: bool) {
    let payload = serde_json::to_vec(&Shipment {
        shipment_id: shipment_id.to_string(),
        fragile,
    })
    .unwrap();
    AsyncPublisher::publish(broker, TOPIC, &payload, &PublishOptions::default())
        .await
        .unwrap();
}

fn consumer(
    broker: &InMemoryBroker,
    handler: Arc<DispatchHandler>,
    handler_concurrency: usize,
) -> AsyncMessageConsumer<Shipment> {
    AsyncMessageConsumer::<Shipment>::builder()
        .subscription(SUB)
        .handler(handler)
        .codec(Arc::new(JsonCodec::<Shipment>::new()))
        .subscriber(Arc::new(broker.clone()))
        .publisher(Arc::new(broker.clone()))
        .config(ConsumerConfig {
            max_messages: 4,
            pull_timeout: Duration::from_millis(50),
            idle_backoff: IdleBackoff::new(Duration::from_millis(5), Duration::from_millis(20)),
            handler_concurrency,
            error_topic: Some(ERRORS.to_string()),
        })
        .build()
        .unwrap()
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn spawned_consumer_processes_until_stopped() {
    let broker = broker();
    let handler = Arc::new(DispatchHandler::default());
    let consumer = Arc::new(consumer(&broker, handler.clone(), 4));
    consumer.start();

    let task = tokio::spawn({
        let consumer = consumer.clone();
        async move { consumer.run().await }
    });

    for i in 0..10 {
        publish(&broker, &format!("s-{i}"), false).await;
    }
    wait_until(|| handler.dispatched.lock().unwrap().len() == 10).await;

    consumer.stop_handle().stop();
    task.await.unwrap().unwrap();

    assert_eq!(consumer.state(), ConsumerState::Stopped);
    assert_eq!(broker.ready_count(SUB).unwrap(), 0);
    assert_eq!(broker.in_flight_count(SUB).unwrap(), 0);
}

#[tokio::test]
async fn handler_failure_is_reported_and_redelivered() {
    let broker = broker();
    let handler = Arc::new(DispatchHandler::default());
    let consumer = consumer(&broker, handler.clone(), 2);

    publish(&broker, "s-1", false).await;
    publish(&broker, "s-2", true).await;
    publish(&broker, "s-3", false).await;

    let report = consumer.process_batch().await.unwrap();
    assert_eq!(report.pulled, 3);
    assert_eq!(report.handled, 2);
    assert_eq!(report.handler_failures(), 1);
    assert_eq!(*handler.dispatched.lock().unwrap(), vec!["s-1", "s-3"]);

    let errors = AsyncSubscriber::pull(
        &broker,
        &PullRequest::new(ERRORS_SUB, 10).unwrap(),
        Duration::ZERO,
    )
    .await
    .unwrap();
    assert_eq!(errors.len(), 1);
    let notice = errors.received_messages[0].message();
    assert_eq!(notice.attributes()["subscription"], SUB);
    assert_eq!(notice.attributes()["stage"], "handle");
    let info = ErrorInfo::from_json_slice(notice.data()).unwrap();
    assert_eq!(info.code(), "handler_error");
    assert_eq!(info.message(), "no fragile-goods courier available");

    assert_eq!(broker.redeliver_unacked(SUB).unwrap(), 1);
    let report = consumer.process_batch().await.unwrap();
    assert_eq!(report.handled, 1);
    assert_eq!(handler.dispatched.lock().unwrap().last().unwrap(), "s-2");
}

#[tokio::test]
async fn idle_consumer_stops_promptly() {
    let broker = broker();
    let consumer = Arc::new(consumer(&broker, Arc::new(DispatchHandler::default()), 1));
    consumer.start();

    let task = tokio::spawn({
        let consumer = consumer.clone();
        async move { consumer.run().await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    consumer.stop();

    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(consumer.state(), ConsumerState::Stopped);
}
