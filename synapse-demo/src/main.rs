mod logging;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use synapse_core::consumer::{AsyncMessageConsumer, ConsumerConfig, MessageConsumer};
use synapse_core::models::{DecodedMessage, ErrorInfo, PublishOptions, PullRequest};
use synapse_core::protocols::{AsyncMessageHandler, AsyncPublisher, MessageHandler, Subscriber};
use synapse_core::{InMemoryBroker, JsonCodec};
use tracing::{info, warn};

const ORDERS: &str = "orders";
const BILLING_SUB: &str = "orders-billing";
const AUDIT_SUB: &str = "orders-audit";
const ERRORS: &str = "order-errors";
const ERRORS_SUB: &str = "order-errors-inspect";

#[derive(Debug, Serialize, Deserialize)]
struct OrderPlaced {
    order_id: String,
    amount_cents: i64,
}

/// 计费：金额超过上限的订单处理失败
#[derive(Default)]
struct BillingHandler {
    billed: AtomicUsize,
}

#[async_trait]
impl AsyncMessageHandler<OrderPlaced> for BillingHandler {
    fn handler_name(&self) -> &str {
        "billing"
    }

    async fn handle(&self, message: DecodedMessage<OrderPlaced>) -> anyhow::Result<()> {
        if message.amount_cents > 100_000 {
            anyhow::bail!("order {} exceeds credit limit", message.order_id);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.billed.fetch_add(1, Ordering::Relaxed);
        info!(order_id = %message.order_id, amount_cents = message.amount_cents, "order billed");
        Ok(())
    }
}

/// 审计：阻塞式处理器，在专用线程上运行
#[derive(Default)]
struct AuditHandler {
    recorded: AtomicUsize,
}

impl MessageHandler<OrderPlaced> for AuditHandler {
    fn handler_name(&self) -> &str {
        "audit"
    }

    fn handle(&self, message: DecodedMessage<OrderPlaced>) -> anyhow::Result<()> {
        self.recorded.fetch_add(1, Ordering::Relaxed);
        info!(order_id = %message.order_id, attempt = ?message.delivery_attempt(), "order audited");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = ConsumerConfig {
        pull_timeout: Duration::from_millis(200),
        error_topic: Some(ERRORS.to_string()),
        ..ConsumerConfig::from_env()?
    };

    let broker = InMemoryBroker::new();
    broker.create_subscription(ORDERS, BILLING_SUB)?;
    broker.create_subscription(ORDERS, AUDIT_SUB)?;
    broker.create_subscription(ERRORS, ERRORS_SUB)?;

    let billing = Arc::new(BillingHandler::default());
    let billing_consumer = Arc::new(
        AsyncMessageConsumer::<OrderPlaced>::builder()
            .subscription(BILLING_SUB)
            .handler(billing.clone())
            .codec(Arc::new(JsonCodec::<OrderPlaced>::new()))
            .subscriber(Arc::new(broker.clone()))
            .publisher(Arc::new(broker.clone()))
            .config(config.clone())
            .build()?,
    );

    let audit = Arc::new(AuditHandler::default());
    let audit_consumer = Arc::new(
        MessageConsumer::<OrderPlaced>::builder()
            .subscription(AUDIT_SUB)
            .handler(audit.clone())
            .codec(Arc::new(JsonCodec::<OrderPlaced>::new()))
            .subscriber(Arc::new(broker.clone()))
            .config(ConsumerConfig {
                error_topic: None,
                ..config
            })
            .build()?,
    );

    billing_consumer.start();
    audit_consumer.start();

    let billing_task = tokio::spawn({
        let consumer = billing_consumer.clone();
        async move { consumer.run().await }
    });
    let audit_thread = thread::Builder::new()
        .name("audit-consumer".into())
        .spawn({
            let consumer = audit_consumer.clone();
            move || consumer.run()
        })?;

    for (order_id, amount_cents) in [("o-1", 1_250), ("o-2", 990), ("o-3", 250_000)] {
        let payload = serde_json::to_vec(&OrderPlaced {
            order_id: order_id.to_string(),
            amount_cents,
        })?;
        AsyncPublisher::publish(&broker, ORDERS, &payload, &PublishOptions::default()).await?;
    }
    AsyncPublisher::publish(&broker, ORDERS, b"{\"order_id\":", &PublishOptions::default())
        .await?;

    tokio::time::sleep(Duration::from_millis(500)).await;

    billing_consumer.stop();
    audit_consumer.stop();
    billing_task.await??;
    audit_thread
        .join()
        .map_err(|_| anyhow::anyhow!("audit consumer thread panicked"))??;

    info!(
        billed = billing.billed.load(Ordering::Relaxed),
        audited = audit.recorded.load(Ordering::Relaxed),
        "consumers stopped"
    );

    let failures = Subscriber::pull(
        &broker,
        &PullRequest::new(ERRORS_SUB, 100)?,
        Duration::ZERO,
    )?;
    for received in &failures.received_messages {
        let message = received.message();
        let info = ErrorInfo::from_json_slice(message.data())?;
        warn!(
            stage = message.attributes().get("stage").map(String::as_str),
            message_id = message.attributes().get("message_id").map(String::as_str),
            code = info.code(),
            reason = info.message(),
            "failure notice"
        );
    }

    Ok(())
}
