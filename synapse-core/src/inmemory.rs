//! 内存版 broker（InMemoryBroker）
//!
//! 同时实现阻塞/非阻塞的 `Subscriber` 与 `Publisher` 协议，满足测试、示例与本地开发：
//! - 主题向其上的每个订阅扇出，无订阅的主题上发布的消息被丢弃；
//! - `pull` 取出至多 `max_messages` 条就绪消息，没有消息时最多等待 `timeout`；
//! - 每条被拉取的消息获得新的 ack_id 并进入 in-flight，直到被确认；
//! - `redeliver_unacked` 模拟租约过期：未确认的消息回到队首，投递次数递增。
//!
//! 注意：该实现具备“至少一次”投递语义，且不做持久化。

use crate::error::{SynapseError, SynapseResult as Result};
use crate::models::{
    AcknowledgeRequest, PublishOptions, PublishReceipt, PubsubMessage, PullRequest, PullResponse,
    ReceivedMessage,
};
use crate::protocols::{Publisher, Subscriber};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
struct Delivery {
    message: PubsubMessage,
    attempts: u32,
}

struct SubscriptionQueue {
    topic: String,
    ready: VecDeque<Delivery>,
    // 按拉取顺序保存，便于重投时保持原有顺序
    in_flight: Vec<(String, Delivery)>,
}

#[derive(Default)]
struct BrokerState {
    topics: HashMap<String, Vec<String>>,
    subscriptions: HashMap<String, SubscriptionQueue>,
}

impl BrokerState {
    fn queue_mut(&mut self, subscription: &str) -> Result<&mut SubscriptionQueue> {
        self.subscriptions
            .get_mut(subscription)
            .ok_or_else(|| SynapseError::SubscriptionNotFound(subscription.to_string()))
    }

    fn take(&mut self, request: &PullRequest) -> Result<Vec<ReceivedMessage>> {
        let queue = self.queue_mut(request.subscription())?;
        let count = queue.ready.len().min(request.max_messages() as usize);
        let mut received = Vec::with_capacity(count);

        for mut delivery in queue.ready.drain(..count) {
            delivery.attempts += 1;
            let ack_id = Uuid::new_v4().to_string();
            received.push(
                ReceivedMessage::builder()
                    .ack_id(ack_id.clone())
                    .message(delivery.message.clone())
                    .delivery_attempt(delivery.attempts)
                    .build(),
            );
            queue.in_flight.push((ack_id, delivery));
        }
        Ok(received)
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<BrokerState>,
    available: Condvar,
    #[cfg(feature = "async")]
    notify: tokio::sync::Notify,
}

/// 内存 broker，克隆后共享同一份状态
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// 在主题上创建订阅；同名订阅已绑定到同一主题时为 no-op
    pub fn create_subscription(
        &self,
        topic: impl Into<String>,
        subscription: impl Into<String>,
    ) -> Result<()> {
        let topic = topic.into();
        let subscription = subscription.into();
        if topic.trim().is_empty() || subscription.trim().is_empty() {
            return Err(SynapseError::invalid_config(
                "topic and subscription must not be empty",
            ));
        }

        let mut state = self.lock();
        if let Some(existing) = state.subscriptions.get(&subscription) {
            if existing.topic == topic {
                return Ok(());
            }
            return Err(SynapseError::invalid_config(format!(
                "subscription {subscription} is already bound to topic {}",
                existing.topic
            )));
        }

        state
            .topics
            .entry(topic.clone())
            .or_default()
            .push(subscription.clone());
        state.subscriptions.insert(
            subscription,
            SubscriptionQueue {
                topic,
                ready: VecDeque::new(),
                in_flight: Vec::new(),
            },
        );
        Ok(())
    }

    /// 发布一条消息并唤醒等待中的 pull
    pub fn send(&self, topic: &str, payload: &[u8], options: &PublishOptions) -> PublishReceipt {
        let message_id = Uuid::new_v4().to_string();
        let message = PubsubMessage::builder()
            .data(payload)
            .attributes(options.attributes().clone())
            .message_id(message_id.clone())
            .publish_time(Utc::now())
            .maybe_ordering_key(options.ordering_key().map(str::to_owned))
            .build();

        let mut state = self.lock();
        let BrokerState {
            topics,
            subscriptions,
        } = &mut *state;

        let targets = topics.get(topic).map(Vec::as_slice).unwrap_or_default();
        if targets.is_empty() {
            debug!(topic, message_id = %message_id, "no subscription on topic, message dropped");
        }
        for name in targets {
            if let Some(queue) = subscriptions.get_mut(name) {
                queue.ready.push_back(Delivery {
                    message: message.clone(),
                    attempts: 0,
                });
            }
        }
        drop(state);

        self.shared.available.notify_all();
        #[cfg(feature = "async")]
        self.shared.notify.notify_waiters();

        PublishReceipt::new(message_id)
    }

    /// 把未确认的消息放回队首（保持原有顺序），返回放回的条数
    pub fn redeliver_unacked(&self, subscription: &str) -> Result<usize> {
        let mut state = self.lock();
        let queue = state.queue_mut(subscription)?;
        let in_flight = std::mem::take(&mut queue.in_flight);
        let count = in_flight.len();

        for (_, delivery) in in_flight.into_iter().rev() {
            queue.ready.push_front(delivery);
        }
        drop(state);

        if count > 0 {
            self.shared.available.notify_all();
            #[cfg(feature = "async")]
            self.shared.notify.notify_waiters();
        }
        Ok(count)
    }

    /// 就绪（未被拉取）的消息数
    pub fn ready_count(&self, subscription: &str) -> Result<usize> {
        Ok(self.lock().queue_mut(subscription)?.ready.len())
    }

    /// 已拉取但未确认的消息数
    pub fn in_flight_count(&self, subscription: &str) -> Result<usize> {
        Ok(self.lock().queue_mut(subscription)?.in_flight.len())
    }

    fn settle(&self, request: &AcknowledgeRequest) -> Result<()> {
        let mut state = self.lock();
        let queue = state.queue_mut(request.subscription())?;
        if request.is_empty() {
            return Ok(());
        }
        // 未知的 ack_id（已确认或已重投）直接忽略
        queue
            .in_flight
            .retain(|(ack_id, _)| !request.ack_ids().contains(ack_id));
        Ok(())
    }
}

impl Subscriber for InMemoryBroker {
    fn pull(&self, request: &PullRequest, timeout: Duration) -> Result<PullResponse> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();

        loop {
            let received = state.take(request)?;
            if !received.is_empty() {
                return Ok(PullResponse::new(received));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(PullResponse::empty());
            }
            state = self
                .shared
                .available
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn acknowledge(&self, request: &AcknowledgeRequest) -> Result<()> {
        self.settle(request)
    }
}

impl Publisher for InMemoryBroker {
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        options: &PublishOptions,
    ) -> Result<PublishReceipt> {
        Ok(self.send(topic, payload, options))
    }
}

#[cfg(feature = "async")]
mod nonblocking {
    use super::*;
    use crate::protocols::{AsyncPublisher, AsyncSubscriber};
    use async_trait::async_trait;

    #[async_trait]
    impl AsyncSubscriber for InMemoryBroker {
        async fn pull(&self, request: &PullRequest, timeout: Duration) -> Result<PullResponse> {
            let deadline = tokio::time::Instant::now() + timeout;

            loop {
                // 先登记等待再检查队列，避免检查与等待之间的发布被错过
                let notified = self.shared.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                let received = self.lock().take(request)?;
                if !received.is_empty() {
                    return Ok(PullResponse::new(received));
                }
                if tokio::time::timeout_at(deadline, notified).await.is_err() {
                    return Ok(PullResponse::empty());
                }
            }
        }

        async fn acknowledge(&self, request: &AcknowledgeRequest) -> Result<()> {
            self.settle(request)
        }
    }

    #[async_trait]
    impl AsyncPublisher for InMemoryBroker {
        async fn publish(
            &self,
            topic: &str,
            payload: &[u8],
            options: &PublishOptions,
        ) -> Result<PublishReceipt> {
            Ok(self.send(topic, payload, options))
        }
    }
}
