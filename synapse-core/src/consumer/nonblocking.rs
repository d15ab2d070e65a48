//! 非阻塞消费循环（AsyncMessageConsumer）
//!
//! 与阻塞版共用批次算法与生命周期，差别只在调用方式：pull、每次 handle
//! 以及 acknowledge 是唯一的挂起点。`stop` 可在挂起点之间被观察到，
//! 但不会放弃进行中的确认调用。
//!
//! `handler_concurrency > 1` 时同一批次内的处理器并发执行（结果按拉取顺序收集），
//! 确认仍在全部处理器完成之后一次性发出。
//!
use super::batch::{Batch, HandleOutcome, PendingMessage};
use super::config::ConsumerConfig;
use super::lifecycle::{ConsumerState, Lifecycle, RunGuard, StopHandle};
use super::report::{BatchReport, failure_notices};
use crate::codec::MessageCodec;
use crate::error::{SynapseError, SynapseResult as Result};
use crate::models::PullRequest;
use crate::protocols::{AsyncMessageHandler, AsyncPublisher, AsyncSubscriber};
use bon::bon;
use futures_util::{StreamExt, stream};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct AsyncMessageConsumer<T>
where
    T: Send + 'static,
{
    subscription: String,
    pull_request: PullRequest,
    handler: Arc<dyn AsyncMessageHandler<T>>,
    codec: Arc<dyn MessageCodec<T>>,
    subscriber: Arc<dyn AsyncSubscriber>,
    publisher: Option<Arc<dyn AsyncPublisher>>,
    config: ConsumerConfig,
    lifecycle: Arc<Lifecycle>,
}

#[bon]
impl<T> AsyncMessageConsumer<T>
where
    T: Send + 'static,
{
    #[builder]
    pub fn new(
        #[builder(into)] subscription: String,
        handler: Arc<dyn AsyncMessageHandler<T>>,
        codec: Arc<dyn MessageCodec<T>>,
        subscriber: Arc<dyn AsyncSubscriber>,
        publisher: Option<Arc<dyn AsyncPublisher>>,
        #[builder(default)] config: ConsumerConfig,
    ) -> Result<Self> {
        config.validate()?;
        if config.error_topic.is_some() && publisher.is_none() {
            return Err(SynapseError::invalid_config(
                "error_topic requires a publisher",
            ));
        }
        let pull_request = PullRequest::new(subscription.clone(), config.max_messages)?;

        Ok(Self {
            subscription,
            pull_request,
            handler,
            codec,
            subscriber,
            publisher,
            config,
            lifecycle: Arc::new(Lifecycle::new()),
        })
    }
}

impl<T> AsyncMessageConsumer<T>
where
    T: Send + 'static,
{
    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    pub fn state(&self) -> ConsumerState {
        self.lifecycle.state()
    }

    pub fn start(&self) {
        if self.lifecycle.start() {
            info!(subscription = %self.subscription, "consumer started");
        }
    }

    pub fn stop(&self) {
        if self.lifecycle.stop() {
            info!(subscription = %self.subscription, "consumer stop requested");
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.lifecycle.clone())
    }

    /// 运行消费循环，直到 `stop` 或传输失败；未 `start` 时立即返回
    pub async fn run(&self) -> Result<()> {
        let Some(run) = self.lifecycle.enter_running()? else {
            debug!(subscription = %self.subscription, "consumer not started, run is a no-op");
            return Ok(());
        };

        // future 被丢弃（超时、select!、abort）时 `run` 随之释放，状态回到 Stopped
        let result = self.run_loop(&run).await;
        drop(run);

        match &result {
            Ok(()) => info!(subscription = %self.subscription, "consumer stopped"),
            Err(err) => error!(subscription = %self.subscription, error = %err, "consumer terminated"),
        }
        result
    }

    async fn run_loop(&self, run: &RunGuard<'_>) -> Result<()> {
        let mut idle_pulls: u32 = 0;

        while run.is_running() {
            let report = self.process_batch().await?;

            if report.is_empty() {
                let delay = self.config.idle_backoff.delay_for_attempt(idle_pulls);
                idle_pulls = idle_pulls.saturating_add(1);
                if !delay.is_zero() {
                    tokio::select! {
                        _ = run.cancellation().cancelled() => {}
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            } else {
                idle_pulls = 0;
            }
        }
        Ok(())
    }

    /// 执行一次完整的 pull → 解码 → 处理 → 确认 周期
    pub async fn process_batch(&self) -> Result<BatchReport> {
        let response = self
            .subscriber
            .pull(&self.pull_request, self.config.pull_timeout)
            .await?;

        let mut batch = Batch::decode(&self.subscription, response, self.codec.as_ref());
        let pending = batch.take_pending();
        let handler_name = self.handler.handler_name();

        for outcome in self.handle_all(pending).await {
            batch.record(outcome, handler_name);
        }

        let (ack, report) = batch.finish()?;
        if let Some(request) = ack {
            self.subscriber.acknowledge(&request).await?;
        }

        if !report.is_empty() {
            debug!(
                subscription = %self.subscription,
                pulled = report.pulled,
                acknowledged = report.acknowledged.len(),
                failed = report.failures.len(),
                "batch processed"
            );
        }
        self.report_failures(&report).await;
        Ok(report)
    }

    async fn handle_all(&self, pending: Vec<PendingMessage<T>>) -> Vec<HandleOutcome> {
        let concurrency = self.config.handler_concurrency;

        if concurrency <= 1 {
            let mut outcomes = Vec::with_capacity(pending.len());
            for message in pending {
                outcomes.push(Self::handle_one(self.handler.as_ref(), message).await);
            }
            return outcomes;
        }

        // buffered 保持输出顺序与输入一致，最多 concurrency 个处理器同时执行
        let handler = self.handler.clone();
        stream::iter(pending)
            .map(move |message| {
                let handler = handler.clone();
                async move { Self::handle_one(handler.as_ref(), message).await }
            })
            .buffered(concurrency)
            .collect()
            .await
    }

    async fn handle_one(
        handler: &dyn AsyncMessageHandler<T>,
        pending: PendingMessage<T>,
    ) -> HandleOutcome {
        let (ack_id, message_id, message) = pending.split();
        let result = handler.handle(message).await;
        HandleOutcome {
            ack_id,
            message_id,
            result,
        }
    }

    async fn report_failures(&self, report: &BatchReport) {
        let (Some(topic), Some(publisher)) = (&self.config.error_topic, &self.publisher) else {
            return;
        };
        if report.failures.is_empty() {
            return;
        }

        let notices = match failure_notices(&self.subscription, report) {
            Ok(notices) => notices,
            Err(err) => {
                warn!(topic = %topic, error = %err, "failed to encode failure notices");
                return;
            }
        };

        for notice in notices {
            if let Err(err) = publisher
                .publish(topic, &notice.payload, &notice.options)
                .await
            {
                warn!(topic = %topic, error = %err, "failed to publish failure notice");
            }
        }
    }
}
