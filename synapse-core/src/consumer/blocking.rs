//! 阻塞式消费循环（MessageConsumer）
//!
//! 单线程驱动：pull → 逐条解码/处理 → 批量确认 → 重复。
//! 可由调用方放入专用线程运行，核心本身不创建线程。
//!
use super::batch::{Batch, HandleOutcome};
use super::config::ConsumerConfig;
use super::lifecycle::{ConsumerState, Lifecycle, RunGuard, StopHandle};
use super::report::{BatchReport, failure_notices};
use crate::codec::MessageCodec;
use crate::error::{SynapseError, SynapseResult as Result};
use crate::models::PullRequest;
use crate::protocols::{MessageHandler, Publisher, Subscriber};
use bon::bon;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct MessageConsumer<T> {
    subscription: String,
    pull_request: PullRequest,
    handler: Arc<dyn MessageHandler<T>>,
    codec: Arc<dyn MessageCodec<T>>,
    subscriber: Arc<dyn Subscriber>,
    publisher: Option<Arc<dyn Publisher>>,
    config: ConsumerConfig,
    lifecycle: Arc<Lifecycle>,
}

#[bon]
impl<T> MessageConsumer<T> {
    #[builder]
    pub fn new(
        #[builder(into)] subscription: String,
        handler: Arc<dyn MessageHandler<T>>,
        codec: Arc<dyn MessageCodec<T>>,
        subscriber: Arc<dyn Subscriber>,
        publisher: Option<Arc<dyn Publisher>>,
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

impl<T> MessageConsumer<T> {
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

    /// 请求停止；在当前批次确认完成后生效
    pub fn stop(&self) {
        if self.lifecycle.stop() {
            info!(subscription = %self.subscription, "consumer stop requested");
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.lifecycle.clone())
    }

    /// 运行消费循环，直到 `stop` 或传输失败。
    ///
    /// 未调用 `start` 时立即返回。传输失败不重试，直接返回错误，
    /// 由外层监督者决定是否重启。
    pub fn run(&self) -> Result<()> {
        let Some(run) = self.lifecycle.enter_running()? else {
            debug!(subscription = %self.subscription, "consumer not started, run is a no-op");
            return Ok(());
        };

        // 处理器 panic 展开时 `run` 随之释放，状态回到 Stopped
        let result = self.run_loop(&run);
        drop(run);

        match &result {
            Ok(()) => info!(subscription = %self.subscription, "consumer stopped"),
            Err(err) => error!(subscription = %self.subscription, error = %err, "consumer terminated"),
        }
        result
    }

    fn run_loop(&self, run: &RunGuard<'_>) -> Result<()> {
        let mut idle_pulls: u32 = 0;

        while run.is_running() {
            let report = self.process_batch()?;

            if report.is_empty() {
                let delay = self.config.idle_backoff.delay_for_attempt(idle_pulls);
                idle_pulls = idle_pulls.saturating_add(1);
                run.wait_idle(delay);
            } else {
                idle_pulls = 0;
            }
        }
        Ok(())
    }

    /// 执行一次完整的 pull → 解码 → 处理 → 确认 周期
    pub fn process_batch(&self) -> Result<BatchReport> {
        let response = self
            .subscriber
            .pull(&self.pull_request, self.config.pull_timeout)?;

        let mut batch = Batch::decode(&self.subscription, response, self.codec.as_ref());
        let handler_name = self.handler.handler_name();

        for pending in batch.take_pending() {
            let (ack_id, message_id, message) = pending.split();
            let result = self.handler.handle(message);
            batch.record(
                HandleOutcome {
                    ack_id,
                    message_id,
                    result,
                },
                handler_name,
            );
        }

        let (ack, report) = batch.finish()?;
        if let Some(request) = ack {
            self.subscriber.acknowledge(&request)?;
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
        self.report_failures(&report);
        Ok(report)
    }

    fn report_failures(&self, report: &BatchReport) {
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
            if let Err(err) = publisher.publish(topic, &notice.payload, &notice.options) {
                warn!(topic = %topic, error = %err, "failed to publish failure notice");
            }
        }
    }
}
