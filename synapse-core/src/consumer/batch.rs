//! 单批次判定（与 IO 无关）
//!
//! 阻塞与非阻塞循环共用的批次算法：按拉取顺序解码、记录处理结果、
//! 得出唯一一次确认请求。循环本身只负责发起 pull / handle / acknowledge 调用，
//! 是否确认某条消息完全由这里决定：
//! - 解码失败：跳过，不确认，继续下一条；
//! - 处理失败：不确认，继续下一条；
//! - 解码且处理成功：加入本批唯一的确认请求。
//!
use super::report::{BatchReport, FailureStage, MessageFailure};
use crate::codec::MessageCodec;
use crate::error::SynapseResult as Result;
use crate::models::{AcknowledgeRequest, DecodedMessage, ErrorInfo, PullResponse};
use tracing::warn;

/// 解码成功、等待处理的消息
pub(crate) struct PendingMessage<T> {
    pub ack_id: String,
    pub message: DecodedMessage<T>,
}

/// 处理器对一条消息给出的结果
pub(crate) struct HandleOutcome {
    pub ack_id: String,
    pub message_id: String,
    pub result: anyhow::Result<()>,
}

pub(crate) struct Batch<'a, T> {
    subscription: &'a str,
    pending: Vec<PendingMessage<T>>,
    report: BatchReport,
}

impl<'a, T> Batch<'a, T> {
    /// 按拉取顺序解码整批消息，解码失败的消息只记录不中断
    pub(crate) fn decode(
        subscription: &'a str,
        response: PullResponse,
        codec: &dyn MessageCodec<T>,
    ) -> Self {
        let mut report = BatchReport {
            pulled: response.len(),
            ..Default::default()
        };
        let mut pending = Vec::with_capacity(response.len());

        for received in response.received_messages {
            let (ack_id, message, delivery_attempt) = received.into_parts();
            match codec.decode(message.data()) {
                Ok(payload) => pending.push(PendingMessage {
                    ack_id,
                    message: DecodedMessage::new(payload, &message, delivery_attempt),
                }),
                Err(err) => {
                    warn!(
                        subscription,
                        message_id = message.message_id(),
                        error = %err,
                        "message failed decoding, leaving it for redelivery"
                    );
                    report.failures.push(MessageFailure {
                        ack_id,
                        message_id: message.message_id().to_owned(),
                        stage: FailureStage::Decode,
                        error: ErrorInfo::from(&err),
                    });
                }
            }
        }
        report.decoded = pending.len();

        Self {
            subscription,
            pending,
            report,
        }
    }

    /// 取出待处理消息（保持拉取顺序）
    pub(crate) fn take_pending(&mut self) -> Vec<PendingMessage<T>> {
        std::mem::take(&mut self.pending)
    }

    /// 记录一条消息的处理结果
    pub(crate) fn record(&mut self, outcome: HandleOutcome, handler_name: &str) {
        match outcome.result {
            Ok(()) => {
                self.report.handled += 1;
                self.report.acknowledged.push(outcome.ack_id);
            }
            Err(err) => {
                warn!(
                    subscription = self.subscription,
                    handler = handler_name,
                    message_id = %outcome.message_id,
                    error = %format!("{err:#}"),
                    "handler failed, message will not be acknowledged"
                );
                self.report.failures.push(MessageFailure {
                    ack_id: outcome.ack_id,
                    message_id: outcome.message_id,
                    stage: FailureStage::Handle,
                    error: ErrorInfo::from_handler_error(&err),
                });
            }
        }
    }

    /// 结束本批：有可确认的消息时返回唯一一次确认请求
    pub(crate) fn finish(self) -> Result<(Option<AcknowledgeRequest>, BatchReport)> {
        let request = if self.report.acknowledged.is_empty() {
            None
        } else {
            Some(AcknowledgeRequest::new(
                self.subscription,
                self.report.acknowledged.clone(),
            )?)
        };
        Ok((request, self.report))
    }
}

impl<T> PendingMessage<T> {
    /// 拆出 ack_id 与 message_id，消息本身交给处理器
    pub(crate) fn split(self) -> (String, String, DecodedMessage<T>) {
        let message_id = self.message.message_id().to_owned();
        (self.ack_id, message_id, self.message)
    }
}
