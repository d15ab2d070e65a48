//! 批次报告与失败通知
//!
use crate::error::SynapseResult as Result;
use crate::models::{ErrorInfo, PublishOptions};
use std::collections::HashMap;
use std::fmt;

/// 失败发生的阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureStage {
    Decode,
    Handle,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::Handle => "handle",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单条消息的失败记录；该消息不会被确认
#[derive(Clone, Debug, PartialEq)]
pub struct MessageFailure {
    pub ack_id: String,
    pub message_id: String,
    pub stage: FailureStage,
    pub error: ErrorInfo,
}

/// 一次 pull → 处理 → 确认 周期的结果
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    /// 拉取到的消息数
    pub pulled: usize,
    /// 解码成功的消息数
    pub decoded: usize,
    /// 处理成功的消息数
    pub handled: usize,
    /// 本批确认的 ack_id（按拉取顺序）
    pub acknowledged: Vec<String>,
    pub failures: Vec<MessageFailure>,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.pulled == 0
    }

    pub fn decode_failures(&self) -> usize {
        self.count(FailureStage::Decode)
    }

    pub fn handler_failures(&self) -> usize {
        self.count(FailureStage::Handle)
    }

    fn count(&self, stage: FailureStage) -> usize {
        self.failures.iter().filter(|f| f.stage == stage).count()
    }
}

/// 发往错误主题的一条通知
pub(crate) struct FailureNotice {
    pub payload: Vec<u8>,
    pub options: PublishOptions,
}

/// 把批次中的失败记录转换为待发布的通知
pub(crate) fn failure_notices(
    subscription: &str,
    report: &BatchReport,
) -> Result<Vec<FailureNotice>> {
    report
        .failures
        .iter()
        .map(|failure| {
            let attributes = HashMap::from([
                ("subscription".to_string(), subscription.to_string()),
                ("message_id".to_string(), failure.message_id.clone()),
                ("stage".to_string(), failure.stage.as_str().to_string()),
            ]);

            Ok(FailureNotice {
                payload: failure.error.to_json_vec()?,
                options: PublishOptions::builder().attributes(attributes).build(),
            })
        })
        .collect()
}
