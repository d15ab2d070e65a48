//! 请求模型（PullRequest / AcknowledgeRequest）
//!
//! 纯数据契约，字段名与主流云 Pub/Sub 客户端保持一致，
//! 便于适配器直接透传给底层 SDK。
//!
use crate::error::{SynapseError, SynapseResult};
use serde::{Deserialize, Serialize};

/// 从订阅拉取消息的请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    subscription: String,
    max_messages: u32,
}

impl PullRequest {
    /// 创建拉取请求；订阅名不能为空，`max_messages` 必须大于 0
    pub fn new(subscription: impl Into<String>, max_messages: u32) -> SynapseResult<Self> {
        let subscription = non_empty_subscription(subscription.into())?;
        if max_messages == 0 {
            return Err(SynapseError::invalid_config(
                "max_messages must be greater than 0",
            ));
        }

        Ok(Self {
            subscription,
            max_messages,
        })
    }

    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    pub fn max_messages(&self) -> u32 {
        self.max_messages
    }
}

/// 确认（ack）消息的请求，`ack_ids` 允许为空（此时为 no-op）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcknowledgeRequest {
    subscription: String,
    ack_ids: Vec<String>,
}

impl AcknowledgeRequest {
    pub fn new(subscription: impl Into<String>, ack_ids: Vec<String>) -> SynapseResult<Self> {
        Ok(Self {
            subscription: non_empty_subscription(subscription.into())?,
            ack_ids,
        })
    }

    pub fn subscription(&self) -> &str {
        &self.subscription
    }

    pub fn ack_ids(&self) -> &[String] {
        &self.ack_ids
    }

    pub fn is_empty(&self) -> bool {
        self.ack_ids.is_empty()
    }
}

fn non_empty_subscription(subscription: String) -> SynapseResult<String> {
    if subscription.trim().is_empty() {
        return Err(SynapseError::invalid_config("subscription must not be empty"));
    }
    Ok(subscription)
}
