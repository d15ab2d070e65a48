//! 响应模型（消息信封）
//!
//! 拉取响应的期望形态：`received_messages[i].message.data` 与
//! `received_messages[i].ack_id`，与主流云 Pub/Sub 客户端一致，
//! 其它后端需由适配器转换为该结构。
//!
use bon::Builder;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// 后端投递的原始消息
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct PubsubMessage {
    /// 原始负载（对核心不透明）
    #[builder(into)]
    data: Vec<u8>,
    /// 消息属性
    #[builder(default)]
    attributes: HashMap<String, String>,
    /// 后端分配的消息 ID（部分后端不提供，此时为空串）
    #[builder(into, default)]
    message_id: String,
    /// 发布时间
    publish_time: Option<DateTime<Utc>>,
    /// 有序投递键
    #[builder(into)]
    ordering_key: Option<String>,
}

impl PubsubMessage {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn publish_time(&self) -> Option<DateTime<Utc>> {
        self.publish_time
    }

    pub fn ordering_key(&self) -> Option<&str> {
        self.ordering_key.as_deref()
    }
}

/// 一次拉取中收到的单条消息
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct ReceivedMessage {
    /// 确认标识，对核心不透明，仅收集并回传
    #[builder(into)]
    ack_id: String,
    message: PubsubMessage,
    /// 投递次数（后端支持时提供）
    delivery_attempt: Option<u32>,
}

impl ReceivedMessage {
    pub fn ack_id(&self) -> &str {
        &self.ack_id
    }

    pub fn message(&self) -> &PubsubMessage {
        &self.message
    }

    pub fn delivery_attempt(&self) -> Option<u32> {
        self.delivery_attempt
    }

    pub fn into_parts(self) -> (String, PubsubMessage, Option<u32>) {
        (self.ack_id, self.message, self.delivery_attempt)
    }
}

/// 拉取响应；超时内没有消息时为空
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullResponse {
    pub received_messages: Vec<ReceivedMessage>,
}

impl PullResponse {
    pub fn new(received_messages: Vec<ReceivedMessage>) -> Self {
        Self { received_messages }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.received_messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.received_messages.is_empty()
    }
}

/// 发布选项
#[derive(Debug, Clone, Default, PartialEq, Eq, Builder)]
pub struct PublishOptions {
    #[builder(default)]
    attributes: HashMap<String, String>,
    #[builder(into)]
    ordering_key: Option<String>,
}

impl PublishOptions {
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    pub fn ordering_key(&self) -> Option<&str> {
        self.ordering_key.as_deref()
    }
}

/// 发布结果；不返回消息 ID 的后端（如 AMQP basic_publish）以空串表示
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReceipt {
    message_id: String,
}

impl PublishReceipt {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }
}
