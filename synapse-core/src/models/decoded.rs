//! 解码后的消息（DecodedMessage）
//!
use super::PubsubMessage;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::ops::Deref;

/// 经过 schema 校验后的消息负载，附带原始消息的元信息。
///
/// ack_id 不在其中：确认由消费循环负责，处理器无需也不应关心。
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage<T> {
    payload: T,
    message_id: String,
    attributes: HashMap<String, String>,
    publish_time: Option<DateTime<Utc>>,
    delivery_attempt: Option<u32>,
}

impl<T> DecodedMessage<T> {
    pub fn new(payload: T, source: &PubsubMessage, delivery_attempt: Option<u32>) -> Self {
        Self {
            payload,
            message_id: source.message_id().to_owned(),
            publish_time: source.publish_time(),
            attributes: source.attributes().clone(),
            delivery_attempt,
        }
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn into_inner(self) -> T {
        self.payload
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn publish_time(&self) -> Option<DateTime<Utc>> {
        self.publish_time
    }

    pub fn delivery_attempt(&self) -> Option<u32> {
        self.delivery_attempt
    }
}

impl<T> Deref for DecodedMessage<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.payload
    }
}
