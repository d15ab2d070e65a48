//! 订阅者（Subscriber）协议
//!
//! 阻塞与非阻塞两种形态，签名对齐主流云 Pub/Sub 客户端，
//! 其它后端通过薄适配器实现即可接入消费循环。
//!
//! 确认语义：`acknowledge` 在协议层面视为原子操作。返回 `Ok(())` 表示请求中的
//! 全部 ack_id 均已确认；返回错误时消费循环终止，整批消息交由后端重新投递。
//! 后端若存在部分成功的情况，由适配器自行决定映射为成功或失败。
//!
use crate::error::SynapseResult as Result;
use crate::models::{AcknowledgeRequest, PullRequest, PullResponse};
use std::time::Duration;

/// 阻塞式订阅者
pub trait Subscriber: Send + Sync {
    /// 拉取至多 `max_messages` 条消息，约在 `timeout` 内返回；
    /// 没有消息时返回空响应而非错误，仅传输失败时报错
    fn pull(&self, request: &PullRequest, timeout: Duration) -> Result<PullResponse>;

    /// 确认消息，`ack_ids` 为空时应视为 no-op
    fn acknowledge(&self, request: &AcknowledgeRequest) -> Result<()>;
}

#[cfg(feature = "async")]
mod nonblocking {
    use super::*;
    use async_trait::async_trait;

    /// 非阻塞订阅者
    #[async_trait]
    pub trait AsyncSubscriber: Send + Sync {
        async fn pull(&self, request: &PullRequest, timeout: Duration) -> Result<PullResponse>;

        async fn acknowledge(&self, request: &AcknowledgeRequest) -> Result<()>;
    }
}

#[cfg(feature = "async")]
pub use nonblocking::AsyncSubscriber;
