//! 发布者（Publisher）协议
//!
//! 核心不对投递可靠性做任何约定，重试与退避由具体实现负责。
//!
use crate::error::SynapseResult as Result;
use crate::models::{PublishOptions, PublishReceipt};

/// 阻塞式发布者
pub trait Publisher: Send + Sync {
    fn publish(&self, topic: &str, payload: &[u8], options: &PublishOptions)
    -> Result<PublishReceipt>;
}

#[cfg(feature = "async")]
mod nonblocking {
    use super::*;
    use async_trait::async_trait;

    /// 非阻塞发布者
    #[async_trait]
    pub trait AsyncPublisher: Send + Sync {
        async fn publish(
            &self,
            topic: &str,
            payload: &[u8],
            options: &PublishOptions,
        ) -> Result<PublishReceipt>;
    }
}

#[cfg(feature = "async")]
pub use nonblocking::AsyncPublisher;
