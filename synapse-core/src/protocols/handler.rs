//! 消息处理器（MessageHandler）协议
//!
//! 处理器接收已通过 schema 校验的消息；返回错误表示该消息未被成功处理，
//! 消费循环将不确认它，由后端重新投递。
//!
use crate::models::DecodedMessage;

/// 阻塞式消息处理器
pub trait MessageHandler<T>: Send + Sync {
    /// 处理器名称（用于日志与失败报告）
    fn handler_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn handle(&self, message: DecodedMessage<T>) -> anyhow::Result<()>;
}

impl<T, F> MessageHandler<T> for F
where
    F: Fn(DecodedMessage<T>) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, message: DecodedMessage<T>) -> anyhow::Result<()> {
        self(message)
    }
}

#[cfg(feature = "async")]
mod nonblocking {
    use super::*;
    use async_trait::async_trait;

    /// 非阻塞消息处理器
    #[async_trait]
    pub trait AsyncMessageHandler<T>: Send + Sync
    where
        T: Send + 'static,
    {
        fn handler_name(&self) -> &str {
            std::any::type_name::<Self>()
        }

        async fn handle(&self, message: DecodedMessage<T>) -> anyhow::Result<()>;
    }
}

#[cfg(feature = "async")]
pub use nonblocking::AsyncMessageHandler;
