//! 消费核心统一错误定义
//!
//! 聚焦传输、解码/校验、发布与配置/状态校验等最小必要集合，
//! 便于各适配器实现统一转换为 `SynapseError`。
//!
//! 约定：只有传输类错误（pull/acknowledge 失败）会从消费循环中向外传播；
//! 解码与处理器失败在单条消息粒度被吸收，仅体现在批次报告与日志中。
//!
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SynapseError {
    // --- 解码/校验 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("decode error: {reason}")]
    Decode { reason: String },
    #[error("validation error: {reason}")]
    Validation { reason: String },

    // --- 传输 ---
    #[error("transport error: operation={operation}, reason={reason}")]
    Transport {
        operation: &'static str,
        reason: String,
    },
    #[error("subscription not found: {0}")]
    SubscriptionNotFound(String),
    #[error("publish error: topic={topic}, reason={reason}")]
    Publish { topic: String, reason: String },

    // --- 配置/状态 ---
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },
}

impl SynapseError {
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn transport(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            reason: reason.into(),
        }
    }

    pub fn publish(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Publish {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState {
            reason: reason.into(),
        }
    }

    /// 稳定的机器可读错误码，用于 `ErrorInfo::code`
    pub fn code(&self) -> &'static str {
        match self {
            Self::Serde { .. } | Self::Decode { .. } => "decode_error",
            Self::Validation { .. } => "validation_error",
            Self::Transport { .. } | Self::SubscriptionNotFound(_) => "transport_error",
            Self::Publish { .. } => "publish_error",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::InvalidState { .. } => "invalid_state",
        }
    }

    /// 是否属于 pull / acknowledge 的传输层失败（消费循环不会重试，直接向调用方传播）；
    /// 发布失败通知失败只记录日志，不属于此类
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::SubscriptionNotFound(_)
        )
    }
}

/// 统一 Result 类型别名
pub type SynapseResult<T> = Result<T, SynapseError>;
