//! synapse-core：与具体中间件无关的拉取式消息消费核心
//!
//! - `models`：请求/响应形态、消息信封、`DecodedMessage` 与 `ErrorInfo`；
//! - `protocols`：`Publisher` / `Subscriber` / `MessageHandler` 能力协议；
//! - `codec`：负载解码与校验；
//! - `consumer`：阻塞与非阻塞消费循环；
//! - `inmemory`：内存 broker，用于测试与本地开发。
//!
//! 非阻塞形态由默认开启的 `async` 特性提供。
//!
pub mod codec;
pub mod consumer;
pub mod error;
pub mod inmemory;
pub mod models;
pub mod protocols;

pub use codec::{JsonCodec, MessageCodec};
pub use consumer::{
    BatchReport, ConsumerConfig, ConsumerState, FailureStage, IdleBackoff, MessageConsumer,
    MessageFailure, StopHandle,
};
pub use error::{SynapseError, SynapseResult};
pub use inmemory::InMemoryBroker;
pub use models::{
    AcknowledgeRequest, DecodedMessage, ErrorDetails, ErrorInfo, PublishOptions, PublishReceipt,
    PubsubMessage, PullRequest, PullResponse, ReceivedMessage,
};
pub use protocols::{MessageHandler, Publisher, Subscriber};

#[cfg(feature = "async")]
pub use consumer::AsyncMessageConsumer;
#[cfg(feature = "async")]
pub use protocols::{AsyncMessageHandler, AsyncPublisher, AsyncSubscriber};
