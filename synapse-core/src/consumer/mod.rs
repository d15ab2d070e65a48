//! 消费循环（consumer）
//!
//! 拉取式消费核心：反复从订阅拉取一批消息，逐条按 schema 解码并交给处理器，
//! 最后对处理成功的消息做一次批量确认：
//! - `MessageConsumer`：阻塞版，单线程驱动；
//! - `AsyncMessageConsumer`：非阻塞版，单个协作式任务驱动（`async` 特性）；
//! - 两者共用批次判定（`batch`）、生命周期（`lifecycle`）与退避策略（`config`）。
//!
//! 投递语义为至少一次：解码或处理失败的消息不会被确认，由后端重新投递。
//!
mod batch;
pub mod blocking;
pub mod config;
mod lifecycle;
#[cfg(feature = "async")]
pub mod nonblocking;
pub mod report;

pub use blocking::MessageConsumer;
pub use config::{ConsumerConfig, IdleBackoff};
pub use lifecycle::{ConsumerState, StopHandle};
#[cfg(feature = "async")]
pub use nonblocking::AsyncMessageConsumer;
pub use report::{BatchReport, FailureStage, MessageFailure};
