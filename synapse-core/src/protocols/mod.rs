//! 能力协议（capability contracts）
//!
//! 三个相互独立的能力：发布（`Publisher`）、订阅（`Subscriber`）与处理
//! （`MessageHandler`），各有阻塞与非阻塞两种形态。协议不绑定任何消息中间件 SDK，
//! 具体后端通过实现这些 trait 接入。
//!
pub mod handler;
pub mod publisher;
pub mod subscriber;

pub use handler::MessageHandler;
pub use publisher::Publisher;
pub use subscriber::Subscriber;

#[cfg(feature = "async")]
pub use handler::AsyncMessageHandler;
#[cfg(feature = "async")]
pub use publisher::AsyncPublisher;
#[cfg(feature = "async")]
pub use subscriber::AsyncSubscriber;
