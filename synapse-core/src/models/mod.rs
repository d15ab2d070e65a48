//! 数据模型
//!
//! 请求/响应形态、消息信封、解码后的消息与结构化错误模型。
//! 均为纯数据，不含行为，由消费循环与任意适配器共享。
//!
pub mod decoded;
pub mod error_info;
pub mod request;
pub mod response;

pub use decoded::DecodedMessage;
pub use error_info::{ErrorDetails, ErrorInfo};
pub use request::{AcknowledgeRequest, PullRequest};
pub use response::{PublishOptions, PublishReceipt, PubsubMessage, PullResponse, ReceivedMessage};
