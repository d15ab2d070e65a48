//! 消息解码（MessageCodec）
//!
//! 把原始负载解码为调用方的消息类型 `T`，并可叠加业务校验。
//! 核心只关心“通过或拒绝”，拒绝的消息不会被确认。
//!
use crate::error::{SynapseError, SynapseResult as Result};
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;

/// 负载解码器：相当于消息的 schema
pub trait MessageCodec<T>: Send + Sync {
    fn decode(&self, payload: &[u8]) -> Result<T>;
}

/// 基于 serde_json 的解码器，结构约束由 `T` 的 `Deserialize` 实现表达
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }

    /// 在反序列化之后追加校验，校验失败时返回 `SynapseError::Validation`
    pub fn validated<F>(self, validate: F) -> Validated<Self, F>
    where
        F: Fn(&T) -> std::result::Result<(), String> + Send + Sync,
    {
        Validated {
            inner: self,
            validate,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec")
            .field("target", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> MessageCodec<T> for JsonCodec<T>
where
    T: DeserializeOwned,
{
    fn decode(&self, payload: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// 解码后再执行业务校验
pub struct Validated<C, F> {
    inner: C,
    validate: F,
}

impl<T, C, F> MessageCodec<T> for Validated<C, F>
where
    C: MessageCodec<T>,
    F: Fn(&T) -> std::result::Result<(), String> + Send + Sync,
{
    fn decode(&self, payload: &[u8]) -> Result<T> {
        let value = self.inner.decode(payload)?;
        (self.validate)(&value).map_err(SynapseError::validation)?;
        Ok(value)
    }
}
