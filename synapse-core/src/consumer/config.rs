//! 消费循环配置
//!
use crate::error::{SynapseError, SynapseResult as Result};
use std::{env, time::Duration};

const DEFAULT_MAX_MESSAGES: u32 = 10;
const DEFAULT_PULL_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_IDLE_BASE_MS: u64 = 100;
const DEFAULT_IDLE_MAX_MS: u64 = 5_000;
const MAX_BACKOFF_SHIFT: u32 = 20;

/// 空拉取后的等待策略：`min(base * 2^n, max)`，n 为连续空拉取次数
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdleBackoff {
    base: Duration,
    max: Duration,
}

impl IdleBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// 不等待，空拉取后立即再次拉取
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 1_u32 << attempt.min(MAX_BACKOFF_SHIFT);
        self.base.saturating_mul(multiplier).min(self.max)
    }
}

impl Default for IdleBackoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_IDLE_BASE_MS),
            Duration::from_millis(DEFAULT_IDLE_MAX_MS),
        )
    }
}

/// 消费循环配置
#[derive(Clone, Debug, PartialEq)]
pub struct ConsumerConfig {
    /// 单次拉取的最大消息数
    pub max_messages: u32,
    /// 传给 `pull` 的超时
    pub pull_timeout: Duration,
    /// 空拉取后的退避
    pub idle_backoff: IdleBackoff,
    /// 非阻塞循环中同一批次内处理器的最大并发；1 表示严格按拉取顺序
    pub handler_concurrency: usize,
    /// 设置后，解码/处理失败会以 `ErrorInfo` 发布到该主题（需要 publisher）
    pub error_topic: Option<String>,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            pull_timeout: Duration::from_millis(DEFAULT_PULL_TIMEOUT_MS),
            idle_backoff: IdleBackoff::default(),
            handler_concurrency: 1,
            error_topic: None,
        }
    }
}

impl ConsumerConfig {
    /// 从环境变量读取配置，未设置或为空的项使用默认值
    ///
    /// - `SYNAPSE_MAX_MESSAGES`
    /// - `SYNAPSE_PULL_TIMEOUT_MS`
    /// - `SYNAPSE_IDLE_BACKOFF_BASE_MS` / `SYNAPSE_IDLE_BACKOFF_MAX_MS`
    /// - `SYNAPSE_HANDLER_CONCURRENCY`
    /// - `SYNAPSE_ERROR_TOPIC`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(mut lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_messages = parse_or("SYNAPSE_MAX_MESSAGES", defaults.max_messages, &mut lookup)?;
        let pull_timeout_ms = parse_or(
            "SYNAPSE_PULL_TIMEOUT_MS",
            DEFAULT_PULL_TIMEOUT_MS,
            &mut lookup,
        )?;
        let idle_base_ms = parse_or(
            "SYNAPSE_IDLE_BACKOFF_BASE_MS",
            DEFAULT_IDLE_BASE_MS,
            &mut lookup,
        )?;
        let idle_max_ms = parse_or(
            "SYNAPSE_IDLE_BACKOFF_MAX_MS",
            DEFAULT_IDLE_MAX_MS,
            &mut lookup,
        )?;
        let handler_concurrency = parse_or(
            "SYNAPSE_HANDLER_CONCURRENCY",
            defaults.handler_concurrency,
            &mut lookup,
        )?;
        let error_topic = trimmed(lookup("SYNAPSE_ERROR_TOPIC"));

        let config = Self {
            max_messages,
            pull_timeout: Duration::from_millis(pull_timeout_ms),
            idle_backoff: IdleBackoff::new(
                Duration::from_millis(idle_base_ms),
                Duration::from_millis(idle_max_ms),
            ),
            handler_concurrency,
            error_topic,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_messages == 0 {
            return Err(SynapseError::invalid_config(
                "max_messages must be greater than 0",
            ));
        }
        if self.handler_concurrency == 0 {
            return Err(SynapseError::invalid_config(
                "handler_concurrency must be greater than 0",
            ));
        }
        if self.idle_backoff.base() > self.idle_backoff.max() {
            return Err(SynapseError::invalid_config(
                "idle backoff base must not exceed its max",
            ));
        }
        if matches!(&self.error_topic, Some(topic) if topic.trim().is_empty()) {
            return Err(SynapseError::invalid_config("error_topic must not be blank"));
        }
        Ok(())
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T, F>(key: &str, default: T, lookup: &mut F) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: FnMut(&str) -> Option<String>,
{
    match trimmed(lookup(key)) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| SynapseError::invalid_config(format!("{key}={raw}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl FnMut(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn backoff_starts_at_base_and_doubles() {
        let backoff = IdleBackoff::new(Duration::from_millis(100), Duration::from_secs(10));
        assert_eq!(backoff.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn backoff_is_capped_at_max() {
        let backoff = IdleBackoff::new(Duration::from_secs(1), Duration::from_secs(4));
        assert_eq!(backoff.delay_for_attempt(5), Duration::from_secs(4));
        assert_eq!(backoff.delay_for_attempt(u32::MAX), Duration::from_secs(4));
    }

    #[test]
    fn no_backoff_never_waits() {
        assert_eq!(IdleBackoff::none().delay_for_attempt(7), Duration::ZERO);
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = ConsumerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, ConsumerConfig::default());
        assert_eq!(config.max_messages, 10);
        assert_eq!(config.pull_timeout, Duration::from_secs(30));
    }

    #[test]
    fn reads_overrides_and_ignores_blank_values() {
        let config = ConsumerConfig::from_lookup(lookup_from(&[
            ("SYNAPSE_MAX_MESSAGES", " 25 "),
            ("SYNAPSE_PULL_TIMEOUT_MS", "1500"),
            ("SYNAPSE_HANDLER_CONCURRENCY", "4"),
            ("SYNAPSE_IDLE_BACKOFF_BASE_MS", ""),
            ("SYNAPSE_ERROR_TOPIC", "orders-errors"),
        ]))
        .unwrap();

        assert_eq!(config.max_messages, 25);
        assert_eq!(config.pull_timeout, Duration::from_millis(1500));
        assert_eq!(config.handler_concurrency, 4);
        assert_eq!(config.idle_backoff, IdleBackoff::default());
        assert_eq!(config.error_topic.as_deref(), Some("orders-errors"));
    }

    #[test]
    fn rejects_unparsable_and_zero_values() {
        let err = ConsumerConfig::from_lookup(lookup_from(&[("SYNAPSE_MAX_MESSAGES", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("SYNAPSE_MAX_MESSAGES=lots"));

        let err = ConsumerConfig::from_lookup(lookup_from(&[("SYNAPSE_MAX_MESSAGES", "0")]))
            .unwrap_err();
        assert!(matches!(err, SynapseError::InvalidConfig { .. }));
    }

    #[test]
    fn rejects_inverted_backoff() {
        let config = ConsumerConfig {
            idle_backoff: IdleBackoff::new(Duration::from_secs(2), Duration::from_secs(1)),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
