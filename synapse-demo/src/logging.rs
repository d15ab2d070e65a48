//! 日志初始化

use std::env;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,synapse_core=debug,synapse_demo=debug";

/// 初始化全局 tracing subscriber
///
/// 过滤规则优先级：
/// 1) `RUST_LOG`
/// 2) `SYNAPSE_LOG`
/// 3) 内置默认值
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_thread_names(true)
        .with_env_filter(filter_from_env())
        .try_init();
}

fn filter_from_env() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    if let Some(value) = env::var("SYNAPSE_LOG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        && let Ok(filter) = EnvFilter::try_new(value)
    {
        return filter;
    }

    EnvFilter::new(DEFAULT_FILTER)
}
