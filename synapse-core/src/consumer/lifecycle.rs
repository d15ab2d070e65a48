//! 消费循环生命周期
//!
//! 状态机：`Created → Started → Running → Stopped`，`Stopped` 可再次 `start`。
//! `stop` 是协作式的，只在批次边界生效：它会立刻唤醒空闲等待，
//! 但不会打断正在进行的 pull / handle / acknowledge。
//!
//! 每次进入 `Running` 都会得到一个带代号的 `RunGuard`。guard 被释放时
//! （正常返回、出错、future 被丢弃或 panic 展开）回到 `Stopped`；
//! 旧代号的循环在重启后立即退出，且不会改写新一轮运行的状态。
//!
use crate::error::{SynapseError, SynapseResult as Result};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[cfg(feature = "async")]
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumerState {
    Created,
    Started,
    Running,
    Stopped,
}

struct Inner {
    state: ConsumerState,
    generation: u64,
    // 每次 start 时若已取消则换新，保证可重启
    #[cfg(feature = "async")]
    cancel: CancellationToken,
}

impl Inner {
    fn owns(&self, generation: u64) -> bool {
        self.state == ConsumerState::Running && self.generation == generation
    }
}

/// 共享的生命周期状态，阻塞与非阻塞循环共用
pub(crate) struct Lifecycle {
    inner: Mutex<Inner>,
    wakeup: Condvar,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ConsumerState::Created,
                generation: 0,
                #[cfg(feature = "async")]
                cancel: CancellationToken::new(),
            }),
            wakeup: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> ConsumerState {
        self.lock().state
    }

    /// `Created/Stopped → Started`；已启动时为 no-op，返回是否发生了转换
    pub(crate) fn start(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            ConsumerState::Created | ConsumerState::Stopped => {
                inner.state = ConsumerState::Started;
                #[cfg(feature = "async")]
                if inner.cancel.is_cancelled() {
                    inner.cancel = CancellationToken::new();
                }
                true
            }
            ConsumerState::Started | ConsumerState::Running => false,
        }
    }

    /// `Started/Running → Stopped`；其它状态为 no-op
    pub(crate) fn stop(&self) -> bool {
        let mut inner = self.lock();
        let changed = match inner.state {
            ConsumerState::Started | ConsumerState::Running => {
                inner.state = ConsumerState::Stopped;
                #[cfg(feature = "async")]
                inner.cancel.cancel();
                true
            }
            ConsumerState::Created | ConsumerState::Stopped => false,
        };
        drop(inner);

        if changed {
            self.wakeup.notify_all();
        }
        changed
    }

    /// 进入 `Running`。未启动时返回 `Ok(None)`（循环直接返回），
    /// 已在运行时返回 `InvalidState`
    pub(crate) fn enter_running(&self) -> Result<Option<RunGuard<'_>>> {
        let mut inner = self.lock();
        match inner.state {
            ConsumerState::Started => {
                inner.state = ConsumerState::Running;
                inner.generation += 1;
                Ok(Some(RunGuard {
                    lifecycle: self,
                    generation: inner.generation,
                    #[cfg(feature = "async")]
                    cancel: inner.cancel.clone(),
                }))
            }
            ConsumerState::Created | ConsumerState::Stopped => Ok(None),
            ConsumerState::Running => Err(SynapseError::invalid_state("consumer is already running")),
        }
    }
}

/// 一轮 `run` 对 `Running` 状态的所有权
pub(crate) struct RunGuard<'a> {
    lifecycle: &'a Lifecycle,
    generation: u64,
    #[cfg(feature = "async")]
    cancel: CancellationToken,
}

impl RunGuard<'_> {
    /// 本轮运行仍持有 `Running`（未被 stop，也未被新一轮取代）
    pub(crate) fn is_running(&self) -> bool {
        self.lifecycle.lock().owns(self.generation)
    }

    /// 阻塞等待至多 `timeout`，期间 `stop` 会立即唤醒
    pub(crate) fn wait_idle(&self, timeout: Duration) {
        if timeout.is_zero() {
            return;
        }
        let inner = self.lifecycle.lock();
        let _ = self
            .lifecycle
            .wakeup
            .wait_timeout_while(inner, timeout, |inner| inner.owns(self.generation))
            .unwrap_or_else(PoisonError::into_inner);
    }

    #[cfg(feature = "async")]
    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.lifecycle.lock();
        if inner.owns(self.generation) {
            inner.state = ConsumerState::Stopped;
            #[cfg(feature = "async")]
            inner.cancel.cancel();
        }
    }
}

/// 可跨线程/任务克隆的停止句柄
#[derive(Clone)]
pub struct StopHandle {
    lifecycle: Arc<Lifecycle>,
}

impl StopHandle {
    pub(crate) fn new(lifecycle: Arc<Lifecycle>) -> Self {
        Self { lifecycle }
    }

    pub fn stop(&self) {
        self.lifecycle.stop();
    }

    pub fn state(&self) -> ConsumerState {
        self.lifecycle.state()
    }
}
