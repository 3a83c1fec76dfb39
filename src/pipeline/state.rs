// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 流水线生命周期 (Pipeline lifecycle)
//!
//! Running → Stopping → Stopped, 由所有阶段共享。
//! 停止原因只记录第一次, 和状态放在同一个原子变量里一起切换。

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// 低两位是 Lifecycle, 其余位是 StopReason 编码 (0 = 无)
const LIFECYCLE_BITS: u8 = 2;
const LIFECYCLE_MASK: u8 = (1 << LIFECYCLE_BITS) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    Running = 0,
    Stopping = 1,
    Stopped = 2,
}

impl Lifecycle {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Lifecycle::Running,
            1 => Lifecycle::Stopping,
            _ => Lifecycle::Stopped,
        }
    }
}

/// 为什么离开 Running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StopReason {
    /// 视频源读完
    EndOfStream,
    /// 读帧失败 (重试后)
    CaptureFailure,
    /// 用户按下退出键 / 关闭窗口
    UserQuit,
    /// Ctrl-C
    Interrupted,
    /// 推理失败, 致命
    InferenceFailure,
    /// 显示端失败
    SurfaceFailure,
    /// 某个工作线程 panic
    WorkerPanicked,
    /// 外部调用 stop()
    Requested,
}

impl StopReason {
    pub const ALL: [StopReason; 8] = [
        StopReason::EndOfStream,
        StopReason::CaptureFailure,
        StopReason::UserQuit,
        StopReason::Interrupted,
        StopReason::InferenceFailure,
        StopReason::SurfaceFailure,
        StopReason::WorkerPanicked,
        StopReason::Requested,
    ];

    fn code(self) -> u8 {
        self as u8 + 1
    }

    fn from_code(code: u8) -> Option<Self> {
        let index = code.checked_sub(1)?;
        Self::ALL.get(index as usize).copied()
    }
}

fn pack(lifecycle: Lifecycle, reason: Option<StopReason>) -> u8 {
    reason.map_or(0, StopReason::code) << LIFECYCLE_BITS | lifecycle as u8
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::EndOfStream => "end of stream",
            StopReason::CaptureFailure => "capture failure",
            StopReason::UserQuit => "user quit",
            StopReason::Interrupted => "interrupted",
            StopReason::InferenceFailure => "inference failure",
            StopReason::SurfaceFailure => "surface failure",
            StopReason::WorkerPanicked => "worker panicked",
            StopReason::Requested => "stop requested",
        };
        f.write_str(s)
    }
}

/// 所有阶段共享的状态; 停止标志是唯一被多个阶段写入的状态
#[derive(Debug)]
pub struct PipelineState {
    packed: AtomicU8,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineState {
    pub fn new() -> Self {
        Self {
            packed: AtomicU8::new(pack(Lifecycle::Running, None)),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.packed.load(Ordering::Acquire) & LIFECYCLE_MASK)
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle() == Lifecycle::Running
    }

    /// Running → Stopping; 返回 true 表示本次调用触发了停止, 且原因就是 `reason`
    pub fn request_stop(&self, reason: StopReason) -> bool {
        self.packed
            .compare_exchange(
                pack(Lifecycle::Running, None),
                pack(Lifecycle::Stopping, Some(reason)),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// 所有阶段退出、资源释放后调用
    pub(crate) fn mark_stopped(&self) {
        let _ = self
            .packed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                let reason = StopReason::from_code(v >> LIFECYCLE_BITS).unwrap_or(StopReason::Requested);
                Some(pack(Lifecycle::Stopped, Some(reason)))
            });
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        StopReason::from_code(self.packed.load(Ordering::Acquire) >> LIFECYCLE_BITS)
    }
}

/// 各阶段处理计数
#[derive(Debug, Default)]
pub struct StageCounters {
    pub published: AtomicU64,
    pub inferred: AtomicU64,
    pub rendered: AtomicU64,
}

impl StageCounters {
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.published.load(Ordering::Relaxed),
            self.inferred.load(Ordering::Relaxed),
            self.rendered.load(Ordering::Relaxed),
        )
    }
}
