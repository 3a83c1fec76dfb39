// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 工作线程 (named stage thread)

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::error;

use super::state::{PipelineState, StopReason};
use crate::error::{PipelineError, Result};

/// 一个阶段一个线程; 线程 panic 时自动请求停止, 其他阶段不会卡住
pub struct Worker {
    name: String,
    handle: JoinHandle<Result<()>>,
}

impl Worker {
    pub fn spawn<F>(name: &str, state: Arc<PipelineState>, body: F) -> Result<Self>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _guard = StopOnPanic::new(state);
                body()
            })?;
        Ok(Self {
            name: name.to_string(),
            handle,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> Result<()> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(PipelineError::WorkerPanicked(self.name)),
        }
    }
}

/// 线程 panic 时请求停止。阶段函数里再放一个, 可以在队列端点被释放之前生效,
/// 下游因此不会把 panic 引起的断开当成流结束。
pub(crate) struct StopOnPanic(Arc<PipelineState>);

impl StopOnPanic {
    pub(crate) fn new(state: Arc<PipelineState>) -> Self {
        Self(state)
    }
}

impl Drop for StopOnPanic {
    fn drop(&mut self) {
        if thread::panicking() && self.0.request_stop(StopReason::WorkerPanicked) {
            let name = thread::current().name().unwrap_or("worker").to_string();
            error!("❌ {} panicked, stopping pipeline", name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::Lifecycle;

    #[test]
    fn test_worker_returns_body_result() {
        let state = Arc::new(PipelineState::new());
        let ok = Worker::spawn("ok", state.clone(), || Ok(())).unwrap();
        assert_eq!(ok.name(), "ok");
        assert!(ok.join().is_ok());

        let failing = Worker::spawn("failing", state.clone(), || {
            Err(PipelineError::inference("boom"))
        })
        .unwrap();
        assert!(matches!(failing.join(), Err(PipelineError::Inference(_))));
        assert!(state.is_running());
    }

    #[test]
    fn test_panicking_worker_stops_pipeline() {
        let state = Arc::new(PipelineState::new());
        let worker = Worker::spawn("doomed", state.clone(), || panic!("stage bug")).unwrap();
        match worker.join() {
            Err(PipelineError::WorkerPanicked(name)) => assert_eq!(name, "doomed"),
            other => panic!("unexpected join result: {:?}", other),
        }
        assert_eq!(state.lifecycle(), Lifecycle::Stopping);
        assert_eq!(state.stop_reason(), Some(StopReason::WorkerPanicked));
    }
}
