// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 视频检测流水线 (Video detection pipeline)
///
/// 三线程架构, 通过有界队列通信:
/// - capture:   读帧 + 抽帧 (独立线程)
/// - inference: 预处理 + 推理 + 解码 (独立线程)
/// - render:    标注 + 显示 (独立线程, 窗口本身在主线程)
///
/// 流结束不立即停止: 采集线程退出后队列断开, 下游处理完剩余的帧,
/// 渲染线程收到断开时才切换到 Stopping。退出键、Ctrl-C 和失败会立即停止。
pub mod queue;
pub mod state;
pub mod worker;

pub use state::{Lifecycle, PipelineState, StageCounters, StopReason};
pub use worker::Worker;
use worker::StopOnPanic;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info};

use crate::config::PipelineConfig;
use crate::detection::DetectionDecoder;
use crate::error::{PipelineError, Result};
use crate::inference::{DetectionPacket, InferenceAdapter, InferenceEngine};
use crate::input::{Frame, FrameSource, VideoSource};
use crate::renderer::{FpsCounter, RenderSurface, Renderer, SurfaceEvent, SurfaceGuard};
use queue::{publish, receive};

/// 可克隆的停止句柄 (Ctrl-C、窗口、测试)
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    state: Arc<PipelineState>,
}

impl PipelineHandle {
    /// 幂等; 返回 true 表示本次调用触发了停止
    pub fn stop(&self, reason: StopReason) -> bool {
        let first = self.state.request_stop(reason);
        if first {
            info!("🛑 Stopping pipeline: {}", reason);
        }
        first
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lifecycle()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.state.stop_reason()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    pub reason: StopReason,
    pub frames_published: u64,
    pub frames_inferred: u64,
    pub frames_rendered: u64,
    pub elapsed: Duration,
}

pub struct Pipeline {
    state: Arc<PipelineState>,
    counters: Arc<StageCounters>,
    workers: Vec<Worker>,
    started: Instant,
}

impl Pipeline {
    /// 启动三个阶段线程; 配置或字体错误时不启动任何线程
    pub fn start<S, E, R>(config: &PipelineConfig, source: S, engine: E, surface: R) -> Result<Self>
    where
        S: VideoSource + Send + 'static,
        E: InferenceEngine + Send + 'static,
        R: RenderSurface + Send + 'static,
    {
        config.validate()?;
        let renderer = Renderer::from_config(config)?;
        let adapter = InferenceAdapter::from_config(engine, config);
        let decoder = DetectionDecoder::from_config(config);
        let frames = FrameSource::new(source, config.target_fps, config.capture_retries);

        let state = Arc::new(PipelineState::new());
        let counters = Arc::new(StageCounters::default());
        let (frame_tx, frame_rx) = bounded::<Frame>(config.frame_queue_capacity);
        let (result_tx, result_rx) = bounded::<DetectionPacket>(config.result_queue_capacity);

        let mut workers = Vec::with_capacity(3);
        let spawned = {
            let (st, ct) = (state.clone(), counters.clone());
            Worker::spawn("capture", state.clone(), move || capture_stage(frames, frame_tx, st, ct))
        };
        let worker = abort_on_err(spawned, &mut workers, &state)?;
        workers.push(worker);

        let spawned = {
            let (st, ct) = (state.clone(), counters.clone());
            Worker::spawn("inference", state.clone(), move || {
                inference_stage(adapter, decoder, frame_rx, result_tx, st, ct)
            })
        };
        let worker = abort_on_err(spawned, &mut workers, &state)?;
        workers.push(worker);

        let spawned = {
            let (st, ct) = (state.clone(), counters.clone());
            Worker::spawn("render", state.clone(), move || {
                render_stage(renderer, surface, result_rx, st, ct)
            })
        };
        let worker = abort_on_err(spawned, &mut workers, &state)?;
        workers.push(worker);

        info!("🚀 Pipeline started");
        Ok(Self {
            state,
            counters,
            workers,
            started: Instant::now(),
        })
    }

    /// 启动并等待结束
    pub fn run<S, E, R>(config: &PipelineConfig, source: S, engine: E, surface: R) -> Result<PipelineSummary>
    where
        S: VideoSource + Send + 'static,
        E: InferenceEngine + Send + 'static,
        R: RenderSurface + Send + 'static,
    {
        Self::start(config, source, engine, surface)?.wait()
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            state: self.state.clone(),
        }
    }

    pub fn stop(&self, reason: StopReason) -> bool {
        self.handle().stop(reason)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lifecycle()
    }

    /// 等待所有阶段退出; 推理失败等致命错误在这里返回
    pub fn wait(mut self) -> Result<PipelineSummary> {
        let first_error = self.join_workers();
        let summary = self.summary();
        info!(
            "✅ Pipeline stopped ({}): {} published, {} inferred, {} rendered in {:.1}s",
            summary.reason,
            summary.frames_published,
            summary.frames_inferred,
            summary.frames_rendered,
            summary.elapsed.as_secs_f64()
        );
        match first_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    fn join_workers(&mut self) -> Option<PipelineError> {
        let mut first_error = None;
        for worker in self.workers.drain(..) {
            let name = worker.name().to_string();
            if let Err(e) = worker.join() {
                error!("❌ {} stage failed: {}", name, e);
                first_error.get_or_insert(e);
            }
        }
        self.state.mark_stopped();
        first_error
    }

    fn summary(&self) -> PipelineSummary {
        let (published, inferred, rendered) = self.counters.snapshot();
        PipelineSummary {
            reason: self.state.stop_reason().unwrap_or(StopReason::Requested),
            frames_published: published,
            frames_inferred: inferred,
            frames_rendered: rendered,
            elapsed: self.started.elapsed(),
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.state.request_stop(StopReason::Requested);
            self.join_workers();
        }
    }
}

/// 线程创建失败: 停掉已启动的阶段
fn abort_on_err(spawned: Result<Worker>, workers: &mut Vec<Worker>, state: &PipelineState) -> Result<Worker> {
    spawned.map_err(|e| {
        state.request_stop(StopReason::Requested);
        for worker in workers.drain(..) {
            let _ = worker.join();
        }
        state.mark_stopped();
        e
    })
}

fn capture_stage<S: VideoSource>(
    mut frames: FrameSource<S>,
    tx: Sender<Frame>,
    state: Arc<PipelineState>,
    counters: Arc<StageCounters>,
) -> Result<()> {
    let _panic_guard = StopOnPanic::new(state.clone());
    debug!("Capture thread started");
    let exhausted = frames.pump(&tx, &state, &counters.published);
    frames.release();
    info!(
        "✅ Capture thread exited: {} frames read, {} published{}",
        frames.frames_read(),
        counters.published.load(Ordering::Relaxed),
        if exhausted { ", end of stream" } else { "" }
    );
    Ok(())
}

fn inference_stage<E: InferenceEngine>(
    mut adapter: InferenceAdapter<E>,
    decoder: DetectionDecoder,
    rx: Receiver<Frame>,
    tx: Sender<DetectionPacket>,
    state: Arc<PipelineState>,
    counters: Arc<StageCounters>,
) -> Result<()> {
    let _panic_guard = StopOnPanic::new(state.clone());
    info!("✅ Inference thread started: {}", adapter.engine().name());
    let mut rate = FpsCounter::new();
    let mut busy = Duration::ZERO;

    while let Some(frame) = receive(&rx, &state) {
        let started = Instant::now();
        let outputs = match adapter.infer(&frame) {
            Ok(outputs) => outputs,
            Err(e) => {
                error!("❌ Inference failed on frame {}: {}", frame.sequence(), e);
                state.request_stop(StopReason::InferenceFailure);
                return Err(PipelineError::inference(format!("frame {}: {}", frame.sequence(), e)));
            }
        };
        let detections = decoder.decode(&outputs, frame.width(), frame.height());
        let inference_time = started.elapsed();
        debug!(
            "frame {} → {} detections in {:.1} ms",
            frame.sequence(),
            detections.len(),
            inference_time.as_secs_f64() * 1000.0
        );

        counters.inferred.fetch_add(1, Ordering::Relaxed);
        busy += inference_time;
        if let Some(fps) = rate.tick() {
            info!(
                "🧠 Inference: {} fps | {:.1} ms/frame",
                fps,
                busy.as_secs_f64() * 1000.0 / fps as f64
            );
            busy = Duration::ZERO;
        }

        let packet = DetectionPacket {
            frame,
            detections,
            inference_time,
        };
        if publish(&tx, packet, &state).is_err() {
            break;
        }
    }
    info!("✅ Inference thread exited");
    Ok(())
}

fn render_stage<R: RenderSurface>(
    mut renderer: Renderer,
    surface: R,
    rx: Receiver<DetectionPacket>,
    state: Arc<PipelineState>,
    counters: Arc<StageCounters>,
) -> Result<()> {
    debug!("Render thread started");
    let mut surface = SurfaceGuard::new(surface);

    while let Some(packet) = receive(&rx, &state) {
        let annotated = renderer.render(packet.frame, &packet.detections);
        match surface.present(&annotated) {
            Ok(SurfaceEvent::Continue) => {
                counters.rendered.fetch_add(1, Ordering::Relaxed);
            }
            Ok(SurfaceEvent::Quit) => {
                counters.rendered.fetch_add(1, Ordering::Relaxed);
                info!("👋 Quit requested");
                state.request_stop(StopReason::UserQuit);
                break;
            }
            Err(e) => {
                error!("❌ Render surface failed: {}", e);
                state.request_stop(StopReason::SurfaceFailure);
                return Err(e);
            }
        }
    }
    surface.release();
    // 上游都已正常断开, 剩余帧已画完
    if state.request_stop(StopReason::EndOfStream) {
        info!("🏁 End of stream, all frames rendered");
    }
    info!("✅ Render thread exited");
    Ok(())
}
