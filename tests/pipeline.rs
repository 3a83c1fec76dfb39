// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
// 端到端流水线测试: 假视频源 + 脚本化推理引擎 + 记录显示端

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use image::{Rgb, RgbImage};
use ndarray::{Array, ArrayD, IxDyn};

use yolo_stream::pipeline::{Lifecycle, Pipeline, StopReason};
use yolo_stream::{
    AnnotatedFrame, InferenceEngine, PipelineConfig, PipelineError, RenderSurface, Result,
    SurfaceEvent, VideoSource,
};

/// `frames` 帧后结束 (None = 无限); `fail_after` 帧后每次读取都失败
struct FakeSource {
    frames: Option<u64>,
    fail_after: Option<u64>,
    read: u64,
    fps: Option<f64>,
    releases: Arc<AtomicUsize>,
}

impl FakeSource {
    fn finite(frames: u64, fps: Option<f64>) -> (Self, Arc<AtomicUsize>) {
        let releases = Arc::new(AtomicUsize::new(0));
        let source = Self {
            frames: Some(frames),
            fail_after: None,
            read: 0,
            fps,
            releases: releases.clone(),
        };
        (source, releases)
    }

    fn endless() -> (Self, Arc<AtomicUsize>) {
        let (mut source, releases) = Self::finite(0, None);
        source.frames = None;
        (source, releases)
    }
}

impl VideoSource for FakeSource {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        if self.fail_after.is_some_and(|n| self.read >= n) {
            return Err(PipelineError::capture("camera unplugged"));
        }
        if self.frames.is_some_and(|n| self.read >= n) {
            return Ok(None);
        }
        self.read += 1;
        Ok(Some(RgbImage::from_pixel(64, 48, Rgb([40, 80, 120]))))
    }

    fn fps(&self) -> Option<f64> {
        self.fps
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// 每帧输出一个居中的 0 类检测; 第 `fail_on` 次调用失败
struct ScriptedEngine {
    calls: usize,
    fail_on: Option<usize>,
    delay: Duration,
}

impl ScriptedEngine {
    fn new() -> Self {
        Self {
            calls: 0,
            fail_on: None,
            delay: Duration::ZERO,
        }
    }
}

impl InferenceEngine for ScriptedEngine {
    fn forward(&mut self, input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>> {
        self.calls += 1;
        assert_eq!(input.shape(), &[1, 3, 32, 32]);
        if Some(self.calls) == self.fail_on {
            return Err(PipelineError::inference("device lost"));
        }
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let rows = vec![
            0.5, 0.5, 0.25, 0.25, 1.0, 0.9, //
            0.51, 0.5, 0.25, 0.25, 1.0, 0.6, // 被 NMS 抑制
            0.1, 0.1, 0.05, 0.05, 1.0, 0.2, // 低于阈值
        ];
        Ok(vec![Array::from_shape_vec(IxDyn(&[1, 3, 6]), rows).unwrap()])
    }
}

#[derive(Default)]
struct Recording {
    sequences: Vec<u64>,
    captions: Vec<Vec<String>>,
}

/// 记录收到的帧; `quit_after` 帧后返回 Quit
struct RecordingSurface {
    log: Arc<Mutex<Recording>>,
    quit_after: Option<usize>,
    releases: Arc<AtomicUsize>,
}

impl RecordingSurface {
    fn new(quit_after: Option<usize>) -> (Self, Arc<Mutex<Recording>>, Arc<AtomicUsize>) {
        let log = Arc::new(Mutex::new(Recording::default()));
        let releases = Arc::new(AtomicUsize::new(0));
        let surface = Self {
            log: log.clone(),
            quit_after,
            releases: releases.clone(),
        };
        (surface, log, releases)
    }
}

impl RenderSurface for RecordingSurface {
    fn present(&mut self, frame: &AnnotatedFrame) -> Result<SurfaceEvent> {
        let mut log = self.log.lock().unwrap();
        log.sequences.push(frame.sequence);
        log.captions
            .push(frame.annotations.iter().map(|a| a.caption.clone()).collect());
        if self.quit_after.is_some_and(|n| log.sequences.len() >= n) {
            return Ok(SurfaceEvent::Quit);
        }
        Ok(SurfaceEvent::Continue)
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

fn config() -> PipelineConfig {
    PipelineConfig {
        input_size: 32,
        frame_queue_capacity: 2,
        result_queue_capacity: 2,
        capture_retries: 1,
        ..PipelineConfig::default()
    }
}

fn assert_contiguous_from_zero(sequences: &[u64]) {
    let expected: Vec<u64> = (0..sequences.len() as u64).collect();
    assert_eq!(sequences, expected.as_slice());
}

#[test]
fn test_end_of_stream_renders_in_order() {
    let (source, source_releases) = FakeSource::finite(20, Some(20.0));
    let (surface, log, surface_releases) = RecordingSurface::new(None);

    let summary = Pipeline::run(&config(), source, ScriptedEngine::new(), surface).unwrap();

    assert_eq!(summary.reason, StopReason::EndOfStream);
    assert_eq!(summary.frames_published, 20);
    assert_eq!(summary.frames_inferred, 20);
    assert_eq!(summary.frames_rendered, 20);

    let log = log.lock().unwrap();
    assert_eq!(log.sequences.len() as u64, summary.frames_rendered);
    assert_contiguous_from_zero(&log.sequences);
    for captions in &log.captions {
        assert_eq!(captions, &vec!["Ambulance 0.90".to_string()]);
    }

    assert_eq!(source_releases.load(Ordering::SeqCst), 1);
    assert_eq!(surface_releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_throttled_source_with_slow_engine_drops_nothing_midstream() {
    // 60 fps → 20 Hz: 每3帧取1帧
    let (source, _) = FakeSource::finite(60, Some(60.0));
    let (surface, log, _) = RecordingSurface::new(None);
    let engine = ScriptedEngine {
        delay: Duration::from_millis(3),
        ..ScriptedEngine::new()
    };
    let config = PipelineConfig {
        frame_queue_capacity: 1,
        result_queue_capacity: 1,
        ..config()
    };

    let summary = Pipeline::run(&config, source, engine, surface).unwrap();
    assert_eq!(summary.frames_published, 20);
    assert_eq!(summary.frames_rendered, 20);
    assert_contiguous_from_zero(&log.lock().unwrap().sequences);
}

#[test]
fn test_short_stream_renders_every_frame() {
    let config = PipelineConfig {
        frame_queue_capacity: 30,
        result_queue_capacity: 30,
        ..config()
    };
    for delay_ms in [0, 5, 20] {
        let (source, source_releases) = FakeSource::finite(5, Some(20.0));
        let (surface, log, surface_releases) = RecordingSurface::new(None);
        let engine = ScriptedEngine {
            delay: Duration::from_millis(delay_ms),
            ..ScriptedEngine::new()
        };

        let summary = Pipeline::run(&config, source, engine, surface).unwrap();

        assert_eq!(summary.reason, StopReason::EndOfStream);
        assert_eq!(summary.frames_published, 5);
        assert_eq!(summary.frames_inferred, 5);
        assert_eq!(summary.frames_rendered, 5);
        assert_eq!(log.lock().unwrap().sequences, vec![0, 1, 2, 3, 4]);
        assert_eq!(source_releases.load(Ordering::SeqCst), 1);
        assert_eq!(surface_releases.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_single_frame_stream_is_rendered() {
    let (source, _) = FakeSource::finite(1, None);
    let (surface, log, _) = RecordingSurface::new(None);

    let summary = Pipeline::run(&config(), source, ScriptedEngine::new(), surface).unwrap();

    assert_eq!(summary.reason, StopReason::EndOfStream);
    assert_eq!(summary.frames_rendered, 1);
    assert_eq!(log.lock().unwrap().captions, vec![vec!["Ambulance 0.90".to_string()]]);
}

#[test]
fn test_stop_while_draining_discards_remaining_frames() {
    let (source, source_releases) = FakeSource::finite(10, None);
    let (surface, log, surface_releases) = RecordingSurface::new(None);
    let engine = ScriptedEngine {
        delay: Duration::from_millis(50),
        ..ScriptedEngine::new()
    };
    let config = PipelineConfig {
        frame_queue_capacity: 30,
        result_queue_capacity: 30,
        ..config()
    };

    let pipeline = Pipeline::start(&config, source, engine, surface).unwrap();
    let handle = pipeline.handle();
    thread::sleep(Duration::from_millis(120));
    assert!(handle.stop(StopReason::Interrupted));

    let summary = pipeline.wait().unwrap();
    assert_eq!(summary.reason, StopReason::Interrupted);
    assert_eq!(summary.frames_published, 10);
    assert!(summary.frames_rendered < 10);
    assert_contiguous_from_zero(&log.lock().unwrap().sequences);
    assert_eq!(source_releases.load(Ordering::SeqCst), 1);
    assert_eq!(surface_releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_user_quit_on_finite_stream_wins_over_end_of_stream() {
    let (source, _) = FakeSource::finite(40, None);
    let (surface, log, _) = RecordingSurface::new(Some(3));
    let config = PipelineConfig {
        frame_queue_capacity: 30,
        result_queue_capacity: 30,
        ..config()
    };

    let summary = Pipeline::run(&config, source, ScriptedEngine::new(), surface).unwrap();

    assert_eq!(summary.reason, StopReason::UserQuit);
    assert_eq!(summary.frames_rendered, 3);
    assert_eq!(log.lock().unwrap().sequences, vec![0, 1, 2]);
}

#[test]
fn test_user_quit_stops_pipeline() {
    let (source, source_releases) = FakeSource::endless();
    let (surface, log, surface_releases) = RecordingSurface::new(Some(3));

    let summary = Pipeline::run(&config(), source, ScriptedEngine::new(), surface).unwrap();

    assert_eq!(summary.reason, StopReason::UserQuit);
    assert_eq!(summary.frames_rendered, 3);
    assert_eq!(log.lock().unwrap().sequences, vec![0, 1, 2]);
    assert_eq!(source_releases.load(Ordering::SeqCst), 1);
    assert_eq!(surface_releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_inference_failure_is_fatal() {
    let (source, source_releases) = FakeSource::endless();
    let (surface, log, surface_releases) = RecordingSurface::new(None);
    let engine = ScriptedEngine {
        fail_on: Some(5),
        ..ScriptedEngine::new()
    };

    let pipeline = Pipeline::start(&config(), source, engine, surface).unwrap();
    let handle = pipeline.handle();
    let result = pipeline.wait();

    assert!(matches!(result, Err(PipelineError::Inference(_))));
    assert_eq!(handle.stop_reason(), Some(StopReason::InferenceFailure));
    assert_eq!(handle.lifecycle(), Lifecycle::Stopped);

    let log = log.lock().unwrap();
    assert!(log.sequences.len() <= 4);
    assert_contiguous_from_zero(&log.sequences);
    assert_eq!(source_releases.load(Ordering::SeqCst), 1);
    assert_eq!(surface_releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_capture_failure_after_retries() {
    let (mut source, source_releases) = FakeSource::endless();
    source.fail_after = Some(3);
    let (surface, log, _) = RecordingSurface::new(None);

    let summary = Pipeline::run(&config(), source, ScriptedEngine::new(), surface).unwrap();

    assert_eq!(summary.reason, StopReason::CaptureFailure);
    assert_eq!(summary.frames_published, 3);
    assert_contiguous_from_zero(&log.lock().unwrap().sequences);
    assert_eq!(source_releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_stop_is_idempotent_and_releases_once() {
    let (source, source_releases) = FakeSource::endless();
    let (surface, _, surface_releases) = RecordingSurface::new(None);

    let pipeline = Pipeline::start(&config(), source, ScriptedEngine::new(), surface).unwrap();
    let handle = pipeline.handle();
    assert_eq!(handle.lifecycle(), Lifecycle::Running);
    thread::sleep(Duration::from_millis(50));

    assert!(handle.stop(StopReason::Requested));
    assert!(!handle.stop(StopReason::Interrupted));
    assert!(!pipeline.stop(StopReason::UserQuit));

    let summary = pipeline.wait().unwrap();
    assert_eq!(summary.reason, StopReason::Requested);
    assert_eq!(handle.lifecycle(), Lifecycle::Stopped);
    assert!(!handle.stop(StopReason::Interrupted));

    assert_eq!(source_releases.load(Ordering::SeqCst), 1);
    assert_eq!(surface_releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_dropping_pipeline_stops_it() {
    let (source, source_releases) = FakeSource::endless();
    let (surface, _, surface_releases) = RecordingSurface::new(None);

    let pipeline = Pipeline::start(&config(), source, ScriptedEngine::new(), surface).unwrap();
    let handle = pipeline.handle();
    drop(pipeline);

    assert_eq!(handle.lifecycle(), Lifecycle::Stopped);
    assert_eq!(source_releases.load(Ordering::SeqCst), 1);
    assert_eq!(surface_releases.load(Ordering::SeqCst), 1);
}

#[test]
fn test_invalid_config_starts_nothing() {
    let (source, _) = FakeSource::endless();
    let (surface, log, _) = RecordingSurface::new(None);
    let config = PipelineConfig {
        conf_threshold: 1.5,
        ..config()
    };

    let result = Pipeline::start(&config, source, ScriptedEngine::new(), surface);
    assert!(matches!(result, Err(PipelineError::Config(_))));
    assert!(log.lock().unwrap().sequences.is_empty());
}
