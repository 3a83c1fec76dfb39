// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 帧源 (FrameSource)
//!
//! 从视频源读帧, 按目标帧率抽帧, 把接收的帧送入有界队列。
//! 读帧失败时有限次重试, 之后以 CaptureFailure 停止流水线。
//! 流结束随队列断开向下游传递, 已采集的帧不会丢。

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use image::RgbImage;
use log::{debug, info, warn};

use super::frame::Frame;
use crate::error::{PipelineError, Result};
use crate::pipeline::queue::publish;
use crate::pipeline::state::{PipelineState, StopReason};

/// 两次读帧重试之间的等待
pub const CAPTURE_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// 原始视频源: 文件、图片序列、网络流...
pub trait VideoSource {
    /// `Ok(None)` 表示流结束
    fn read(&mut self) -> Result<Option<RgbImage>>;

    /// 源帧率, 未知时返回 None
    fn fps(&self) -> Option<f64> {
        None
    }

    fn describe(&self) -> String {
        "video source".to_string()
    }

    /// 释放底层句柄; FrameSource 保证只调用一次
    fn release(&mut self) {}
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        (**self).read()
    }

    fn fps(&self) -> Option<f64> {
        (**self).fps()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// 抽帧步长 = max(1, floor(源帧率 / 目标帧率)); 源帧率未知或非法时为1
pub fn frame_stride(source_fps: Option<f64>, target_fps: f64) -> u64 {
    match source_fps {
        Some(fps) if fps.is_finite() && fps > 0.0 && target_fps.is_finite() && target_fps > 0.0 => {
            ((fps / target_fps).floor() as u64).max(1)
        }
        _ => 1,
    }
}

pub struct FrameSource<S: VideoSource> {
    source: S,
    stride: u64,
    capture_retries: u32,
    raw_index: u64,
    sequence: u64,
    released: bool,
}

impl<S: VideoSource> FrameSource<S> {
    pub fn new(source: S, target_fps: f64, capture_retries: u32) -> Self {
        let source_fps = source.fps();
        let stride = frame_stride(source_fps, target_fps);
        info!(
            "📹 {} | source {} fps → target {:.1} fps, keeping 1 of every {} frames",
            source.describe(),
            source_fps.map_or("?".to_string(), |f| format!("{:.1}", f)),
            target_fps,
            stride
        );
        Self {
            source,
            stride,
            capture_retries,
            raw_index: 0,
            sequence: 0,
            released: false,
        }
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// 已读取的原始帧数 (含被跳过的)
    pub fn frames_read(&self) -> u64 {
        self.raw_index
    }

    /// 已接收的帧数
    pub fn frames_accepted(&self) -> u64 {
        self.sequence
    }

    /// 下一个被接收的帧; `Ok(None)` 为流结束, `Err` 为重试耗尽的读帧失败
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            let Some(image) = self.read_with_retry()? else {
                return Ok(None);
            };
            self.raw_index += 1;
            if self.raw_index % self.stride != 0 {
                continue;
            }
            let frame = Frame::new(self.sequence, self.raw_index, image);
            self.sequence += 1;
            return Ok(Some(frame));
        }
    }

    fn read_with_retry(&mut self) -> Result<Option<RgbImage>> {
        let mut attempt = 0;
        loop {
            match self.source.read() {
                Ok(image) => return Ok(image),
                Err(e) if attempt < self.capture_retries => {
                    attempt += 1;
                    warn!(
                        "⚠️ Frame read failed ({}), retry {}/{}",
                        e, attempt, self.capture_retries
                    );
                    thread::sleep(CAPTURE_RETRY_BACKOFF);
                }
                Err(e) => {
                    return Err(PipelineError::capture(format!(
                        "after {} retries: {}",
                        self.capture_retries, e
                    )))
                }
            }
        }
    }

    /// 采集循环: 读帧 → 送入队列, 直到停止、流结束或读帧失败
    ///
    /// 流结束不切换状态: 调用方丢掉 `tx` 后队列断开, 下游把剩下的帧处理完,
    /// 最后一个阶段再以 `EndOfStream` 停止流水线。返回 true 表示流已读完。
    pub fn pump(&mut self, tx: &Sender<Frame>, state: &PipelineState, published: &AtomicU64) -> bool {
        while state.is_running() {
            match self.next_frame() {
                Ok(Some(frame)) => {
                    let sequence = frame.sequence();
                    if publish(tx, frame, state).is_err() {
                        debug!("Frame {} not published, pipeline stopping", sequence);
                        break;
                    }
                    published.fetch_add(1, Ordering::Relaxed);
                }
                Ok(None) => {
                    info!("🏁 Source exhausted after {} frames", self.raw_index);
                    return true;
                }
                Err(e) => {
                    warn!("❌ {}", e);
                    state.request_stop(StopReason::CaptureFailure);
                    break;
                }
            }
        }
        false
    }

    /// 只释放一次; Drop 时也会调用
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.source.release();
            debug!("Video source released");
        }
    }
}

impl<S: VideoSource> Drop for FrameSource<S> {
    fn drop(&mut self) {
        self.release();
    }
}
