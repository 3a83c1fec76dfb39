// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// FFmpeg 视频源 (视频文件 / RTSP / 摄像头)
/// FFmpeg video source: decode thread → RGB frames → bounded channel
use std::collections::HashMap;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::stream_info::{find_video_stream_info, StreamInfo};
use ez_ffmpeg::{AVMediaType, FfmpegContext, Frame, Input};
use image::RgbImage;
use log::{debug, info, warn};

use super::camera::{device_index, CameraInput};
use super::convert::{yuv420p_to_rgb, Yuv420Planes};
use super::source::VideoSource;
use crate::error::{PipelineError, Result};

/// 解码线程领先读取端的最大帧数
const DECODE_AHEAD: usize = 4;
/// 网络流卡住多久算读帧失败
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// 解码过滤器: YUV420P 帧 → RgbImage → channel
struct RgbFilter {
    tx: Option<Sender<RgbImage>>,
    decoded: u64,
}

impl FrameFilter for RgbFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> std::result::Result<(), String> {
        debug!("FFmpeg decode filter started");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> std::result::Result<Option<Frame>, String> {
        let Some(tx) = &self.tx else {
            return Err("video source released".to_string());
        };
        let image = unsafe {
            if frame.as_ptr().is_null() {
                return Ok(Some(frame));
            }
            let raw = &*frame.as_ptr();
            let (w, h) = (raw.width as u32, raw.height as u32);
            let y_stride = raw.linesize[0] as usize;
            let uv_stride = raw.linesize[1] as usize;
            let uv_rows = (h as usize).div_ceil(2);
            let planes = Yuv420Planes {
                y: std::slice::from_raw_parts(raw.data[0], y_stride * h as usize),
                u: std::slice::from_raw_parts(raw.data[1], uv_stride * uv_rows),
                v: std::slice::from_raw_parts(raw.data[2], uv_stride * uv_rows),
                y_stride,
                uv_stride,
            };
            yuv420p_to_rgb(&planes, w, h)
        };
        let Some(image) = image else {
            warn!("⚠️ Skipping undecodable frame");
            return Ok(Some(frame));
        };

        self.decoded += 1;
        // 阻塞发送: 读取端慢时解码线程等待, 不丢帧
        if tx.send(image).is_err() {
            return Err("video source released".to_string());
        }
        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        debug!("FFmpeg decode filter exited after {} frames", self.decoded);
        self.tx = None;
    }
}

/// 解码线程内构建 `Input` 所需的参数
struct InputSpec {
    url: String,
    format: Option<&'static str>,
    opts: Vec<(&'static str, &'static str)>,
}

impl InputSpec {
    fn build(&self) -> Input {
        let mut input = Input::new(self.url.as_str());
        if let Some(format) = self.format {
            input = input.set_format(format);
        }
        if !self.opts.is_empty() {
            let opts: HashMap<&str, &str> = self.opts.iter().copied().collect();
            input = input.set_input_opts(opts);
        }
        input
    }
}

pub struct FfmpegSource {
    url: String,
    fps: Option<f64>,
    rx: Option<Receiver<RgbImage>>,
    decoder: Option<JoinHandle<()>>,
}

impl FfmpegSource {
    /// 打开视频文件或流地址; 容器不报告帧率时使用 `fallback_fps`
    pub fn open(url: &str, fallback_fps: Option<f64>) -> Result<Self> {
        let fps = probe_fps(url).or(fallback_fps);
        let mut opts = Vec::new();
        if url.starts_with("rtsp://") {
            opts.push(("rtsp_transport", "tcp"));
        }
        let spec = InputSpec {
            url: url.to_string(),
            format: None,
            opts,
        };
        Self::start(spec, fps)
    }

    /// 打开本地摄像头; `device` 为设备序号或设备名, 帧率由驱动协商
    pub fn open_camera(device: &str, fallback_fps: Option<f64>) -> Result<Self> {
        let mut camera = CameraInput::for_platform(device);
        if camera.needs_device_name() {
            if let Some(index) = device_index(device) {
                let name = list_cameras().into_iter().nth(index).ok_or_else(|| {
                    PipelineError::capture(format!("no camera with index {}", index))
                })?;
                camera = CameraInput::for_platform(&name);
            }
        }
        info!("📷 Camera {} ({})", camera.url, camera.format);
        let spec = InputSpec {
            url: camera.url,
            format: Some(camera.format),
            opts: Vec::new(),
        };
        Self::start(spec, fallback_fps)
    }

    fn start(spec: InputSpec, fps: Option<f64>) -> Result<Self> {
        let url = spec.url.clone();
        let (tx, rx) = bounded(DECODE_AHEAD);
        let (started_tx, started_rx) = bounded::<std::result::Result<(), String>>(1);

        // FFmpeg 上下文在解码线程内构建并运行
        let decoder = thread::Builder::new()
            .name("ffmpeg-decode".to_string())
            .spawn(move || {
                let filter = RgbFilter {
                    tx: Some(tx),
                    decoded: 0,
                };
                let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
                let pipe = pipe.filter("rgb", Box::new(filter));
                let out = create_null_output().add_frame_pipeline(pipe);

                let target = &spec.url;
                let scheduler = FfmpegContext::builder()
                    .input(spec.build())
                    .filter_descs(["format=yuv420p"].into())
                    .output(out)
                    .build()
                    .map_err(|e| format!("cannot open {}: {}", target, e))
                    .and_then(|ctx| {
                        ctx.start()
                            .map_err(|e| format!("cannot start decoding {}: {}", target, e))
                    });
                match scheduler {
                    Ok(scheduler) => {
                        let _ = started_tx.send(Ok(()));
                        if let Err(e) = scheduler.wait() {
                            debug!("FFmpeg decode ended: {}", e);
                        }
                    }
                    Err(e) => {
                        let _ = started_tx.send(Err(e));
                    }
                }
            })?;

        match started_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = decoder.join();
                return Err(PipelineError::capture(e));
            }
            Err(_) => {
                let _ = decoder.join();
                return Err(PipelineError::capture(format!("decoder for {} exited", url)));
            }
        }

        info!("🎬 Opened {}", url);
        Ok(Self {
            url,
            fps,
            rx: Some(rx),
            decoder: Some(decoder),
        })
    }
}

/// 可用的摄像头设备名
pub fn list_cameras() -> Vec<String> {
    match ez_ffmpeg::device::get_input_video_devices() {
        Ok(devices) => devices,
        Err(e) => {
            warn!("⚠️ Cannot list cameras: {}", e);
            vec![]
        }
    }
}

fn probe_fps(url: &str) -> Option<f64> {
    match find_video_stream_info(url) {
        Ok(Some(StreamInfo::Video { fps, .. })) if fps > 0.0 => Some(fps),
        Ok(_) => None,
        Err(e) => {
            warn!("⚠️ Cannot read stream info of {}: {}", url, e);
            None
        }
    }
}

impl VideoSource for FfmpegSource {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        let Some(rx) = &self.rx else {
            return Ok(None);
        };
        match rx.recv_timeout(READ_TIMEOUT) {
            Ok(image) => Ok(Some(image)),
            Err(RecvTimeoutError::Timeout) => Err(PipelineError::capture(format!(
                "no frame from {} within {:?}",
                self.url, READ_TIMEOUT
            ))),
            // 解码线程结束后 channel 断开 = 流结束
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    fn fps(&self) -> Option<f64> {
        self.fps
    }

    fn describe(&self) -> String {
        format!("ffmpeg {}", self.url)
    }

    fn release(&mut self) {
        // 断开 channel, 解码过滤器下次发送时失败并结束解码
        self.rx = None;
        if let Some(decoder) = self.decoder.take() {
            if decoder.join().is_err() {
                warn!("⚠️ FFmpeg decode thread panicked");
            }
        }
    }
}
