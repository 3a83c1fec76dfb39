// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 视频输入 (Video input)
///
/// - VideoSource:         原始视频源接口
/// - FrameSource:         抽帧 + 重试 + 有界队列发布
/// - ImageSequenceSource: 图片目录当作视频
/// - FfmpegSource:        视频文件 / RTSP / 摄像头 (需要 `ffmpeg` 特性)
pub mod camera;
pub mod convert;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod frame;
pub mod image_seq;
pub mod source;

pub use camera::CameraInput;
#[cfg(feature = "ffmpeg")]
pub use ffmpeg::{list_cameras, FfmpegSource};
pub use frame::Frame;
pub use image_seq::ImageSequenceSource;
pub use source::{frame_stride, FrameSource, VideoSource, CAPTURE_RETRY_BACKOFF};
