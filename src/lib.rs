// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 配置参数 (命令行 + JSON)
pub mod detection; // 检测解码 + NMS
pub mod error; // 错误类型
pub mod inference; // 预处理 + 推理引擎
pub mod input; // 视频输入 + 抽帧
pub mod pipeline; // 三线程流水线
pub mod renderer; // 标注 + 显示

pub use crate::config::{Args, PipelineConfig};
pub use crate::detection::{non_max_suppression, Bbox, Detection, DetectionDecoder, DetectionSet};
pub use crate::error::{PipelineError, Result};
pub use crate::inference::{Backend, DetectionPacket, InferenceAdapter, InferenceEngine};
pub use crate::input::{Frame, FrameSource, ImageSequenceSource, VideoSource};
pub use crate::pipeline::{Pipeline, PipelineHandle, PipelineSummary, StopReason};
pub use crate::renderer::{AnnotatedFrame, FpsCounter, RenderSurface, Renderer, SurfaceEvent};
