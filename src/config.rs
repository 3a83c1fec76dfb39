// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 流水线配置 (Pipeline configuration)
//!
//! 命令行参数 (`Args`) + JSON配置文件 (`PipelineConfig`)。
//! 命令行显式给出的参数覆盖配置文件中的值。

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::inference::Backend;

/// 默认类别 (单类别救护车模型)
pub const DEFAULT_LABELS: [&str; 1] = ["Ambulance"];

/// 推理后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Cpu,
    Cuda,
    #[value(name = "tensorrt")]
    #[serde(rename = "tensorrt")]
    TensorRt,
}

/// 视频源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// 给了 --device → 摄像头, 目录 → 图片序列, 其他 → FFmpeg
    Auto,
    Images,
    Ffmpeg,
    Camera,
}

/// 默认摄像头
pub const DEFAULT_CAMERA: &str = "0";

/// 解析后的视频源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// 图片序列目录
    Images(PathBuf),
    /// 视频文件或流地址
    Stream(String),
    /// 摄像头序号或设备名
    Camera(String),
}

/// 输出方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputKind {
    Window,
    Headless,
    Dir,
}

/// 检测流水线参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // === 检测参数 ===
    pub conf_threshold: f32, // 置信度阈值 (严格大于才保留)
    pub iou_threshold: f32,  // NMS IOU阈值
    pub labels: Vec<String>,

    // === 采集参数 ===
    pub target_fps: f64,          // 最大采样率
    pub fallback_source_fps: f64, // 图片序列或不报告帧率的视频流使用
    pub capture_retries: u32,     // 读帧失败重试次数

    // === 队列 ===
    pub frame_queue_capacity: usize,
    pub result_queue_capacity: usize,

    // === 推理 ===
    pub input_size: u32,
    pub swap_rb: bool,
    pub backend: BackendKind,
    pub device_id: i32,

    // === 渲染 ===
    pub font: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            conf_threshold: 0.3,
            iou_threshold: 0.4,
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),

            target_fps: 20.0,
            fallback_source_fps: 30.0,
            capture_retries: 3,

            frame_queue_capacity: 30,
            result_queue_capacity: 30,

            input_size: 416,
            swap_rb: false,
            backend: BackendKind::Cpu,
            device_id: 0,

            font: None,
        }
    }
}

impl PipelineConfig {
    /// 从JSON文件加载配置, 缺失字段使用默认值
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        log::info!("✅ Config loaded from {}", path.display());
        Ok(config)
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        log::info!("💾 Config saved to {}", path.as_ref().display());
        Ok(())
    }

    pub fn backend(&self) -> Backend {
        match self.backend {
            BackendKind::Cpu => Backend::Cpu,
            BackendKind::Cuda => Backend::Cuda(self.device_id),
            BackendKind::TensorRt => Backend::TensorRt(self.device_id),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.conf_threshold) {
            return Err(PipelineError::config(format!(
                "confidence threshold must be within [0, 1], got {}",
                self.conf_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(PipelineError::config(format!(
                "NMS IoU threshold must be within [0, 1], got {}",
                self.iou_threshold
            )));
        }
        if !(self.target_fps.is_finite() && self.target_fps > 0.0) {
            return Err(PipelineError::config(format!(
                "target sample rate must be positive, got {}",
                self.target_fps
            )));
        }
        if !(self.fallback_source_fps.is_finite() && self.fallback_source_fps > 0.0) {
            return Err(PipelineError::config(format!(
                "fallback source fps must be positive, got {}",
                self.fallback_source_fps
            )));
        }
        if self.frame_queue_capacity == 0 || self.result_queue_capacity == 0 {
            return Err(PipelineError::config("queue capacities must be at least 1"));
        }
        if self.input_size == 0 {
            return Err(PipelineError::config("input size must be at least 1"));
        }
        if self.labels.is_empty() {
            return Err(PipelineError::config("at least one class label is required"));
        }
        Ok(())
    }

    pub fn print_summary(&self) {
        log::info!("🎛️  Detection config:");
        log::info!("  confidence > {:.2} | NMS IoU {:.2}", self.conf_threshold, self.iou_threshold);
        log::info!("  labels: {:?}", self.labels);
        log::info!(
            "  sample ≤ {:.1} Hz | queues {}/{} | input {}x{} | backend {:?}",
            self.target_fps,
            self.frame_queue_capacity,
            self.result_queue_capacity,
            self.input_size,
            self.input_size,
            self.backend()
        );
    }
}

/// 解析类别文件: 每行一个类别, 忽略空行和 `#` 注释
pub fn parse_labels(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let text = fs::read_to_string(path.as_ref())?;
    let labels = parse_labels(&text);
    if labels.is_empty() {
        return Err(PipelineError::config(format!(
            "labels file {} contains no labels",
            path.as_ref().display()
        )));
    }
    Ok(labels)
}

/// YOLO 实时视频检测
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "YOLO 实时视频检测 - real-time video detection", long_about = None)]
pub struct Args {
    /// 视频源: 视频文件 / RTSP地址 / 图片序列目录
    #[arg(short, long)]
    pub source: Option<String>,

    /// 摄像头序号或设备名 (Windows 为 DirectShow 设备名)
    #[arg(long)]
    pub device: Option<String>,

    /// 视频源类型
    #[arg(long, value_enum, default_value_t = SourceKind::Auto)]
    pub source_kind: SourceKind,

    /// 视频源帧率 (图片序列, 或视频流不报告帧率时)
    #[arg(long)]
    pub source_fps: Option<f64>,

    /// ONNX 检测模型
    #[arg(short, long, default_value = "models/yolov3-ambulance.onnx")]
    pub model: PathBuf,

    /// 类别文件 (每行一个)
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// 置信度阈值 [默认 0.3]
    #[arg(long)]
    pub conf: Option<f32>,

    /// NMS IOU阈值 [默认 0.4]
    #[arg(long)]
    pub iou: Option<f32>,

    /// 最大采样率 Hz [默认 20]
    #[arg(long)]
    pub target_fps: Option<f64>,

    /// 模型输入尺寸 [默认 416]
    #[arg(long)]
    pub input_size: Option<u32>,

    /// 以 BGR 顺序送入模型
    #[arg(long)]
    pub swap_rb: bool,

    /// 推理后端 [默认 cpu]
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// GPU 设备号
    #[arg(long)]
    pub device_id: Option<i32>,

    /// 帧队列容量 [默认 30]
    #[arg(long)]
    pub frame_queue: Option<usize>,

    /// 结果队列容量 [默认 30]
    #[arg(long)]
    pub result_queue: Option<usize>,

    /// 读帧失败重试次数 [默认 3]
    #[arg(long)]
    pub capture_retries: Option<u32>,

    /// 标签字体 (TTF/OTF)
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// 输出方式 (window 需要 `display` 特性)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputKind>,

    /// `--output dir` 时的输出目录
    #[arg(long, default_value = "annotated")]
    pub save_dir: PathBuf,

    /// JSON 配置文件
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Args {
    /// 按 `--source-kind` / `--device` / `--source` 确定视频源
    pub fn source_spec(&self) -> Result<SourceSpec> {
        let kind = match self.source_kind {
            SourceKind::Auto if self.device.is_some() => SourceKind::Camera,
            SourceKind::Auto => match &self.source {
                Some(source) if Path::new(source).is_dir() => SourceKind::Images,
                _ => SourceKind::Ffmpeg,
            },
            kind => kind,
        };

        if kind == SourceKind::Camera {
            let device = self
                .device
                .clone()
                .or_else(|| self.source.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA.to_string());
            return Ok(SourceSpec::Camera(device));
        }

        let Some(source) = self.source.clone() else {
            return Err(PipelineError::config("--source is required unless a camera is used"));
        };
        Ok(match kind {
            SourceKind::Images => SourceSpec::Images(PathBuf::from(source)),
            _ => SourceSpec::Stream(source),
        })
    }

    /// 合并配置文件与命令行参数, 并校验
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(path) = &self.labels {
            config.labels = load_labels(path)?;
        }
        if let Some(v) = self.conf {
            config.conf_threshold = v;
        }
        if let Some(v) = self.iou {
            config.iou_threshold = v;
        }
        if let Some(v) = self.target_fps {
            config.target_fps = v;
        }
        if let Some(v) = self.source_fps {
            config.fallback_source_fps = v;
        }
        if let Some(v) = self.input_size {
            config.input_size = v;
        }
        if self.swap_rb {
            config.swap_rb = true;
        }
        if let Some(v) = self.backend {
            config.backend = v;
        }
        if let Some(v) = self.device_id {
            config.device_id = v;
        }
        if let Some(v) = self.frame_queue {
            config.frame_queue_capacity = v;
        }
        if let Some(v) = self.result_queue {
            config.result_queue_capacity = v;
        }
        if let Some(v) = self.capture_retries {
            config.capture_retries = v;
        }
        if let Some(v) = &self.font {
            config.font = Some(v.clone());
        }

        config.validate()?;
        Ok(config)
    }
}
