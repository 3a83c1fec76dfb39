// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 帧标注: 检测框 + 类别标签 + 显示帧率
//!
//! 框直接画进 RgbImage; 配置了字体时文字也画进去,
//! 否则由显示端 (窗口) 自己画文字。

use std::fs;
use std::time::Instant;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use log::{debug, info};

use super::fps::FpsCounter;
use crate::config::PipelineConfig;
use crate::detection::{Bbox, Detection, DetectionSet};
use crate::error::{PipelineError, Result};
use crate::input::Frame;

/// 标签文字在框上方的距离
pub const CAPTION_OFFSET: i32 = 10;
/// 帧率文字位置
pub const FPS_ORIGIN: (i32, i32) = (10, 30);
pub const TEXT_SCALE: f32 = 18.0;
const BOX_THICKNESS: i32 = 2;

const BRIGHT_COLORS: [(u8, u8, u8); 12] = [
    (255, 0, 0),     // 红色
    (0, 255, 0),     // 绿色
    (0, 0, 255),     // 蓝色
    (255, 255, 0),   // 黄色
    (255, 0, 255),   // 品红
    (0, 255, 255),   // 青色
    (255, 128, 0),   // 橙色
    (255, 0, 128),   // 粉红
    (128, 255, 0),   // 黄绿
    (0, 128, 255),   // 天蓝
    (255, 255, 255), // 白色
    (128, 0, 255),   // 紫色
];

pub fn class_color(class_id: usize) -> Rgb<u8> {
    let (r, g, b) = BRIGHT_COLORS[class_id % BRIGHT_COLORS.len()];
    Rgb([r, g, b])
}

/// 一个检测框的显示信息
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub bbox: Bbox,
    pub class_id: usize,
    pub caption: String,
    pub color: Rgb<u8>,
}

impl Annotation {
    /// 标签文字左上角; 框在画面顶部时贴住上边缘
    pub fn caption_origin(&self, width: u32, height: u32) -> (i32, i32) {
        let x = to_pixel(self.bbox.xmin(), width).max(0);
        let y = to_pixel(self.bbox.ymin(), height) - CAPTION_OFFSET - TEXT_SCALE as i32;
        (x, y.max(0))
    }
}

/// 渲染结果
#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
    pub sequence: u64,
    pub image: RgbImage,
    pub annotations: Vec<Annotation>,
    pub fps: u32,
    /// 文字是否已画进 image
    pub text_rendered: bool,
}

impl AnnotatedFrame {
    pub fn fps_caption(&self) -> String {
        format!("FPS: {}", self.fps)
    }
}

pub struct Renderer {
    labels: Vec<String>,
    font: Option<FontVec>,
    fps: FpsCounter,
}

impl Renderer {
    pub fn new(labels: Vec<String>) -> Self {
        Self {
            labels,
            font: None,
            fps: FpsCounter::new(),
        }
    }

    pub fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(font);
        self
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let renderer = Self::new(config.labels.clone());
        match &config.font {
            Some(path) => {
                let bytes = fs::read(path)?;
                let font = FontVec::try_from_vec(bytes).map_err(|_| {
                    PipelineError::config(format!("invalid font file {}", path.display()))
                })?;
                info!("🔤 Caption font {}", path.display());
                Ok(renderer.with_font(font))
            }
            None => Ok(renderer),
        }
    }

    /// 未知类别显示为 `class <id>`
    pub fn label(&self, class_id: usize) -> String {
        self.labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class {}", class_id))
    }

    pub fn caption(&self, detection: &Detection) -> String {
        format!("{} {:.2}", self.label(detection.class_id()), detection.confidence())
    }

    pub fn render(&mut self, frame: Frame, detections: &DetectionSet) -> AnnotatedFrame {
        self.render_at(frame, detections, Instant::now())
    }

    pub fn render_at(&mut self, frame: Frame, detections: &DetectionSet, now: Instant) -> AnnotatedFrame {
        if let Some(rate) = self.fps.tick_at(now) {
            debug!("🖥️ Display rate: {} fps", rate);
        }
        let sequence = frame.sequence();
        let mut image = frame.into_image();

        let annotations: Vec<Annotation> = detections
            .iter()
            .map(|det| Annotation {
                bbox: *det.bbox(),
                class_id: det.class_id(),
                caption: self.caption(det),
                color: class_color(det.class_id()),
            })
            .collect();

        for annotation in &annotations {
            draw_box(&mut image, &annotation.bbox, annotation.color);
        }

        let fps = self.fps.current();
        if let Some(font) = &self.font {
            let scale = PxScale::from(TEXT_SCALE);
            let (width, height) = image.dimensions();
            for annotation in &annotations {
                let (x, y) = annotation.caption_origin(width, height);
                draw_text_mut(&mut image, annotation.color, x, y, scale, font, &annotation.caption);
            }
            draw_text_mut(
                &mut image,
                Rgb([0, 255, 0]),
                FPS_ORIGIN.0,
                FPS_ORIGIN.1,
                scale,
                font,
                &format!("FPS: {}", fps),
            );
        }

        AnnotatedFrame {
            sequence,
            image,
            annotations,
            fps,
            text_rendered: self.font.is_some(),
        }
    }
}

/// 像素坐标限制在画面外一个线宽以内; NaN 变成 0
fn to_pixel(v: f32, limit: u32) -> i32 {
    let margin = BOX_THICKNESS as f32;
    v.round().clamp(-margin, limit as f32 + margin) as i32
}

/// 空心框, 超出画面部分被裁掉
fn draw_box(image: &mut RgbImage, bbox: &Bbox, color: Rgb<u8>) {
    let (width, height) = image.dimensions();
    let x = to_pixel(bbox.xmin(), width);
    let y = to_pixel(bbox.ymin(), height);
    let w = (to_pixel(bbox.xmax(), width) - x).max(1);
    let h = (to_pixel(bbox.ymax(), height) - y).max(1);
    for inset in 0..BOX_THICKNESS {
        let (iw, ih) = (w - 2 * inset, h - 2 * inset);
        if iw < 1 || ih < 1 {
            break;
        }
        let rect = Rect::at(x + inset, y + inset).of_size(iw as u32, ih as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}
