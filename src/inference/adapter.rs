// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 帧预处理 + 前向推理
//!
//! RGB 帧 → 双线性缩放到 input_size × input_size → [0,1] → NCHW [1, 3, S, S]

use std::time::Duration;

use fast_image_resize as fr;
use image::RgbImage;
use ndarray::{Array, ArrayD};

use super::InferenceEngine;
use crate::config::PipelineConfig;
use crate::detection::DetectionSet;
use crate::error::{PipelineError, Result};
use crate::input::Frame;

/// 推理阶段 → 渲染阶段
#[derive(Debug)]
pub struct DetectionPacket {
    pub frame: Frame,
    pub detections: DetectionSet,
    pub inference_time: Duration,
}

pub struct InferenceAdapter<E: InferenceEngine> {
    engine: E,
    input_size: u32,
    swap_rb: bool,
    resizer: fr::Resizer,
}

impl<E: InferenceEngine> InferenceAdapter<E> {
    pub fn new(engine: E, input_size: u32, swap_rb: bool) -> Self {
        Self {
            engine,
            input_size,
            swap_rb,
            resizer: fr::Resizer::new(),
        }
    }

    pub fn from_config(engine: E, config: &PipelineConfig) -> Self {
        Self::new(engine, config.input_size, config.swap_rb)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// 帧 → 原始输出张量
    pub fn infer(&mut self, frame: &Frame) -> Result<Vec<ArrayD<f32>>> {
        let xs = self.preprocess(frame.image())?;
        self.engine.forward(xs)
    }

    pub fn preprocess(&mut self, image: &RgbImage) -> Result<ArrayD<f32>> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(PipelineError::preprocess("empty frame"));
        }
        let size = self.input_size;

        let src_image = fr::images::Image::from_vec_u8(w, h, image.as_raw().clone(), fr::PixelType::U8x3)
            .map_err(|e| PipelineError::preprocess(e.to_string()))?;
        let mut dst_image = fr::images::Image::new(size, size, fr::PixelType::U8x3);
        self.resizer
            .resize(
                &src_image,
                &mut dst_image,
                &fr::ResizeOptions::new()
                    .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
            )
            .map_err(|e| PipelineError::preprocess(e.to_string()))?;

        let s = size as usize;
        let (r, b) = if self.swap_rb { (2, 0) } else { (0, 2) };
        let mut xs = Array::zeros((1, 3, s, s));
        for (i, px) in dst_image.buffer().chunks_exact(3).enumerate() {
            let (y, x) = (i / s, i % s);
            xs[[0, r, y, x]] = px[0] as f32 / 255.0;
            xs[[0, 1, y, x]] = px[1] as f32 / 255.0;
            xs[[0, b, y, x]] = px[2] as f32 / 255.0;
        }
        Ok(xs.into_dyn())
    }
}
