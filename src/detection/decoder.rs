// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 检测解码器: 原始网络输出 → 置信度过滤 → 像素坐标 → 按类别 NMS
//
// 输出张量每行布局: [cx, cy, w, h, objectness, score_0 .. score_{K-1}] (归一化坐标)
// 置信度 = 最大类别分数 (不乘 objectness)

use ndarray::{ArrayD, Axis};

use super::types::{Bbox, Detection, DetectionSet, RawDetectionCell};
use crate::config::PipelineConfig;

/// 检测解码器 (无状态, 只保存阈值)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionDecoder {
    conf_threshold: f32,
    iou_threshold: f32,
}

impl DetectionDecoder {
    pub fn new(conf_threshold: f32, iou_threshold: f32) -> Self {
        Self {
            conf_threshold,
            iou_threshold,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.conf_threshold, config.iou_threshold)
    }

    pub fn conf_threshold(&self) -> f32 {
        self.conf_threshold
    }

    pub fn iou_threshold(&self) -> f32 {
        self.iou_threshold
    }

    pub fn decode(&self, outputs: &[ArrayD<f32>], frame_width: u32, frame_height: u32) -> DetectionSet {
        decode(
            outputs,
            frame_width,
            frame_height,
            self.conf_threshold,
            self.iou_threshold,
        )
    }
}

/// 完整解码流程: 过滤 + 解码 + NMS
pub fn decode(
    outputs: &[ArrayD<f32>],
    frame_width: u32,
    frame_height: u32,
    conf_threshold: f32,
    iou_threshold: f32,
) -> DetectionSet {
    let candidates = collect_candidates(outputs, frame_width, frame_height, conf_threshold);
    non_max_suppression(candidates, iou_threshold)
}

/// 遍历所有输出张量的所有行, 收集通过置信度过滤的候选框
///
/// 张量按最后一维切行, `[N, 5+K]` 与 `[1, N, 5+K]` 都可以直接处理。
pub fn collect_candidates(
    outputs: &[ArrayD<f32>],
    frame_width: u32,
    frame_height: u32,
    conf_threshold: f32,
) -> Vec<Detection> {
    let mut candidates = Vec::new();
    for output in outputs {
        if output.ndim() == 0 {
            continue;
        }
        let last = Axis(output.ndim() - 1);
        for row in output.lanes(last) {
            let Some(cell) = RawDetectionCell::from_row(row) else {
                continue;
            };
            if let Some(det) = decode_cell(&cell, frame_width, frame_height, conf_threshold) {
                candidates.push(det);
            }
        }
    }
    candidates
}

/// 单行解码; 置信度必须严格大于阈值
pub fn decode_cell(
    cell: &RawDetectionCell<'_>,
    frame_width: u32,
    frame_height: u32,
    conf_threshold: f32,
) -> Option<Detection> {
    let (class_id, confidence) = cell.best_class()?;
    // NaN 比较结果为 false, 同样被丢弃
    if !(confidence > conf_threshold) {
        return None;
    }

    let (w0, h0) = (frame_width as f32, frame_height as f32);
    let center_x = cell.cx * w0;
    let center_y = cell.cy * h0;
    let width = cell.w * w0;
    let height = cell.h * h0;

    Some(Detection::new(
        Bbox::from_cxcywh(center_x, center_y, width, height),
        class_id,
        confidence,
    ))
}

/// 按类别的非极大值抑制
///
/// 按置信度降序, 依次保留与已保留的同类框 IoU 都不超过阈值的框。
/// 不同类别之间互不抑制。
pub fn non_max_suppression(mut xs: Vec<Detection>, iou_threshold: f32) -> DetectionSet {
    xs.sort_by(|b1, b2| b2.confidence().total_cmp(&b1.confidence()));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].class_id() != xs[index].class_id() {
                continue;
            }
            let iou = xs[prev_index].bbox().iou(xs[index].bbox());
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
    DetectionSet::from(xs)
}
