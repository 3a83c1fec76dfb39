// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 推理适配 (Inference adapter)
///
/// - InferenceEngine: 前向推理接口 (ONNX Runtime 或测试替身)
/// - InferenceAdapter: 帧 → NCHW 张量 → 引擎, 不做检测逻辑
/// - OrtEngine:       ONNX Runtime 实现 (需要 `onnx` 特性)
pub mod adapter;
#[cfg(feature = "onnx")]
pub mod ort_backend;

pub use adapter::{DetectionPacket, InferenceAdapter};
#[cfg(feature = "onnx")]
pub use ort_backend::OrtEngine;

use std::fmt;

use ndarray::ArrayD;

use crate::error::Result;

/// 执行后端
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Cpu,
    Cuda(i32),
    TensorRt(i32),
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Cpu => write!(f, "CPU"),
            Backend::Cuda(id) => write!(f, "CUDA:{}", id),
            Backend::TensorRt(id) => write!(f, "TensorRT:{}", id),
        }
    }
}

/// 前向推理: NCHW 张量 → 原始输出张量
pub trait InferenceEngine {
    fn forward(&mut self, input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>>;

    fn name(&self) -> String {
        "engine".to_string()
    }
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn forward(&mut self, input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>> {
        (**self).forward(input)
    }

    fn name(&self) -> String {
        (**self).name()
    }
}
