// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! ONNX Runtime 推理引擎
//!
//! 请求的加速后端不可用时直接报错, 不静默回退到 CPU。

use std::path::{Path, PathBuf};

use log::info;
use ndarray::ArrayD;
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider, ExecutionProviderDispatch,
    TensorRTExecutionProvider,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use super::{Backend, InferenceEngine};
use crate::error::{PipelineError, Result};

pub struct OrtEngine {
    session: Session,
    backend: Backend,
    model: PathBuf,
}

impl OrtEngine {
    pub fn build(model: impl AsRef<Path>, backend: Backend) -> Result<Self> {
        let model = model.as_ref().to_path_buf();
        if !model.is_file() {
            return Err(PipelineError::config(format!(
                "model file not found: {}",
                model.display()
            )));
        }

        let provider = execution_provider(backend)?;
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_execution_providers([provider])?
            .commit_from_file(&model)?;

        info!("🧠 Loaded {} on {}", model.display(), backend);
        Ok(Self {
            session,
            backend,
            model,
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }
}

fn execution_provider(backend: Backend) -> Result<ExecutionProviderDispatch> {
    match backend {
        Backend::Cpu => Ok(CPUExecutionProvider::default().build()),
        Backend::Cuda(device_id) => {
            let ep = CUDAExecutionProvider::default().with_device_id(device_id);
            ensure_available(&ep, backend)?;
            Ok(ep.build().error_on_failure())
        }
        Backend::TensorRt(device_id) => {
            let ep = TensorRTExecutionProvider::default().with_device_id(device_id);
            ensure_available(&ep, backend)?;
            Ok(ep.build().error_on_failure())
        }
    }
}

fn ensure_available(ep: &impl ExecutionProvider, backend: Backend) -> Result<()> {
    if ep.is_available()? {
        Ok(())
    } else {
        Err(PipelineError::BackendUnavailable {
            backend: backend.to_string(),
        })
    }
}

impl InferenceEngine for OrtEngine {
    fn forward(&mut self, input: ArrayD<f32>) -> Result<Vec<ArrayD<f32>>> {
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let mut ys = Vec::with_capacity(outputs.len());
        for (_, value) in outputs.iter() {
            ys.push(value.try_extract_array::<f32>()?.into_owned());
        }
        Ok(ys)
    }

    fn name(&self) -> String {
        format!("onnxruntime {} ({})", self.model.display(), self.backend)
    }
}
