//! ONNX Runtime implementation of [`InferenceSession`].

use anyhow::Result;
use half::{bf16, f16};
use ndarray::{Array, IxDyn};
use ort::{
    execution_providers::{
        CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider,
        TensorRTExecutionProvider,
    },
    session::builder::{GraphOptimizationLevel, SessionBuilder},
    session::{Session, SessionInputValue},
    tensor::TensorElementType,
    value::{DynValue, Value, ValueType},
};
use std::path::Path;
use crate::common::InferenceDevice;
use crate::data::{DType, Tensor, TensorInfo, TensorMuts, TensorRefs};
use crate::detection_runners::InferenceSession;

const CROSS_MARK: &str = "❌";

#[derive(Debug, Clone)]
pub struct OrtSessionOptions {
    /// Location of the onnxruntime shared library, loaded at runtime.
    pub ort_lib_path: Option<String>,
    pub device: InferenceDevice,
    /// Used for a dynamic batch dimension.
    pub batch_size: usize,
    /// Used for dynamic spatial dimensions of 4-D inputs.
    pub input_height: usize,
    pub input_width: usize,
    pub trt_fp16: bool,
}

impl Default for OrtSessionOptions {
    fn default() -> Self {
        Self {
            ort_lib_path: None,
            device: InferenceDevice::CPU,
            batch_size: 1,
            input_height: 640,
            input_width: 640,
            trt_fp16: false,
        }
    }
}

impl OrtSessionOptions {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_ort_lib_path(mut self, path: &str) -> Self {
        self.ort_lib_path = Some(path.to_string());
        self
    }

    pub fn with_device(mut self, device: InferenceDevice) -> Self {
        self.device = device;
        self
    }

    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }

    pub fn with_input_size(mut self, height: usize, width: usize) -> Self {
        self.input_height = height;
        self.input_width = width;
        self
    }

    pub fn with_trt_fp16(mut self, x: bool) -> Self {
        self.trt_fp16 = x;
        self
    }
}

/// A compiled ONNX model bound to one execution provider.
#[derive(Debug)]
pub struct OrtSession {
    session: Session,
    device: InferenceDevice,
    graph_name: String,
    inputs: Vec<TensorInfo>,
    input_dtypes: Vec<TensorElementType>,
    outputs: Vec<TensorInfo>,
    output_dtypes: Vec<TensorElementType>,
}

impl OrtSession {
    pub fn new<P: AsRef<Path>>(model_path: P, options: &OrtSessionOptions) -> Result<Self> {
        let model_path = model_path.as_ref();

        if let Some(lib_path) = &options.ort_lib_path {
            match ort::init_from(lib_path).commit() {
                Ok(_) => {}
                Err(err) => anyhow::bail!("{CROSS_MARK} Failed to commit ORT from {lib_path}: {err:?}"),
            }
        }

        let mut builder = Session::builder()?;
        let mut device = options.device;
        match device {
            InferenceDevice::TensorRT(device_id) => {
                Self::build_trt(&mut builder, device_id, options.trt_fp16).unwrap_or_else(|err| {
                    log::warn!("{err}, Using cpu");
                    device = InferenceDevice::CPU;
                })
            }
            InferenceDevice::CUDA(device_id) => Self::build_cuda(&mut builder, device_id).unwrap_or_else(|err| {
                log::warn!("{err}, Using cpu");
                device = InferenceDevice::CPU;
            }),
            InferenceDevice::CoreML(_) => Self::build_coreml(&mut builder).unwrap_or_else(|err| {
                log::warn!("{err}, Using cpu");
                device = InferenceDevice::CPU;
            }),
            InferenceDevice::CPU => Self::build_cpu(&mut builder)?,
        }

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path)?;

        let mut inputs = Vec::new();
        let mut input_dtypes = Vec::new();
        for input in session.inputs.iter() {
            let (dtype, shape) = Self::resolve(&input.name, &input.input_type, options, true)?;
            inputs.push(TensorInfo::new(&input.name, &shape, Self::dtype(&dtype)));
            input_dtypes.push(dtype);
        }

        let mut outputs = Vec::new();
        let mut output_dtypes = Vec::new();
        for output in session.outputs.iter() {
            let (dtype, shape) = Self::resolve(&output.name, &output.output_type, options, false)?;
            outputs.push(TensorInfo::new(&output.name, &shape, Self::dtype(&dtype)));
            output_dtypes.push(dtype);
        }

        let graph_name = model_path
            .file_stem()
            .map(|x| x.to_string_lossy().to_string())
            .unwrap_or_default();

        log::info!(
            "Backend: ONNXRuntime | Model: {} | Device: {} | Inputs: {:?} | Outputs: {:?}",
            graph_name,
            device,
            inputs.iter().map(|x| (&x.name, &x.shape)).collect::<Vec<_>>(),
            outputs.iter().map(|x| (&x.name, &x.shape)).collect::<Vec<_>>(),
        );

        Ok(Self {
            session,
            device,
            graph_name,
            inputs,
            input_dtypes,
            outputs,
            output_dtypes,
        })
    }

    /// Device actually in use; falls back to CPU when the requested provider is unavailable.
    pub fn device(&self) -> InferenceDevice {
        self.device
    }

    // Dynamic dims are reported as 0 except where the options pin them.
    fn resolve(
        name: &str,
        value_type: &ValueType,
        options: &OrtSessionOptions,
        is_input: bool,
    ) -> Result<(TensorElementType, Vec<usize>)> {
        let (ty, shape) = match value_type {
            ValueType::Tensor { ty, shape, .. } => (*ty, shape),
            _ => anyhow::bail!("{CROSS_MARK} `{name}` is not a tensor"),
        };

        let rank = shape.len();
        let dims = shape
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                if d > 0 {
                    return d as usize;
                }
                match (i, is_input && rank == 4) {
                    (0, _) => options.batch_size,
                    (2, true) => options.input_height,
                    (3, true) => options.input_width,
                    _ => 0,
                }
            })
            .collect();
        Ok((ty, dims))
    }

    fn dtype(x: &TensorElementType) -> DType {
        match x {
            TensorElementType::Float16 | TensorElementType::Bfloat16 => DType::F16,
            TensorElementType::Uint8 | TensorElementType::Bool => DType::U8,
            TensorElementType::Int8 => DType::I8,
            TensorElementType::Int32 | TensorElementType::Int16 => DType::I32,
            TensorElementType::Int64 => DType::I64,
            _ => DType::F32,
        }
    }

    fn build_trt(builder: &mut SessionBuilder, device_id: usize, fp16_enable: bool) -> Result<()> {
        let ep = TensorRTExecutionProvider::default()
            .with_device_id(device_id as i32)
            .with_fp16(fp16_enable)
            .with_engine_cache(true)
            .with_engine_cache_path("trt-cache");
        if ep.is_available()? {
            match ep.register(builder) {
                Ok(_) => {}
                Err(err) => anyhow::bail!("{CROSS_MARK} TensorRT initialization failed: {:?}", err),
            }
            log::info!("Initial model serialization with TensorRT may take some time...");
            Ok(())
        } else {
            anyhow::bail!("{CROSS_MARK} TensorRT execution provider not available")
        }
    }

    fn build_cuda(builder: &mut SessionBuilder, device_id: usize) -> Result<()> {
        let ep = CUDAExecutionProvider::default().with_device_id(device_id as i32);
        if ep.is_available()? {
            match ep.register(builder) {
                Ok(_) => {}
                Err(err) => anyhow::bail!("{CROSS_MARK} CUDA initialization failed: {:?}", err),
            }
            Ok(())
        } else {
            anyhow::bail!("{CROSS_MARK} CUDA execution provider not available")
        }
    }

    fn build_coreml(builder: &mut SessionBuilder) -> Result<()> {
        let ep = CoreMLExecutionProvider::default().with_subgraphs(false);
        if ep.is_available()? {
            match ep.register(builder) {
                Ok(_) => {}
                Err(err) => anyhow::bail!("{CROSS_MARK} CoreML initialization failed: {:?}", err),
            }
            Ok(())
        } else {
            anyhow::bail!("{CROSS_MARK} CoreML execution provider not available")
        }
    }

    fn build_cpu(builder: &mut SessionBuilder) -> Result<()> {
        let ep = CPUExecutionProvider::default();
        match ep.register(builder) {
            Ok(_) => Ok(()),
            Err(err) => anyhow::bail!("{CROSS_MARK} CPU initialization failed: {:?}", err),
        }
    }

    fn tensor_preprocess(x: &Tensor, dtype: &TensorElementType) -> Result<DynValue> {
        let x = match dtype {
            TensorElementType::Float32 => Value::from_array(x.0.clone())?.into_dyn(),
            TensorElementType::Float64 => Value::from_array(x.mapv(|x_| x_ as f64))?.into_dyn(),
            TensorElementType::Float16 => Value::from_array(x.mapv(f16::from_f32))?.into_dyn(),
            TensorElementType::Bfloat16 => Value::from_array(x.mapv(bf16::from_f32))?.into_dyn(),
            TensorElementType::Int8 => Value::from_array(x.mapv(|x_| x_ as i8))?.into_dyn(),
            TensorElementType::Int16 => Value::from_array(x.mapv(|x_| x_ as i16))?.into_dyn(),
            TensorElementType::Int32 => Value::from_array(x.mapv(|x_| x_ as i32))?.into_dyn(),
            TensorElementType::Int64 => Value::from_array(x.mapv(|x_| x_ as i64))?.into_dyn(),
            TensorElementType::Uint8 => Value::from_array(x.mapv(|x_| x_ as u8))?.into_dyn(),
            TensorElementType::Bool => Value::from_array(x.mapv(|x_| x_ != 0.))?.into_dyn(),
            _ => anyhow::bail!("Unsupported ort input type: {:?}", dtype),
        };
        Ok(x)
    }

    fn tensor_postprocess(x: &DynValue, dtype: &TensorElementType) -> Result<Array<f32, IxDyn>> {
        fn _extract_and_convert<T>(x: &DynValue, map_fn: impl Fn(T) -> f32) -> Result<Array<f32, IxDyn>>
        where
            T: Clone + 'static + ort::tensor::PrimitiveTensorElementType,
        {
            Ok(x.try_extract_array::<T>()?.view().mapv(map_fn).into_owned())
        }
        match dtype {
            TensorElementType::Float32 => _extract_and_convert::<f32>(x, |x| x),
            TensorElementType::Float16 => _extract_and_convert::<f16>(x, f16::to_f32),
            TensorElementType::Bfloat16 => _extract_and_convert::<bf16>(x, bf16::to_f32),
            TensorElementType::Float64 => _extract_and_convert::<f64>(x, |x| x as f32),
            TensorElementType::Int64 => _extract_and_convert::<i64>(x, |x| x as f32),
            TensorElementType::Int32 => _extract_and_convert::<i32>(x, |x| x as f32),
            TensorElementType::Int16 => _extract_and_convert::<i16>(x, |x| x as f32),
            TensorElementType::Int8 => _extract_and_convert::<i8>(x, |x| x as f32),
            TensorElementType::Uint8 => _extract_and_convert::<u8>(x, |x| x as f32),
            _ => anyhow::bail!("Unsupported ort output type: {:?}", dtype),
        }
    }
}

impl InferenceSession for OrtSession {
    fn graph_names(&self) -> Vec<String> {
        vec![self.graph_name.clone()]
    }

    fn input_infos(&self) -> &[TensorInfo] {
        &self.inputs
    }

    fn output_infos(&self) -> &[TensorInfo] {
        &self.outputs
    }

    fn run(&mut self, inputs: &TensorRefs<'_>, outputs: &mut TensorMuts<'_>) -> Result<()> {
        // alignment, in declared input order
        let mut xs = Vec::new();
        for (info, dtype) in self.inputs.iter().zip(self.input_dtypes.iter()) {
            let x = inputs
                .get(info.name.as_str())
                .ok_or_else(|| anyhow::anyhow!("Missing input tensor `{}`", info.name))?;
            xs.push(Into::<SessionInputValue<'_>>::into(Self::tensor_preprocess(x, dtype)?));
        }

        let ys = self.session.run(&xs[..])?;

        for (info, dtype) in self.outputs.iter().zip(self.output_dtypes.iter()) {
            if let Some(dst) = outputs.get_mut(info.name.as_str()) {
                let y = ys
                    .get(info.name.as_str())
                    .ok_or_else(|| anyhow::anyhow!("Output `{}` not found", info.name))?;
                **dst = Tensor::from(Self::tensor_postprocess(y, dtype)?);
            }
        }
        Ok(())
    }

    fn metadata(&self, key: &str) -> Option<String> {
        self.session.metadata().ok()?.custom(key).ok().flatten()
    }
}
