//! Backend-neutral model types.
//!
//! A compiled model declares named parameters with fixed shapes. Callers
//! allocate a [`ParameterMap`] from those declarations once, overwrite the
//! input slot for every image, and hand the map to [`ModelRunner::run`].

use ndarray::{ArrayD, Axis, IxDyn};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::plan::CompiledGraph;
use crate::error::{MigxError, Result};

/// Execution target a model is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Host execution through the tract optimizer.
    Cpu,
    /// AMD GPU execution through MIGraphX.
    Gpu,
}

impl Target {
    /// Whether this build can compile for the target.
    pub fn is_available(&self) -> bool {
        match self {
            Self::Cpu => true,
            Self::Gpu => cfg!(feature = "migraphx"),
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        if cfg!(feature = "migraphx") {
            Self::Gpu
        } else {
            Self::Cpu
        }
    }
}

impl FromStr for Target {
    type Err = MigxError;

    /// Parse a target string like "cpu" or "gpu".
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "gpu" | "hip" | "rocm" => Ok(Self::Gpu),
            other => Err(MigxError::config(format!("Invalid target: {}", other))),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Gpu => write!(f, "gpu"),
        }
    }
}

/// Serialized model format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// ONNX protobuf.
    Onnx,
    /// Frozen TensorFlow `GraphDef`.
    TfProtobuf,
}

impl ModelFormat {
    /// Guess the format from the file extension: `.onnx` is ONNX, anything
    /// else is treated as a TensorFlow graph.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("onnx") => Self::Onnx,
            _ => Self::TfProtobuf,
        }
    }
}

/// A named input declared by a compiled model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub shape: Vec<usize>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    /// Number of elements in a buffer of this shape.
    pub fn elements(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Tensor data extracted from inference results.
#[derive(Debug, Clone)]
pub struct TensorData {
    /// The tensor data as a dynamic-dimensional array.
    pub data: ArrayD<f32>,
}

impl TensorData {
    /// Build from a shape and row-major values.
    pub fn from_shape_vec(shape: &[usize], values: Vec<f32>) -> Result<Self> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|e| MigxError::tensor(format!("Array shape error: {}", e)))?;
        Ok(Self { data })
    }

    /// Get the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Get the total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the tensor is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Scores of the first batch entry, flattened.
    ///
    /// A rank-0 or rank-1 tensor is returned as is.
    pub fn first_row(&self) -> Vec<f32> {
        if self.data.ndim() >= 2 && self.data.len_of(Axis(0)) > 0 {
            self.data.index_axis(Axis(0), 0).iter().copied().collect()
        } else {
            self.data.iter().copied().collect()
        }
    }
}

/// Host-side buffers for every declared model parameter.
#[derive(Debug, Clone, Default)]
pub struct ParameterMap {
    slots: BTreeMap<String, ArrayD<f32>>,
}

impl ParameterMap {
    /// Allocate a zeroed buffer for each parameter.
    pub fn allocate(parameters: &[Parameter]) -> Self {
        let slots = parameters
            .iter()
            .map(|p| (p.name.clone(), ArrayD::zeros(IxDyn(&p.shape))))
            .collect();
        Self { slots }
    }

    /// Replace the buffer of an existing slot.
    ///
    /// The new value must have exactly the declared shape.
    pub fn set(&mut self, name: &str, value: ArrayD<f32>) -> Result<()> {
        let slot = self
            .slots
            .get_mut(name)
            .ok_or_else(|| MigxError::tensor(format!("Unknown parameter: {}", name)))?;
        if slot.shape() != value.shape() {
            return Err(MigxError::tensor(format!(
                "Shape mismatch for parameter {}: expected {:?}, got {:?}",
                name,
                slot.shape(),
                value.shape()
            )));
        }
        *slot = value;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.slots.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Trait for compiled models that can run inference.
///
/// Implemented by the CPU graph ([`CompiledGraph`]) and, with the
/// `migraphx` feature, the GPU program.
pub trait ModelRunner: Send {
    /// Parameters declared by the model, in input order.
    fn parameters(&self) -> &[Parameter];

    /// Target the model was compiled for.
    fn target(&self) -> Target;

    /// Run the model and return its first output.
    fn run(&self, params: &ParameterMap) -> Result<TensorData>;

    /// Look up a declared parameter by name.
    fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters().iter().find(|p| p.name == name)
    }
}

/// Options for [`compile`].
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Model format. Guessed from the file extension when unset.
    pub format: Option<ModelFormat>,
    /// Execution target.
    pub target: Target,
    /// Shape to pin the first input to before optimization (CPU only).
    pub input_shape: Option<Vec<usize>>,
    /// Quantize the program to float16 before compiling (GPU only).
    pub fp16: bool,
}

/// Parse a serialized model and compile it for the requested target.
pub fn compile(path: impl AsRef<Path>, options: &CompileOptions) -> Result<Box<dyn ModelRunner>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MigxError::FileNotFound(path.to_path_buf()));
    }
    let format = options.format.unwrap_or_else(|| ModelFormat::from_path(path));
    tracing::debug!(?format, target = %options.target, "compiling {}", path.display());

    match options.target {
        Target::Cpu if options.fp16 => Err(MigxError::config(
            "fp16 quantization is only available on the gpu target",
        )),
        Target::Cpu => Ok(Box::new(CompiledGraph::load(
            path,
            format,
            options.input_shape.as_deref(),
        )?)),
        #[cfg(feature = "migraphx")]
        Target::Gpu => Ok(Box::new(super::gpu::GpuProgram::compile(
            path,
            format,
            options.fp16,
        )?)),
        #[cfg(not(feature = "migraphx"))]
        Target::Gpu => Err(MigxError::config(
            "gpu target requires building with `--features migraphx`",
        )),
    }
}
