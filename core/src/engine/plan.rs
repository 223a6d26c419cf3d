//! CPU compiled graphs backed by tract.

use ndarray::ArrayD;
use std::path::Path;
use tract_onnx::prelude::*;

use super::program::{ModelFormat, ModelRunner, Parameter, ParameterMap, Target, TensorData};
use crate::error::{MigxError, Result};

pub(crate) type Plan = TypedRunnableModel<TypedModel>;

/// Parse an ONNX or TensorFlow model into a tract inference graph.
pub(crate) fn parse_model(path: &Path, format: ModelFormat) -> Result<InferenceModel> {
    let parsed = match format {
        ModelFormat::Onnx => tract_onnx::onnx().model_for_path(path),
        ModelFormat::TfProtobuf => tract_tensorflow::tensorflow().model_for_path(path),
    };
    parsed.map_err(|e| {
        MigxError::model_load(format!("Failed to parse {}: {:#}", path.display(), e))
    })
}

/// Pin input `index` to a concrete f32 shape.
pub(crate) fn pin_input(model: InferenceModel, index: usize, shape: &[usize]) -> Result<InferenceModel> {
    model
        .with_input_fact(index, InferenceFact::dt_shape(f32::datum_type(), shape.to_vec()))
        .map_err(|e| MigxError::model_load(format!("Invalid input shape {:?}: {:#}", shape, e)))
}

/// Optimize an inference graph for the host.
pub(crate) fn optimize(model: InferenceModel) -> Result<TypedModel> {
    model
        .into_optimized()
        .map_err(|e| MigxError::model_load(format!("Optimization failed: {:#}", e)))
}

/// Turn an optimized graph into a runnable plan.
pub(crate) fn into_plan(model: TypedModel) -> Result<Plan> {
    model
        .into_runnable()
        .map_err(|e| MigxError::model_load(format!("Planning failed: {:#}", e)))
}

/// Copy an ndarray buffer into a tract value.
pub(crate) fn to_tvalue(array: &ArrayD<f32>) -> Result<TValue> {
    let contiguous = array.as_standard_layout();
    let values = contiguous
        .as_slice()
        .ok_or_else(|| MigxError::tensor("Input is not contiguous"))?;
    let tensor = Tensor::from_shape(array.shape(), values)
        .map_err(|e| MigxError::tensor(format!("{:#}", e)))?;
    Ok(tensor.into())
}

/// Copy the first tract output into [`TensorData`], casting to f32.
pub(crate) fn first_output(outputs: &TVec<TValue>) -> Result<TensorData> {
    let first = outputs
        .first()
        .ok_or_else(|| MigxError::inference("Model produced no outputs"))?;
    let cast = first
        .cast_to::<f32>()
        .map_err(|e| MigxError::tensor(format!("{:#}", e)))?;
    let values = cast
        .as_slice::<f32>()
        .map_err(|e| MigxError::tensor(format!("{:#}", e)))?
        .to_vec();
    TensorData::from_shape_vec(cast.shape(), values)
}

/// Drop declared output facts so they are re-derived from pinned inputs.
///
/// Exported graphs often declare outputs as `[N, classes]`, which would not
/// unify with a concrete batch.
fn release_outputs(mut model: InferenceModel) -> Result<InferenceModel> {
    for index in 0..model.outputs.len() {
        model = model
            .with_output_fact(index, InferenceFact::default())
            .map_err(|e| MigxError::model_load(format!("{:#}", e)))?;
    }
    Ok(model)
}

/// Concrete shapes for the model inputs, with symbolic or unknown
/// dimensions set to 1. `None` for inputs that are already concrete.
fn default_input_shapes(model: &InferenceModel) -> Result<Vec<Option<Vec<usize>>>> {
    let typed = model
        .clone()
        .into_typed()
        .map_err(|e| MigxError::model_load(format!("Analysis failed: {:#}", e)))?;
    let outlets = typed
        .input_outlets()
        .map_err(|e| MigxError::model_load(format!("{:#}", e)))?;
    outlets
        .iter()
        .map(|outlet| {
            let fact = typed
                .outlet_fact(*outlet)
                .map_err(|e| MigxError::model_load(format!("{:#}", e)))?;
            if fact.shape.as_concrete().is_some() {
                return Ok(None);
            }
            let shape = fact
                .shape
                .iter()
                .map(|d| d.to_i64().ok().and_then(|v| usize::try_from(v).ok()).unwrap_or(1))
                .collect();
            Ok(Some(shape))
        })
        .collect()
}

/// A model optimized and planned for host execution.
pub struct CompiledGraph {
    plan: Plan,
    parameters: Vec<Parameter>,
}

impl CompiledGraph {
    /// Load and compile a model.
    ///
    /// `input_shape` pins the first input before optimization. Without it,
    /// symbolic input dimensions such as a batch `N` default to 1.
    pub fn load(path: &Path, format: ModelFormat, input_shape: Option<&[usize]>) -> Result<Self> {
        let mut model = parse_model(path, format)?;
        let pins: Vec<(usize, Vec<usize>)> = match input_shape {
            Some(shape) => vec![(0, shape.to_vec())],
            None => default_input_shapes(&model)?
                .into_iter()
                .enumerate()
                .filter_map(|(index, shape)| shape.map(|s| (index, s)))
                .collect(),
        };
        if !pins.is_empty() {
            model = release_outputs(model)?;
        }
        for (index, shape) in &pins {
            tracing::debug!("Pinning input {} to {:?}", index, shape);
            model = pin_input(model, *index, shape)?;
        }
        let typed = optimize(model)?;

        let outlets = typed
            .input_outlets()
            .map_err(|e| MigxError::model_load(format!("{:#}", e)))?;
        let mut parameters = Vec::with_capacity(outlets.len());
        for outlet in outlets {
            let name = typed.node(outlet.node).name.clone();
            let fact = typed
                .outlet_fact(*outlet)
                .map_err(|e| MigxError::model_load(format!("{:#}", e)))?;
            let shape = fact.shape.as_concrete().ok_or_else(|| {
                MigxError::model_load(format!("Input {} has a symbolic shape {:?}", name, fact.shape))
            })?;
            parameters.push(Parameter::new(name, shape.to_vec()));
        }
        tracing::info!("Compiled {} for cpu ({} inputs)", path.display(), parameters.len());

        let plan = into_plan(typed)?;
        Ok(Self { plan, parameters })
    }
}

impl ModelRunner for CompiledGraph {
    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn target(&self) -> Target {
        Target::Cpu
    }

    fn run(&self, params: &ParameterMap) -> Result<TensorData> {
        let inputs = self
            .parameters
            .iter()
            .map(|p| {
                let value = params
                    .get(&p.name)
                    .ok_or_else(|| MigxError::inference(format!("Missing parameter: {}", p.name)))?;
                to_tvalue(value)
            })
            .collect::<Result<TVec<TValue>>>()?;

        let outputs = self
            .plan
            .run(inputs)
            .map_err(|e| MigxError::inference(format!("{:#}", e)))?;
        first_output(&outputs)
    }
}
