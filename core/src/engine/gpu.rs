//! Safe wrapper around MIGraphX programs compiled for the GPU target.
//!
//! Programs are compiled with offload copy enabled, so parameters are passed
//! as host buffers and MIGraphX moves them to and from the device around
//! each run.

use std::ffi::{c_void, CStr, CString};
use std::path::Path;
use std::ptr;

use super::ffi;
use super::program::{ModelFormat, ModelRunner, Parameter, ParameterMap, Target, TensorData};
use crate::error::{MigxError, Result};

fn check(status: ffi::Status, call: &str) -> Result<()> {
    if status == ffi::STATUS_SUCCESS {
        Ok(())
    } else {
        Err(MigxError::inference(format!(
            "{} returned status {}",
            call, status
        )))
    }
}

/// Owned MIGraphX object, destroyed on drop.
struct Handle {
    ptr: *mut c_void,
    destroy: ffi::DestroyFn,
}

impl Handle {
    fn new(ptr: *mut c_void, destroy: ffi::DestroyFn) -> Self {
        Self { ptr, destroy }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                (self.destroy)(self.ptr);
            }
        }
    }
}

/// Read the dimensions of a borrowed shape.
///
/// # Safety
///
/// `shape` must be a valid shape owned by a live MIGraphX object.
unsafe fn shape_lengths(shape: ffi::ConstShapeHandle) -> Result<Vec<usize>> {
    let mut lengths: *const usize = ptr::null();
    let mut size = 0usize;
    check(
        ffi::migraphx_shape_lengths(&mut lengths, &mut size, shape),
        "migraphx_shape_lengths",
    )?;
    if lengths.is_null() {
        return Ok(Vec::new());
    }
    Ok(std::slice::from_raw_parts(lengths, size).to_vec())
}

/// A program parsed by MIGraphX and compiled for the GPU.
pub struct GpuProgram {
    program: Handle,
    shapes: Handle,
    parameters: Vec<Parameter>,
}

// SAFETY: the program is only driven from one thread at a time; the
// handles are never shared.
unsafe impl Send for GpuProgram {}

impl GpuProgram {
    /// Parse `path` and compile it for the `gpu` target, optionally
    /// quantizing to float16 first.
    pub fn compile(path: &Path, format: ModelFormat, fp16: bool) -> Result<Self> {
        let path_cstr = CString::new(path.to_string_lossy().as_ref())
            .map_err(|_| MigxError::model_load("Invalid path encoding"))?;

        let mut raw: ffi::ProgramHandle = ptr::null_mut();
        let parsed = unsafe {
            match format {
                ModelFormat::Onnx => {
                    let mut options: ffi::OptionsHandle = ptr::null_mut();
                    check(
                        ffi::migraphx_onnx_options_create(&mut options),
                        "migraphx_onnx_options_create",
                    )?;
                    let options = Handle::new(options, ffi::migraphx_onnx_options_destroy);
                    check(
                        ffi::migraphx_parse_onnx(&mut raw, path_cstr.as_ptr(), options.ptr),
                        "migraphx_parse_onnx",
                    )
                }
                ModelFormat::TfProtobuf => {
                    let mut options: ffi::OptionsHandle = ptr::null_mut();
                    check(
                        ffi::migraphx_tf_options_create(&mut options),
                        "migraphx_tf_options_create",
                    )?;
                    let options = Handle::new(options, ffi::migraphx_tf_options_destroy);
                    check(
                        ffi::migraphx_tf_options_set_nhwc(options.ptr, true),
                        "migraphx_tf_options_set_nhwc",
                    )?;
                    check(
                        ffi::migraphx_parse_tf(&mut raw, path_cstr.as_ptr(), options.ptr),
                        "migraphx_parse_tf",
                    )
                }
            }
        };
        parsed.map_err(|e| {
            MigxError::model_load(format!("Unable to parse {}: {}", path.display(), e))
        })?;
        let program = Handle::new(raw, ffi::migraphx_program_destroy);

        if fp16 {
            unsafe {
                check(ffi::migraphx_quantize_fp16(program.ptr), "migraphx_quantize_fp16")?;
            }
            tracing::info!("Quantized {} to fp16", path.display());
        }

        let target_name = CString::new("gpu").map_err(|_| MigxError::model_load("Invalid target"))?;
        unsafe {
            let mut target: ffi::TargetHandle = ptr::null_mut();
            check(
                ffi::migraphx_target_create(&mut target, target_name.as_ptr()),
                "migraphx_target_create",
            )?;
            let target = Handle::new(target, ffi::migraphx_target_destroy);

            let mut options: ffi::OptionsHandle = ptr::null_mut();
            check(
                ffi::migraphx_compile_options_create(&mut options),
                "migraphx_compile_options_create",
            )?;
            let options = Handle::new(options, ffi::migraphx_compile_options_destroy);
            check(
                ffi::migraphx_compile_options_set_offload_copy(options.ptr, true),
                "migraphx_compile_options_set_offload_copy",
            )?;
            check(
                ffi::migraphx_program_compile(program.ptr, target.ptr, options.ptr),
                "migraphx_program_compile",
            )
            .map_err(|e| MigxError::model_load(e.to_string()))?;
        }

        let (shapes, parameters) = unsafe { Self::read_parameters(&program)? };
        tracing::info!(
            "Compiled {} for gpu ({} parameters)",
            path.display(),
            parameters.len()
        );

        Ok(Self {
            program,
            shapes,
            parameters,
        })
    }

    /// Read the parameter shape table of a compiled program.
    unsafe fn read_parameters(program: &Handle) -> Result<(Handle, Vec<Parameter>)> {
        let mut raw: ffi::ParameterShapesHandle = ptr::null_mut();
        check(
            ffi::migraphx_program_get_parameter_shapes(&mut raw, program.ptr),
            "migraphx_program_get_parameter_shapes",
        )?;
        let shapes = Handle::new(raw, ffi::migraphx_program_parameter_shapes_destroy);

        let mut count = 0usize;
        check(
            ffi::migraphx_program_parameter_shapes_size(&mut count, shapes.ptr),
            "migraphx_program_parameter_shapes_size",
        )?;
        let mut names: Vec<*const std::os::raw::c_char> = vec![ptr::null(); count];
        if count > 0 {
            check(
                ffi::migraphx_program_parameter_shapes_names(names.as_mut_ptr(), shapes.ptr),
                "migraphx_program_parameter_shapes_names",
            )?;
        }

        let mut parameters = Vec::with_capacity(count);
        for name_ptr in names {
            if name_ptr.is_null() {
                return Err(MigxError::model_load("Null parameter name"));
            }
            let name = CStr::from_ptr(name_ptr);
            let mut shape: ffi::ConstShapeHandle = ptr::null();
            check(
                ffi::migraphx_program_parameter_shapes_get(&mut shape, shapes.ptr, name.as_ptr()),
                "migraphx_program_parameter_shapes_get",
            )?;
            parameters.push(Parameter::new(
                name.to_string_lossy().into_owned(),
                shape_lengths(shape)?,
            ));
        }
        Ok((shapes, parameters))
    }

    fn shape_of(&self, name: &CStr) -> Result<ffi::ConstShapeHandle> {
        let mut shape: ffi::ConstShapeHandle = ptr::null();
        unsafe {
            check(
                ffi::migraphx_program_parameter_shapes_get(&mut shape, self.shapes.ptr, name.as_ptr()),
                "migraphx_program_parameter_shapes_get",
            )?;
        }
        Ok(shape)
    }
}

impl ModelRunner for GpuProgram {
    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn target(&self) -> Target {
        Target::Gpu
    }

    fn run(&self, params: &ParameterMap) -> Result<TensorData> {
        let mut raw: ffi::ParametersHandle = ptr::null_mut();
        unsafe {
            check(
                ffi::migraphx_program_parameters_create(&mut raw),
                "migraphx_program_parameters_create",
            )?;
        }
        let pmap = Handle::new(raw, ffi::migraphx_program_parameters_destroy);

        // Buffers and arguments must outlive the run call.
        let mut buffers = Vec::with_capacity(self.parameters.len());
        let mut arguments = Vec::with_capacity(self.parameters.len());
        for param in &self.parameters {
            let value = params
                .get(&param.name)
                .ok_or_else(|| MigxError::inference(format!("Missing parameter: {}", param.name)))?;
            if value.shape() != param.shape.as_slice() {
                return Err(MigxError::tensor(format!(
                    "Parameter {} expects {:?}, got {:?}",
                    param.name,
                    param.shape,
                    value.shape()
                )));
            }
            let name = CString::new(param.name.as_str())
                .map_err(|_| MigxError::inference("Invalid parameter name"))?;
            let shape = self.shape_of(&name)?;
            let buffer = value.as_standard_layout();

            let mut argument: ffi::ArgumentHandle = ptr::null_mut();
            unsafe {
                check(
                    ffi::migraphx_argument_create(
                        &mut argument,
                        shape,
                        buffer.as_ptr() as *mut c_void,
                    ),
                    "migraphx_argument_create",
                )?;
            }
            let argument = Handle::new(argument, ffi::migraphx_argument_destroy);
            unsafe {
                check(
                    ffi::migraphx_program_parameters_add(pmap.ptr, name.as_ptr(), argument.ptr),
                    "migraphx_program_parameters_add",
                )?;
            }
            buffers.push(buffer);
            arguments.push(argument);
        }

        let mut outputs: ffi::ArgumentsHandle = ptr::null_mut();
        unsafe {
            check(
                ffi::migraphx_program_run(&mut outputs, self.program.ptr, pmap.ptr),
                "migraphx_program_run",
            )?;
        }
        let outputs = Handle::new(outputs, ffi::migraphx_arguments_destroy);

        unsafe {
            let mut count = 0usize;
            check(
                ffi::migraphx_arguments_size(&mut count, outputs.ptr),
                "migraphx_arguments_size",
            )?;
            if count == 0 {
                return Err(MigxError::inference("Model produced no outputs"));
            }
            let mut first: ffi::ConstArgumentHandle = ptr::null();
            check(
                ffi::migraphx_arguments_get(&mut first, outputs.ptr, 0),
                "migraphx_arguments_get",
            )?;

            let mut shape: ffi::ConstShapeHandle = ptr::null();
            check(
                ffi::migraphx_argument_shape(&mut shape, first),
                "migraphx_argument_shape",
            )?;
            let lengths = shape_lengths(shape)?;
            let numel: usize = lengths.iter().product();

            let mut bytes = 0usize;
            check(ffi::migraphx_shape_bytes(&mut bytes, shape), "migraphx_shape_bytes")?;
            if bytes != numel * std::mem::size_of::<f32>() {
                return Err(MigxError::tensor(format!(
                    "Expected an f32 output of {} elements, got {} bytes",
                    numel, bytes
                )));
            }

            let mut data: *mut std::os::raw::c_char = ptr::null_mut();
            check(
                ffi::migraphx_argument_buffer(&mut data, first),
                "migraphx_argument_buffer",
            )?;
            if data.is_null() {
                return Err(MigxError::tensor("Null output buffer"));
            }
            let values = std::slice::from_raw_parts(data as *const f32, numel).to_vec();
            TensorData::from_shape_vec(&lengths, values)
        }
    }
}
