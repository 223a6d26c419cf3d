//! FFI declarations for the MIGraphX C API.
//!
//! This module contains the raw FFI bindings. Use the safe wrapper in the
//! `gpu` module instead of calling these directly.

use std::ffi::c_void;
use std::os::raw::{c_char, c_int};

/// `migraphx_status`; zero is success.
pub type Status = c_int;

pub const STATUS_SUCCESS: Status = 0;

/// Opaque handle to a parsed or compiled program.
pub type ProgramHandle = *mut c_void;

/// Opaque handle to a compilation target.
pub type TargetHandle = *mut c_void;

/// Opaque handle to parser and compiler options.
pub type OptionsHandle = *mut c_void;

/// Opaque handle to the program's parameter shape table.
pub type ParameterShapesHandle = *mut c_void;

/// Opaque handle to a parameter map passed to `migraphx_program_run`.
pub type ParametersHandle = *mut c_void;

/// Borrowed shape owned by another object.
pub type ConstShapeHandle = *const c_void;

/// Opaque handle to an argument (shape + buffer).
pub type ArgumentHandle = *mut c_void;

/// Borrowed argument owned by an arguments list.
pub type ConstArgumentHandle = *const c_void;

/// Opaque handle to a list of result arguments.
pub type ArgumentsHandle = *mut c_void;

/// Destructor shared by every owned handle type.
pub type DestroyFn = unsafe extern "C" fn(*mut c_void) -> Status;

extern "C" {
    // Parsing
    pub fn migraphx_onnx_options_create(out: *mut OptionsHandle) -> Status;
    pub fn migraphx_onnx_options_destroy(options: *mut c_void) -> Status;
    pub fn migraphx_parse_onnx(
        out: *mut ProgramHandle,
        name: *const c_char,
        options: OptionsHandle,
    ) -> Status;
    pub fn migraphx_tf_options_create(out: *mut OptionsHandle) -> Status;
    pub fn migraphx_tf_options_destroy(options: *mut c_void) -> Status;
    pub fn migraphx_tf_options_set_nhwc(options: OptionsHandle, is_nhwc: bool) -> Status;
    pub fn migraphx_parse_tf(
        out: *mut ProgramHandle,
        name: *const c_char,
        options: OptionsHandle,
    ) -> Status;
    pub fn migraphx_program_destroy(program: *mut c_void) -> Status;

    // Quantization
    pub fn migraphx_quantize_fp16(program: ProgramHandle) -> Status;

    // Compilation
    pub fn migraphx_target_create(out: *mut TargetHandle, name: *const c_char) -> Status;
    pub fn migraphx_target_destroy(target: *mut c_void) -> Status;
    pub fn migraphx_compile_options_create(out: *mut OptionsHandle) -> Status;
    pub fn migraphx_compile_options_destroy(options: *mut c_void) -> Status;
    pub fn migraphx_compile_options_set_offload_copy(options: OptionsHandle, value: bool)
        -> Status;
    pub fn migraphx_program_compile(
        program: ProgramHandle,
        target: TargetHandle,
        options: OptionsHandle,
    ) -> Status;

    // Parameter shapes
    pub fn migraphx_program_get_parameter_shapes(
        out: *mut ParameterShapesHandle,
        program: ProgramHandle,
    ) -> Status;
    pub fn migraphx_program_parameter_shapes_destroy(shapes: *mut c_void) -> Status;
    pub fn migraphx_program_parameter_shapes_size(
        out: *mut usize,
        shapes: ParameterShapesHandle,
    ) -> Status;
    pub fn migraphx_program_parameter_shapes_names(
        out: *mut *const c_char,
        shapes: ParameterShapesHandle,
    ) -> Status;
    pub fn migraphx_program_parameter_shapes_get(
        out: *mut ConstShapeHandle,
        shapes: ParameterShapesHandle,
        name: *const c_char,
    ) -> Status;
    pub fn migraphx_shape_lengths(
        out: *mut *const usize,
        out_size: *mut usize,
        shape: ConstShapeHandle,
    ) -> Status;
    pub fn migraphx_shape_bytes(out: *mut usize, shape: ConstShapeHandle) -> Status;

    // Arguments and execution
    pub fn migraphx_argument_create(
        out: *mut ArgumentHandle,
        shape: ConstShapeHandle,
        buffer: *mut c_void,
    ) -> Status;
    pub fn migraphx_argument_destroy(argument: *mut c_void) -> Status;
    pub fn migraphx_argument_shape(
        out: *mut ConstShapeHandle,
        argument: ConstArgumentHandle,
    ) -> Status;
    pub fn migraphx_argument_buffer(out: *mut *mut c_char, argument: ConstArgumentHandle)
        -> Status;
    pub fn migraphx_program_parameters_create(out: *mut ParametersHandle) -> Status;
    pub fn migraphx_program_parameters_destroy(params: *mut c_void) -> Status;
    pub fn migraphx_program_parameters_add(
        params: ParametersHandle,
        name: *const c_char,
        argument: ArgumentHandle,
    ) -> Status;
    pub fn migraphx_program_run(
        out: *mut ArgumentsHandle,
        program: ProgramHandle,
        params: ParametersHandle,
    ) -> Status;
    pub fn migraphx_arguments_destroy(arguments: *mut c_void) -> Status;
    pub fn migraphx_arguments_size(out: *mut usize, arguments: ArgumentsHandle) -> Status;
    pub fn migraphx_arguments_get(
        out: *mut ConstArgumentHandle,
        arguments: ArgumentsHandle,
        index: usize,
    ) -> Status;
}
