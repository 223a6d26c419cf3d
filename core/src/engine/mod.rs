//! Model compilation and inference backends.
//!
//! Every backend is reached through the [`ModelRunner`] trait. The CPU
//! target uses tract; the GPU target binds the MIGraphX C API and is only
//! built with the `migraphx` feature. [`Session`] covers the named
//! feed/fetch style of running a frozen TensorFlow graph.

#[cfg(feature = "migraphx")]
mod ffi;
#[cfg(feature = "migraphx")]
mod gpu;
mod plan;
mod program;
mod session;

#[cfg(feature = "migraphx")]
pub use gpu::GpuProgram;
pub use plan::CompiledGraph;
pub use program::{
    compile, CompileOptions, ModelFormat, ModelRunner, Parameter, ParameterMap, Target,
    TensorData,
};
pub use session::{graph_node_name, Session};
