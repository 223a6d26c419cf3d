//! migx-rs: benchmark and ImageNet validation runners for compiled
//! image-classification models.
//!
//! Models are compiled for an execution target through [`engine::compile`]
//! and driven through the [`engine::ModelRunner`] trait. Two binaries sit on
//! top of the library:
//!
//! - `migx-bench` times repeated inference of a single image, either through a
//!   compiled graph or a TensorFlow feed/fetch session.
//! - `migx-imagenet` walks a validation manifest and reports the top-5 rank of
//!   each ground-truth label, followed by overall accuracy.
//!
//! # Features
//!
//! - **migraphx**: Link the MIGraphX C API and enable the GPU target
//!   (requires ROCm with MIGraphX installed)
//!
//! # Example
//!
//! ```ignore
//! use migx_rs::engine::{compile, CompileOptions, ParameterMap, Target};
//! use migx_rs::preprocess::Pipeline;
//!
//! let options = CompileOptions { target: Target::Cpu, ..Default::default() };
//! let model = compile("resnet50.onnx", &options)?;
//! let param = model.parameter("0").unwrap();
//! let pipeline = Pipeline::for_shape(&param.shape)?;
//!
//! let mut params = ParameterMap::allocate(model.parameters());
//! params.set("0", pipeline.load("cat.jpg")?)?;
//! let scores = model.run(&params)?.first_row();
//! ```
//!
//! # Building
//!
//! ```bash
//! # CPU target only
//! cargo build --release
//!
//! # With the MIGraphX GPU target
//! MIGRAPHX_PATH=/opt/rocm cargo build --release --features migraphx
//! ```

pub mod bench;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod labels;
pub mod manifest;
pub mod preprocess;
pub mod rank;
pub mod validate;

// Re-export commonly used types
pub use engine::{compile, CompileOptions, ModelRunner, ParameterMap, Target, TensorData};
pub use error::{MigxError, Result};
