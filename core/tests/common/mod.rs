//! Shared fixtures for integration tests.

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use migx_rs::engine::{ModelRunner, Parameter, ParameterMap, Target, TensorData};
use migx_rs::Result;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Model stand-in that returns fixed scores and counts its runs.
pub struct StubRunner {
    parameters: Vec<Parameter>,
    scores: Vec<f32>,
    calls: Arc<AtomicUsize>,
}

impl StubRunner {
    pub fn new(input: &str, shape: Vec<usize>, scores: Vec<f32>) -> Self {
        Self {
            parameters: vec![Parameter::new(input, shape)],
            scores,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle to the run counter, usable after the runner is boxed.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl ModelRunner for StubRunner {
    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn target(&self) -> Target {
        Target::Cpu
    }

    fn run(&self, params: &ParameterMap) -> Result<TensorData> {
        for p in &self.parameters {
            let buffer = params.get(&p.name).expect("parameter slot allocated");
            assert_eq!(buffer.shape(), p.shape.as_slice());
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        TensorData::from_shape_vec(&[1, self.scores.len()], self.scores.clone())
    }
}

/// 1000 class scores where `order[i]` holds the i-th highest value.
pub fn scores_with_top(order: &[usize]) -> Vec<f32> {
    let mut scores: Vec<f32> = (0..1000).map(|i| i as f32 * 1e-4).collect();
    for (place, &class) in order.iter().enumerate() {
        scores[class] = 10.0 - place as f32;
    }
    scores
}

/// Write a solid-color image; the format follows the file extension.
pub fn write_image(path: &Path, width: u32, height: u32, color: [u8; 3]) {
    RgbImage::from_pixel(width, height, Rgb(color))
        .save(path)
        .expect("write test image");
}
