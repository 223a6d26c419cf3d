//! Latency benchmark: a warm-up pass followed by an equally long timed pass.

use clap::ValueEnum;
use ndarray::ArrayD;
use std::fmt;
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::engine::{ModelRunner, ParameterMap, Session, TensorData};
use crate::error::{MigxError, Result};
use crate::preprocess::Layout;
use crate::rank::argmax;

/// Backend family selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Framework {
    /// Compiled graph bound to an execution target.
    Migraphx,
    /// Frozen graph evaluated through a feed/fetch session.
    Tensorflow,
}

impl Framework {
    /// Report header line.
    pub fn header(&self) -> &'static str {
        match self {
            Self::Migraphx => "MIGraphX: ",
            Self::Tensorflow => "Tensorflow: ",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Migraphx => write!(f, "migraphx"),
            Self::Tensorflow => write!(f, "tensorflow"),
        }
    }
}

/// Something that turns one image batch into class scores.
pub trait Backend {
    fn framework(&self) -> Framework;

    /// Layout the backend wants its input in.
    fn layout(&self) -> Layout;

    fn infer(&mut self, image: &ArrayD<f32>) -> Result<TensorData>;
}

/// Compiled graph with a parameter map reused across iterations.
pub struct GraphBackend {
    runner: Box<dyn ModelRunner>,
    params: ParameterMap,
    input: String,
    layout: Layout,
}

impl GraphBackend {
    /// Allocate the parameter map and locate the input slot.
    pub fn new(runner: Box<dyn ModelRunner>, input: &str) -> Result<Self> {
        let param = runner.parameter(input).ok_or_else(|| {
            let candidates: Vec<&str> = runner.parameters().iter().map(|p| p.name.as_str()).collect();
            MigxError::config(format!(
                "Input parameter {:?} not found; candidates: {}",
                input,
                candidates.join(", ")
            ))
        })?;
        let layout = Layout::from_shape(&param.shape).unwrap_or(Layout::Nchw);
        debug!("Input {} {:?} ({:?})", input, param.shape, layout);
        let params = ParameterMap::allocate(runner.parameters());
        Ok(Self {
            runner,
            params,
            input: input.to_string(),
            layout,
        })
    }
}

impl Backend for GraphBackend {
    fn framework(&self) -> Framework {
        Framework::Migraphx
    }

    fn layout(&self) -> Layout {
        self.layout
    }

    fn infer(&mut self, image: &ArrayD<f32>) -> Result<TensorData> {
        self.params.set(&self.input, image.clone())?;
        self.runner.run(&self.params)
    }
}

/// TensorFlow session fed with the bench image.
pub struct SessionBackend {
    session: Session,
}

impl SessionBackend {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

impl Backend for SessionBackend {
    fn framework(&self) -> Framework {
        Framework::Tensorflow
    }

    fn layout(&self) -> Layout {
        Layout::Nhwc
    }

    fn infer(&mut self, image: &ArrayD<f32>) -> Result<TensorData> {
        self.session.run(image)
    }
}

/// Outcome of one benchmark.
#[derive(Debug, Clone)]
pub struct BenchReport {
    pub framework: Framework,
    /// Arg-max of the first row of the final output.
    pub index: usize,
    /// Wall-clock time of the timed pass.
    pub elapsed: Duration,
    pub repeat: usize,
}

impl BenchReport {
    pub fn images_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.repeat as f64 / secs
        } else {
            f64::INFINITY
        }
    }

    pub fn mean_latency_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0 / self.repeat as f64
    }

    /// Print the three report lines.
    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "{}", self.framework.header())?;
        writeln!(out, "IDX  =  {}", self.index)?;
        writeln!(out, "Time =  {:8.3}", self.elapsed.as_secs_f64())
    }
}

/// Run `repeat` warm-up inferences, then time `repeat` more.
pub fn run_bench<B: Backend + ?Sized>(
    backend: &mut B,
    image: &ArrayD<f32>,
    repeat: usize,
) -> Result<BenchReport> {
    if repeat == 0 {
        return Err(MigxError::config("repeat must be at least 1"));
    }

    info!("Warm-up: {} iterations", repeat);
    for _ in 0..repeat {
        backend.infer(image)?;
    }

    info!("Timing: {} iterations", repeat);
    let mut last = None;
    let start = Instant::now();
    for _ in 0..repeat {
        last = Some(backend.infer(image)?);
    }
    let elapsed = start.elapsed();

    let output = last.ok_or_else(|| MigxError::inference("No inference output"))?;
    let index = argmax(&output.first_row())
        .ok_or_else(|| MigxError::tensor("Empty model output"))?;

    let report = BenchReport {
        framework: backend.framework(),
        index,
        elapsed,
        repeat,
    };
    info!(
        "{:.1} images/sec, {:.3} ms mean latency",
        report.images_per_sec(),
        report.mean_latency_ms()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_format() {
        let report = BenchReport {
            framework: Framework::Migraphx,
            index: 283,
            elapsed: Duration::from_millis(1234),
            repeat: 1000,
        };
        let mut out = Vec::new();
        report.write_to(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "MIGraphX: \nIDX  =  283\nTime =     1.234\n"
        );
        assert!((report.images_per_sec() - 1000.0 / 1.234).abs() < 1e-6);
    }

    #[test]
    fn test_framework_names() {
        assert_eq!(Framework::Tensorflow.header(), "Tensorflow: ");
        assert_eq!(Framework::Migraphx.to_string(), "migraphx");
    }
}
