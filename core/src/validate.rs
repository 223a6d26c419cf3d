//! ImageNet validation sweep.
//!
//! Records are processed strictly in manifest order. A failure while loading,
//! preprocessing, running or ranking one image is reported as a `fail` line
//! for that record only; manifest and output errors abort the sweep.

use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::engine::{ModelRunner, ParameterMap};
use crate::error::{MigxError, Result};
use crate::labels::LabelTable;
use crate::manifest::ValRecord;
use crate::preprocess::Pipeline;
use crate::rank::{argmax, rank_label, TopFive};

/// Accuracy counters accumulated over a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub count: usize,
    pub top1: usize,
    pub top5: usize,
    pub failed: usize,
}

impl SweepSummary {
    fn ratio(hits: usize, count: usize) -> f64 {
        if count == 0 {
            0.0
        } else {
            hits as f64 / count as f64
        }
    }

    pub fn top1_ratio(&self) -> f64 {
        Self::ratio(self.top1, self.count)
    }

    pub fn top5_ratio(&self) -> f64 {
        Self::ratio(self.top5, self.count)
    }

    /// Print the closing accuracy line.
    pub fn write_overall<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(
            out,
            "Overall - top1: {} top5: {}",
            self.top1_ratio(),
            self.top5_ratio()
        )
    }
}

/// Result of evaluating one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub top: TopFive,
    /// Arg-max over the whole output.
    pub predicted: usize,
}

/// A validation sweep bound to one compiled model.
pub struct Sweep<'a> {
    runner: &'a dyn ModelRunner,
    params: ParameterMap,
    input: String,
    pipeline: Pipeline,
    image_dir: PathBuf,
    progress_every: usize,
}

impl<'a> Sweep<'a> {
    /// Allocate parameters and select the pipeline from the input shape.
    ///
    /// Fails with [`MigxError::UnsupportedShape`] when the input is neither
    /// 1x3x224x224 nor 1x3x299x299.
    pub fn new(
        runner: &'a dyn ModelRunner,
        input: &str,
        image_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        let param = runner.parameter(input).ok_or_else(|| {
            let candidates: Vec<&str> = runner.parameters().iter().map(|p| p.name.as_str()).collect();
            MigxError::config(format!(
                "Input parameter {:?} not found; candidates: {}",
                input,
                candidates.join(", ")
            ))
        })?;
        let pipeline = Pipeline::for_shape(&param.shape)?;
        info!("Input {} {:?}: using {}", input, param.shape, pipeline);

        Ok(Self {
            runner,
            params: ParameterMap::allocate(runner.parameters()),
            input: input.to_string(),
            pipeline,
            image_dir: image_dir.as_ref().to_path_buf(),
            progress_every: 1000,
        })
    }

    /// Log progress every `n` records.
    pub fn with_progress_every(mut self, n: usize) -> Self {
        self.progress_every = n.max(1);
        self
    }

    pub fn pipeline(&self) -> Pipeline {
        self.pipeline
    }

    /// Load, preprocess, run and rank one record.
    pub fn evaluate(&mut self, record: &ValRecord) -> Result<Evaluation> {
        let tensor = self.pipeline.load(self.image_dir.join(&record.filename))?;
        self.params.set(&self.input, tensor)?;
        let output = self.runner.run(&self.params)?;
        let scores = output.first_row();
        let top = rank_label(&scores, record.label)?;
        let predicted = argmax(&scores).ok_or_else(|| MigxError::tensor("Empty model output"))?;
        Ok(Evaluation { top, predicted })
    }

    /// Evaluate every record, writing the per-image report to `out`.
    pub fn run<I, W>(
        &mut self,
        records: I,
        labels: &LabelTable,
        out: &mut W,
    ) -> Result<SweepSummary>
    where
        I: IntoIterator<Item = Result<ValRecord>>,
        W: Write,
    {
        let mut summary = SweepSummary::default();
        for record in records {
            let record = record?;
            summary.count += 1;

            match self.evaluate(&record) {
                Ok(eval) => {
                    let c = eval.top.classes;
                    writeln!(
                        out,
                        "{} {} {} {} {} {} {} {}",
                        record.filename, eval.top.rank, record.label, c[0], c[1], c[2], c[3], c[4]
                    )?;
                    writeln!(
                        out,
                        "#actual   {} {}",
                        eval.predicted,
                        labels.name_or_unknown(eval.predicted)
                    )?;
                    if eval.top.rank.is_top1() {
                        summary.top1 += 1;
                    }
                    if eval.top.rank.is_top5() {
                        summary.top5 += 1;
                    }
                }
                Err(e) => {
                    warn!("{}: {}", record.filename, e);
                    writeln!(out, "{} fail {}", record.filename, record.label)?;
                    summary.failed += 1;
                }
            }
            writeln!(
                out,
                "#expected {} {}",
                record.label,
                labels.name_or_unknown(record.label)
            )?;

            if summary.count % self.progress_every == 0 {
                info!(
                    "{} top1: {} top5: {}",
                    summary.count, summary.top1, summary.top5
                );
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_ratios() {
        let summary = SweepSummary {
            count: 4,
            top1: 1,
            top5: 3,
            failed: 1,
        };
        assert_eq!(summary.top1_ratio(), 0.25);
        assert_eq!(summary.top5_ratio(), 0.75);

        let mut out = Vec::new();
        summary.write_overall(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Overall - top1: 0.25 top5: 0.75\n"
        );
    }

    #[test]
    fn test_empty_summary() {
        let summary = SweepSummary::default();
        assert_eq!(summary.top1_ratio(), 0.0);
        let mut out = Vec::new();
        summary.write_overall(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Overall - top1: 0 top5: 0\n");
    }
}
