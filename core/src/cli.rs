//! Command-line interfaces for the bench and validation runners.

use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::bench::Framework;
use crate::config::Config;
use crate::engine::Target;
use crate::error::{MigxError, Result};

/// Benchmark inference latency of an image-classification model.
#[derive(Parser, Debug)]
#[command(name = "migx-bench")]
#[command(author, version, about, long_about = None)]
pub struct BenchCli {
    /// Backend used to run the model.
    #[arg(long, value_enum, default_value_t = Framework::Migraphx)]
    pub framework: Framework,

    /// Serialized model (ONNX or frozen TensorFlow graph).
    #[arg(long = "save_file")]
    pub save_file: PathBuf,

    /// Image to classify.
    #[arg(long = "image_file")]
    pub image_file: PathBuf,

    /// Side length the image is resized to.
    #[arg(long = "resize_val", default_value_t = 224)]
    pub resize_val: u32,

    /// Iterations in both the warm-up and the timed pass.
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub repeat: u64,

    /// Execution target for the migraphx framework (gpu, cpu).
    #[arg(long)]
    pub target: Option<String>,

    /// Name of the model's input parameter.
    #[arg(long)]
    pub argname: Option<String>,

    /// Quantize the compiled program to float16 (gpu target only).
    #[arg(long)]
    pub fp16: bool,

    /// Path to optional YAML config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl BenchCli {
    /// Parse command line arguments, exiting on flags the framework ignores.
    pub fn parse_args() -> Self {
        let cli = Self::parse();
        if let Err(e) = cli.check() {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
        cli
    }

    /// Reject compile options given to the tensorflow framework.
    pub fn check(&self) -> Result<()> {
        if self.framework != Framework::Tensorflow {
            return Ok(());
        }
        let ignored: Vec<&str> = [
            ("--target", self.target.is_some()),
            ("--argname", self.argname.is_some()),
            ("--fp16", self.fp16),
        ]
        .into_iter()
        .filter_map(|(flag, set)| set.then_some(flag))
        .collect();
        if ignored.is_empty() {
            Ok(())
        } else {
            Err(MigxError::config(format!(
                "{} only apply to --framework migraphx",
                ignored.join(", ")
            )))
        }
    }
}

/// Run an ImageNet validation sweep through a compiled model.
#[derive(Parser, Debug)]
#[command(name = "migx-imagenet")]
#[command(author, version, about, long_about = None)]
pub struct ImagenetCli {
    /// Model file (ONNX or frozen TensorFlow graph).
    pub model: PathBuf,

    /// Directory holding the images named in the manifest.
    pub image_dir: PathBuf,

    /// Execution target (gpu, cpu).
    #[arg(long)]
    pub target: Option<String>,

    /// Name of the model's input parameter.
    #[arg(long)]
    pub argname: Option<String>,

    /// Local JSON label map instead of the remote one.
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// Manifest of `filename label` lines.
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Quantize the compiled program to float16 (gpu target only).
    #[arg(long)]
    pub fp16: bool,

    /// Path to optional YAML config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Usage line printed when the positional arguments are wrong.
pub const IMAGENET_USAGE: &str = "Usage: migx-imagenet <ONNX file> <image directory>";

impl ImagenetCli {
    /// Parse command line arguments, exiting with status 1 on misuse.
    pub fn parse_args() -> Self {
        match Self::try_parse() {
            Ok(cli) => cli,
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                e.exit()
            }
            Err(e) => {
                eprintln!("{}", e);
                eprintln!("{}", IMAGENET_USAGE);
                std::process::exit(1);
            }
        }
    }
}

/// Resolve the execution target: flag, then config, then the build default.
pub fn resolve_target(flag: Option<&str>, config: &Config) -> Result<Target> {
    match flag.or(config.engine.target.as_deref()) {
        Some(s) => s.parse(),
        None => Ok(Target::default()),
    }
}

/// Install the stderr log subscriber.
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bench_defaults() {
        let cli = BenchCli::try_parse_from([
            "migx-bench",
            "--save_file",
            "mobilenet_v2.pb",
            "--image_file",
            "cat.jpg",
        ])
        .unwrap();
        assert_eq!(cli.framework, Framework::Migraphx);
        assert_eq!(cli.resize_val, 224);
        assert_eq!(cli.repeat, 1000);
        assert!(cli.target.is_none());
    }

    #[test]
    fn test_bench_flags() {
        let cli = BenchCli::try_parse_from([
            "migx-bench",
            "--framework",
            "tensorflow",
            "--save_file",
            "m.pb",
            "--image_file",
            "i.jpg",
            "--resize_val",
            "299",
            "--repeat",
            "10",
        ])
        .unwrap();
        assert_eq!(cli.framework, Framework::Tensorflow);
        assert_eq!(cli.resize_val, 299);
        assert_eq!(cli.repeat, 10);
    }

    #[test]
    fn test_bench_rejects_bad_values() {
        let base = ["migx-bench", "--save_file", "m.pb", "--image_file", "i.jpg"];
        let with = |extra: &[&str]| {
            let mut args: Vec<&str> = base.to_vec();
            args.extend_from_slice(extra);
            BenchCli::try_parse_from(args)
        };
        assert!(with(&["--framework", "pytorch"]).is_err());
        assert!(with(&["--repeat", "0"]).is_err());
        assert!(BenchCli::try_parse_from(["migx-bench", "--image_file", "i.jpg"]).is_err());
    }

    #[test]
    fn test_tensorflow_rejects_compile_flags() {
        let parse = |extra: &[&str]| {
            let mut args = vec!["migx-bench", "--save_file", "m.pb", "--image_file", "i.jpg"];
            args.extend_from_slice(extra);
            BenchCli::try_parse_from(args).unwrap()
        };
        assert!(parse(&["--framework", "tensorflow"]).check().is_ok());
        assert!(parse(&["--target", "cpu", "--fp16"]).check().is_ok());

        let err = parse(&["--framework", "tensorflow", "--target", "cpu"])
            .check()
            .unwrap_err();
        assert!(matches!(err, MigxError::Config(_)));
        assert!(err.to_string().contains("--target"));

        let err = parse(&["--framework", "tensorflow", "--fp16", "--argname", "x"])
            .check()
            .unwrap_err();
        assert!(err.to_string().contains("--argname, --fp16"));
    }

    #[test]
    fn test_imagenet_positionals() {
        let cli = ImagenetCli::try_parse_from(["migx-imagenet", "resnet50.onnx", "/data/val"]).unwrap();
        assert_eq!(cli.model, PathBuf::from("resnet50.onnx"));
        assert_eq!(cli.image_dir, PathBuf::from("/data/val"));

        assert!(ImagenetCli::try_parse_from(["migx-imagenet", "resnet50.onnx"]).is_err());
        assert!(ImagenetCli::try_parse_from(["migx-imagenet", "a", "b", "c"]).is_err());
    }

    #[test]
    fn test_resolve_target() {
        let mut config = Config::default();
        assert_eq!(resolve_target(Some("cpu"), &config).unwrap(), Target::Cpu);
        assert_eq!(resolve_target(None, &config).unwrap(), Target::default());

        config.engine.target = Some("gpu".into());
        assert_eq!(resolve_target(None, &config).unwrap(), Target::Gpu);
        assert_eq!(resolve_target(Some("cpu"), &config).unwrap(), Target::Cpu);
        assert!(resolve_target(Some("npu"), &config).is_err());
    }
}
