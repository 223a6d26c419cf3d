//! Single-image latency benchmark.

use anyhow::{Context, Result};
use std::io;
use tracing::info;

use migx_rs::bench::{run_bench, Backend, Framework, GraphBackend, SessionBackend};
use migx_rs::cli::{init_logging, resolve_target, BenchCli};
use migx_rs::config::Config;
use migx_rs::engine::{compile, CompileOptions, ModelFormat, Session, Target};
use migx_rs::preprocess::{load_bench_image, Layout};

/// Shape hint for pinning the CPU graph's input before optimization.
fn input_hint(format: ModelFormat, target: Target, size: usize) -> Option<Vec<usize>> {
    match (format, target) {
        (ModelFormat::Onnx, _) => Some(Layout::Nchw.batch_shape(size)),
        (ModelFormat::TfProtobuf, Target::Cpu) => Some(Layout::Nhwc.batch_shape(size)),
        (ModelFormat::TfProtobuf, Target::Gpu) => None,
    }
}

fn build_backend(cli: &BenchCli, config: &Config) -> Result<Box<dyn Backend>> {
    let size = cli.resize_val as usize;
    match cli.framework {
        Framework::Migraphx => {
            let target = resolve_target(cli.target.as_deref(), config)?;
            let format = ModelFormat::from_path(&cli.save_file);
            let options = CompileOptions {
                format: Some(format),
                target,
                input_shape: input_hint(format, target, size),
                fp16: cli.fp16,
            };
            info!("Compiling {} for {}", cli.save_file.display(), target);
            let runner = compile(&cli.save_file, &options)
                .with_context(|| format!("Failed to compile {}", cli.save_file.display()))?;

            let input = cli.argname.as_deref().unwrap_or(&config.bench.input_name);
            Ok(Box::new(GraphBackend::new(runner, input)?))
        }
        Framework::Tensorflow => {
            let session = Session::load(
                &cli.save_file,
                &config.bench.tf_input,
                &config.bench.tf_output,
                &Layout::Nhwc.batch_shape(size),
            )
            .with_context(|| format!("Failed to load graph {}", cli.save_file.display()))?;
            info!(
                "Feeding {} {:?}, fetching {}",
                session.feed(),
                session.feed_shape(),
                session.fetch()
            );
            Ok(Box::new(SessionBackend::new(session)))
        }
    }
}

fn main() -> Result<()> {
    let cli = BenchCli::parse_args();
    init_logging(cli.verbose);

    let config = Config::load_or_default(cli.config.as_deref())
        .context("Failed to load config")?;

    let mut backend = build_backend(&cli, &config)?;

    let image = load_bench_image(&cli.image_file, cli.resize_val, backend.layout())
        .with_context(|| format!("Failed to load image {}", cli.image_file.display()))?;

    let report = run_bench(backend.as_mut(), &image, cli.repeat as usize)?;
    report.write_to(&mut io::stdout().lock())?;

    Ok(())
}
