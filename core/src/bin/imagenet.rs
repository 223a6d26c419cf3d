//! ImageNet validation sweep.

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::info;

use migx_rs::cli::{init_logging, resolve_target, ImagenetCli};
use migx_rs::config::Config;
use migx_rs::engine::{compile, CompileOptions};
use migx_rs::labels::LabelTable;
use migx_rs::manifest::Manifest;
use migx_rs::validate::Sweep;
use migx_rs::MigxError;

fn load_labels(cli: &ImagenetCli, config: &Config) -> Result<LabelTable> {
    let path = cli
        .labels
        .clone()
        .or_else(|| config.labels.path.as_ref().map(PathBuf::from));
    let labels = match path {
        Some(path) => LabelTable::from_file(&path)
            .with_context(|| format!("Failed to read labels {}", path.display()))?,
        None => LabelTable::fetch(&config.labels.url)
            .with_context(|| format!("Failed to fetch labels from {}", config.labels.url))?,
    };
    info!("Loaded {} labels", labels.len());
    Ok(labels)
}

fn main() -> Result<()> {
    let cli = ImagenetCli::parse_args();
    init_logging(cli.verbose);

    let config = Config::load_or_default(cli.config.as_deref())
        .context("Failed to load config")?;

    let target = resolve_target(cli.target.as_deref(), &config)?;
    let options = CompileOptions {
        target,
        fp16: cli.fp16,
        ..Default::default()
    };
    info!("Compiling {} for {}", cli.model.display(), target);
    let runner = compile(&cli.model, &options)
        .with_context(|| format!("Failed to compile {}", cli.model.display()))?;

    let input = cli
        .argname
        .as_deref()
        .unwrap_or(&config.validation.input_name);
    let sweep = match Sweep::new(runner.as_ref(), input, &cli.image_dir) {
        Ok(sweep) => sweep,
        Err(e @ MigxError::UnsupportedShape(_)) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };
    let mut sweep = sweep.with_progress_every(config.validation.progress_every);

    let labels = load_labels(&cli, &config)?;

    let manifest_path = cli
        .manifest
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.validation.manifest));
    let records = Manifest::open(&manifest_path)
        .with_context(|| format!("Failed to open manifest {}", manifest_path.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = sweep.run(records, &labels, &mut out)?;
    summary.write_overall(&mut out)?;
    out.flush()?;

    info!(
        "{} images, {} failed, top1 {:.4} top5 {:.4}",
        summary.count,
        summary.failed,
        summary.top1_ratio(),
        summary.top5_ratio()
    );
    Ok(())
}
