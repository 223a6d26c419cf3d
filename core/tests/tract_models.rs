mod common;

use anyhow::{bail, Context, Result};
use approx::assert_abs_diff_eq;
use migx_rs::bench::{run_bench, Backend, Framework, GraphBackend, SessionBackend};
use migx_rs::engine::{
    compile, CompileOptions, ModelFormat, ModelRunner, ParameterMap, Session, Target,
};
use migx_rs::labels::LabelTable;
use migx_rs::manifest::Manifest;
use migx_rs::preprocess::{load_bench_image, Layout, Pipeline};
use migx_rs::validate::Sweep;
use std::io::Cursor;
use std::path::PathBuf;

use common::write_image;

const TF_FEED: &str = "import/input:0";
const TF_FETCH: &str = "import/MobilenetV2/Predictions/Reshape_1:0";

/// Path of a checked-in model written by `tests/fixtures/generate.py`.
fn fixture(name: &str) -> Result<PathBuf> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    if !path.exists() {
        bail!(
            "Missing test fixture at {}. Run `python3 core/tests/fixtures/generate.py` first.",
            path.display()
        );
    }
    Ok(path)
}

fn cpu() -> CompileOptions {
    CompileOptions {
        target: Target::Cpu,
        ..Default::default()
    }
}

#[test]
fn symbolic_batch_defaults_to_one() -> Result<()> {
    let model = compile(fixture("classifier_224.onnx")?, &cpu())
        .context("Failed to compile classifier with a symbolic batch")?;

    assert_eq!(model.target(), Target::Cpu);
    let param = model.parameter("0").context("input 0 not declared")?;
    assert_eq!(param.shape, vec![1, 3, 224, 224]);

    let params = ParameterMap::allocate(model.parameters());
    let output = model.run(&params)?;
    assert_eq!(output.shape(), &[1, 1000]);

    let scores = output.first_row();
    assert_abs_diff_eq!(scores[283], 10.0, epsilon = 1e-5);
    assert_abs_diff_eq!(scores[7], 7e-4, epsilon = 1e-5);
    Ok(())
}

#[test]
fn explicit_input_shape_is_honored() -> Result<()> {
    let options = CompileOptions {
        format: Some(ModelFormat::Onnx),
        target: Target::Cpu,
        input_shape: Some(vec![1, 3, 224, 224]),
        fp16: false,
    };
    let model = compile(fixture("classifier_224.onnx")?, &options)?;
    assert_eq!(model.parameters()[0].shape, vec![1, 3, 224, 224]);
    Ok(())
}

#[test]
fn onnx_sweep_ranks_real_outputs() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_image(&dir.path().join("red.png"), 300, 260, [255, 0, 0]);
    write_image(&dir.path().join("black.png"), 260, 300, [0, 0, 0]);

    let model = compile(fixture("classifier_224.onnx")?, &cpu())?;
    let mut sweep = Sweep::new(model.as_ref(), "0", dir.path())?;
    assert_eq!(sweep.pipeline(), Pipeline::Imagenet224);

    let labels: LabelTable = [(283, "Persian cat".to_string())].into_iter().collect();
    let manifest = "red.png 7\nblack.png 283\nblack.png 281\n";
    let mut out = Vec::new();
    let summary = sweep.run(Manifest::new(Cursor::new(manifest)), &labels, &mut out)?;

    let text = String::from_utf8(out)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "red.png first 7 7 283 281 285 287",
            "#actual   7 <unknown>",
            "#expected 7 <unknown>",
            "black.png first 283 283 281 285 287 282",
            "#actual   283 Persian cat",
            "#expected 283 Persian cat",
            "black.png second 281 283 281 285 287 282",
            "#actual   283 Persian cat",
            "#expected 281 <unknown>",
        ]
    );
    assert_eq!((summary.count, summary.top1, summary.top5), (3, 2, 3));
    Ok(())
}

#[test]
fn onnx_299_model_uses_inception_pipeline() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_image(&dir.path().join("wide.png"), 500, 375, [0, 0, 0]);

    let model = compile(fixture("classifier_299.onnx")?, &cpu())?;
    let mut sweep = Sweep::new(model.as_ref(), "0", dir.path())?;
    assert_eq!(sweep.pipeline(), Pipeline::Imagenet299);

    let mut out = Vec::new();
    let summary = sweep.run(
        Manifest::new(Cursor::new("wide.png 287\n")),
        &LabelTable::default(),
        &mut out,
    )?;
    assert!(String::from_utf8(out)?.starts_with("wide.png fourth 287 283 281 285 287 282\n"));
    assert_eq!(summary.top5, 1);
    Ok(())
}

#[test]
fn tensorflow_session_bench() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let blue = dir.path().join("blue.png");
    let black = dir.path().join("black.png");
    write_image(&blue, 40, 30, [64, 128, 192]);
    write_image(&black, 40, 30, [0, 0, 0]);

    let session = Session::load(fixture("classifier_nhwc.pb")?, TF_FEED, TF_FETCH, &[1, 16, 16, 3])?;
    assert_eq!(session.feed(), "input");
    assert_eq!(session.fetch(), "MobilenetV2/Predictions/Reshape_1");
    assert_eq!(session.feed_shape(), &[1, 16, 16, 3]);

    let image = load_bench_image(&blue, 16, Layout::Nhwc)?;
    let output = session.run(&image)?;
    assert_eq!(output.shape(), &[1, 1000]);
    // Channel 0 of the bench image is blue.
    assert_abs_diff_eq!(output.first_row()[283], 192.0 / 256.0, epsilon = 1e-4);

    let mut backend = SessionBackend::new(session);
    assert_eq!(backend.layout(), Layout::Nhwc);
    let report = run_bench(&mut backend, &image, 3)?;
    assert_eq!(report.framework, Framework::Tensorflow);
    assert_eq!(report.index, 283);

    let dark = load_bench_image(&black, 16, Layout::Nhwc)?;
    assert_eq!(run_bench(&mut backend, &dark, 1)?.index, 0);

    let wrong = load_bench_image(&blue, 8, Layout::Nhwc)?;
    assert!(run_bench(&mut backend, &wrong, 1).is_err());
    Ok(())
}

#[test]
fn tensorflow_graph_compiles_for_cpu() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let blue = dir.path().join("blue.png");
    write_image(&blue, 20, 20, [64, 128, 192]);

    let options = CompileOptions {
        format: Some(ModelFormat::TfProtobuf),
        target: Target::Cpu,
        input_shape: Some(Layout::Nhwc.batch_shape(16)),
        fp16: false,
    };
    let model = compile(fixture("classifier_nhwc.pb")?, &options)?;
    let mut backend = GraphBackend::new(model, "input")?;
    assert_eq!(backend.layout(), Layout::Nhwc);

    let image = load_bench_image(&blue, 16, backend.layout())?;
    assert_eq!(run_bench(&mut backend, &image, 2)?.index, 283);
    Ok(())
}
