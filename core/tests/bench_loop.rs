mod common;

use anyhow::Result;
use approx::assert_abs_diff_eq;
use migx_rs::bench::{run_bench, Backend, Framework, GraphBackend};
use migx_rs::preprocess::{load_bench_image, Layout};
use ndarray::{ArrayD, IxDyn};
use std::sync::atomic::Ordering;

use common::{scores_with_top, write_image, StubRunner};

#[test]
fn bench_runs_warmup_and_timed_passes() -> Result<()> {
    let runner = StubRunner::new("input", vec![1, 3, 8, 8], scores_with_top(&[283, 1, 2]));
    let calls = runner.calls();
    let mut backend = GraphBackend::new(Box::new(runner), "input")?;
    assert_eq!(backend.layout(), Layout::Nchw);

    let image = ArrayD::<f32>::zeros(IxDyn(&[1, 3, 8, 8]));
    let report = run_bench(&mut backend, &image, 1000)?;

    assert_eq!(calls.load(Ordering::SeqCst), 2000);
    assert_eq!(report.index, 283);
    assert_eq!(report.repeat, 1000);
    assert_eq!(report.framework, Framework::Migraphx);

    let mut out = Vec::new();
    report.write_to(&mut out)?;
    let text = String::from_utf8(out)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "MIGraphX: ");
    assert_eq!(lines[1], "IDX  =  283");
    assert!(lines[2].starts_with("Time =  "));
    Ok(())
}

#[test]
fn bench_index_is_stable_across_repeats() -> Result<()> {
    for repeat in [1, 7] {
        let runner = StubRunner::new("input", vec![1, 3, 4, 4], scores_with_top(&[42]));
        let mut backend = GraphBackend::new(Box::new(runner), "input")?;
        let image = ArrayD::<f32>::zeros(IxDyn(&[1, 3, 4, 4]));
        assert_eq!(run_bench(&mut backend, &image, repeat)?.index, 42);
    }
    Ok(())
}

#[test]
fn bench_rejects_zero_repeat_and_unknown_input() -> Result<()> {
    let runner = StubRunner::new("input", vec![1, 3, 4, 4], scores_with_top(&[0]));
    let calls = runner.calls();
    let mut backend = GraphBackend::new(Box::new(runner), "input")?;
    let image = ArrayD::<f32>::zeros(IxDyn(&[1, 3, 4, 4]));
    assert!(run_bench(&mut backend, &image, 0).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let runner = StubRunner::new("x", vec![1, 3, 4, 4], Vec::new());
    let err = GraphBackend::new(Box::new(runner), "input").err().unwrap();
    assert!(err.to_string().contains("candidates: x"));
    Ok(())
}

#[test]
fn bench_image_feeds_matching_backend() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("solid.png");
    write_image(&path, 40, 30, [64, 128, 192]);

    let runner = StubRunner::new("input", vec![1, 3, 16, 16], scores_with_top(&[7]));
    let mut backend = GraphBackend::new(Box::new(runner), "input")?;
    let image = load_bench_image(&path, 16, backend.layout())?;
    assert_eq!(image.shape(), &[1, 3, 16, 16]);
    // Channel 0 holds blue.
    assert_abs_diff_eq!(image[[0, 0, 5, 5]], 192.0 / 256.0, epsilon = 1e-6);
    assert_abs_diff_eq!(image[[0, 2, 5, 5]], 64.0 / 256.0, epsilon = 1e-6);

    assert_eq!(run_bench(&mut backend, &image, 3)?.index, 7);

    let nhwc = load_bench_image(&path, 16, Layout::Nhwc)?;
    assert_eq!(nhwc.shape(), &[1, 16, 16, 3]);
    assert!(run_bench(&mut backend, &nhwc, 1).is_err());
    Ok(())
}
