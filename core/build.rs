//! Build script for migx-rs.
//!
//! With the `migraphx` feature enabled this links the MIGraphX C API
//! (`libmigraphx_c`) shipped with ROCm. Without it nothing is linked and only
//! the CPU target is available.
//!
//! # Environment Variables
//!
//! - `MIGRAPHX_PATH`: MIGraphX installation prefix (optional)
//! - `ROCM_PATH`: ROCm installation prefix, used when `MIGRAPHX_PATH` is unset
//!   (default: `/opt/rocm`)
//! - `MIGRAPHX_SKIP_LINK`: Set to "1" to skip linking (for development)

use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_ROCM_PATH: &str = "/opt/rocm";

/// Locate the MIGraphX installation prefix.
fn migraphx_prefix() -> PathBuf {
    env::var("MIGRAPHX_PATH")
        .or_else(|_| env::var("ROCM_PATH"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_ROCM_PATH))
}

/// Pick `lib64` when present, `lib` otherwise.
fn lib_dir(prefix: &Path) -> PathBuf {
    let lib64 = prefix.join("lib64");
    if lib64.join("libmigraphx_c.so").exists() {
        lib64
    } else {
        prefix.join("lib")
    }
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=MIGRAPHX_PATH");
    println!("cargo:rerun-if-env-changed=ROCM_PATH");
    println!("cargo:rerun-if-env-changed=MIGRAPHX_SKIP_LINK");

    if env::var_os("CARGO_FEATURE_MIGRAPHX").is_none() {
        return;
    }
    if env::var("MIGRAPHX_SKIP_LINK").map(|v| v == "1").unwrap_or(false) {
        println!("cargo:warning=MIGRAPHX_SKIP_LINK=1, not linking libmigraphx_c");
        return;
    }

    let prefix = migraphx_prefix();
    let lib_dir = lib_dir(&prefix);
    if !lib_dir.join("libmigraphx_c.so").exists() {
        println!(
            "cargo:warning=libmigraphx_c.so not found in {}; set MIGRAPHX_PATH or ROCM_PATH",
            lib_dir.display()
        );
    }

    println!("cargo:rustc-link-search=native={}", lib_dir.display());
    println!("cargo:rustc-link-lib=dylib=migraphx_c");

    // Use RPATH instead of RUNPATH so the ROCm libraries resolve at runtime
    println!("cargo:rustc-link-arg=-Wl,--disable-new-dtags");
    println!("cargo:rustc-link-arg=-Wl,-rpath,{}", lib_dir.display());
}
