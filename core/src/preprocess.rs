//! Image loading and preprocessing.
//!
//! Two families of inputs are produced here:
//!
//! - the bench image: exact resize, BGR channel order, values scaled by
//!   1/256, channel-first or channel-last depending on the backend;
//! - the ImageNet validation pipelines: resize the shorter side, center crop,
//!   RGB in [0, 1], then per-channel mean/std normalization, channel-first.

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use ndarray::{Array3, ArrayD, Axis};
use std::fmt;
use std::path::Path;

use crate::error::{MigxError, Result};

/// Per-channel mean (RGB) subtracted by the validation pipelines.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// Per-channel standard deviation (RGB) used by the validation pipelines.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.224];

/// Memory layout of a 4-D image batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `[batch, channels, height, width]`
    Nchw,
    /// `[batch, height, width, channels]`
    Nhwc,
}

impl Layout {
    /// Infer the layout from a declared 3-channel input shape.
    pub fn from_shape(shape: &[usize]) -> Option<Self> {
        match shape {
            [_, 3, _, _] => Some(Self::Nchw),
            [_, _, _, 3] => Some(Self::Nhwc),
            _ => None,
        }
    }

    /// Shape of a single-image batch of `size x size` pixels.
    pub fn batch_shape(&self, size: usize) -> Vec<usize> {
        match self {
            Self::Nchw => vec![1, 3, size, size],
            Self::Nhwc => vec![1, size, size, 3],
        }
    }
}

fn open_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| MigxError::image(format!("{}: {}", path.display(), e)))
}

/// Stack an `[H, W, C]` array into a contiguous one-image batch.
fn into_batch(hwc: Array3<f32>, layout: Layout) -> ArrayD<f32> {
    let arranged = match layout {
        Layout::Nhwc => hwc,
        Layout::Nchw => hwc.permuted_axes([2, 0, 1]),
    };
    arranged
        .as_standard_layout()
        .into_owned()
        .insert_axis(Axis(0))
        .into_dyn()
}

/// Load the single image used by the bench runner.
pub fn load_bench_image(path: impl AsRef<Path>, size: u32, layout: Layout) -> Result<ArrayD<f32>> {
    let path = path.as_ref();
    let img = open_image(path)?;
    Ok(bench_tensor(&img, size, layout))
}

/// Resize exactly to `size x size` and scale BGR bytes by 1/256.
pub fn bench_tensor(img: &DynamicImage, size: u32, layout: Layout) -> ArrayD<f32> {
    let resized = imageops::resize(&img.to_rgb8(), size, size, FilterType::Triangle);
    let (w, h) = resized.dimensions();
    let hwc = Array3::from_shape_fn((h as usize, w as usize, 3), |(y, x, c)| {
        // BGR: channel 0 is blue.
        resized.get_pixel(x as u32, y as u32)[2 - c] as f32 / 256.0
    });
    into_batch(hwc, layout)
}

/// Preprocessing pipeline of the validation runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    /// Resize 256, center crop 224.
    Imagenet224,
    /// Resize 299, center crop 299.
    Imagenet299,
}

impl Pipeline {
    /// Select the pipeline by exact match on the model's input shape.
    pub fn for_shape(shape: &[usize]) -> Result<Self> {
        match shape {
            [1, 3, 224, 224] => Ok(Self::Imagenet224),
            [1, 3, 299, 299] => Ok(Self::Imagenet299),
            other => Err(MigxError::UnsupportedShape(other.to_vec())),
        }
    }

    /// Target length of the shorter side before cropping.
    pub fn resize(&self) -> u32 {
        match self {
            Self::Imagenet224 => 256,
            Self::Imagenet299 => 299,
        }
    }

    /// Side of the square center crop.
    pub fn crop(&self) -> u32 {
        match self {
            Self::Imagenet224 => 224,
            Self::Imagenet299 => 299,
        }
    }

    /// Shape of the tensor this pipeline produces.
    pub fn output_shape(&self) -> Vec<usize> {
        Layout::Nchw.batch_shape(self.crop() as usize)
    }

    /// Decode an image file and run the pipeline on it.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<ArrayD<f32>> {
        let img = open_image(path.as_ref())?;
        self.apply(&img)
    }

    /// Run the pipeline on a decoded image of any color mode.
    pub fn apply(&self, img: &DynamicImage) -> Result<ArrayD<f32>> {
        let rgb = img.to_rgb8();
        let resized = resize_shorter_side(&rgb, self.resize())?;
        let cropped = center_crop(&resized, self.crop())?;
        Ok(normalize(&cropped))
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imagenet224 => write!(f, "imagenet224"),
            Self::Imagenet299 => write!(f, "imagenet299"),
        }
    }
}

/// Output size when the shorter side of `(w, h)` is scaled to `size`.
///
/// The longer side is truncated, so a 500x375 image at 256 becomes 341x256.
pub fn shorter_side_dims(w: u32, h: u32, size: u32) -> (u32, u32) {
    if w <= h {
        let long = (size as u64 * h as u64 / w as u64) as u32;
        (size, long)
    } else {
        let long = (size as u64 * w as u64 / h as u64) as u32;
        (long, size)
    }
}

/// Top-left corner of a centered `crop x crop` window.
pub fn center_crop_offsets(w: u32, h: u32, crop: u32) -> (u32, u32) {
    let offset = |dim: u32| ((dim - crop) as f64 / 2.0).round_ties_even() as u32;
    (offset(w), offset(h))
}

fn resize_shorter_side(img: &RgbImage, size: u32) -> Result<RgbImage> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(MigxError::image("Empty image"));
    }
    let (nw, nh) = shorter_side_dims(w, h, size);
    if (nw, nh) == (w, h) {
        return Ok(img.clone());
    }
    Ok(imageops::resize(img, nw, nh, FilterType::Triangle))
}

fn center_crop(img: &RgbImage, crop: u32) -> Result<RgbImage> {
    let (w, h) = img.dimensions();
    if w < crop || h < crop {
        return Err(MigxError::image(format!(
            "Image {}x{} is smaller than the {}x{} crop",
            w, h, crop, crop
        )));
    }
    let (x, y) = center_crop_offsets(w, h, crop);
    Ok(imageops::crop_imm(img, x, y, crop, crop).to_image())
}

/// RGB bytes to a normalized `[1, 3, H, W]` batch.
fn normalize(img: &RgbImage) -> ArrayD<f32> {
    let (w, h) = img.dimensions();
    let hwc = Array3::from_shape_fn((h as usize, w as usize, 3), |(y, x, c)| {
        let v = img.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
        (v - IMAGENET_MEAN[c]) / IMAGENET_STD[c]
    });
    into_batch(hwc, Layout::Nchw)
}
