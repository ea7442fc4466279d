//! Image preprocessing into the fixed classifier input tensor
//!
//! Every model in the cascade was trained on the same input pipeline, so
//! there is exactly one way to turn bytes into a tensor:
//!
//! 1. decode (JPEG, PNG, BMP, WebP)
//! 2. force 3-channel RGB (grayscale replicated, alpha dropped)
//! 3. resize to 224x224 with Catmull-Rom bicubic filtering
//! 4. scale to `[0, 1]`, then normalize with the ImageNet mean/std
//! 5. lay out channel-major with a leading batch axis of 1

use herdscan_core::{Error, Result};
use image::imageops::{self, FilterType};

/// Spatial input size expected by every backbone
pub const INPUT_SIZE: usize = 224;

/// Color channels after conversion to RGB
pub const CHANNELS: usize = 3;

/// Per-channel mean of the ImageNet training set
pub const IMAGENET_MEAN: [f32; CHANNELS] = [0.485, 0.456, 0.406];

/// Per-channel standard deviation of the ImageNet training set
pub const IMAGENET_STD: [f32; CHANNELS] = [0.229, 0.224, 0.225];

const PLANE: usize = INPUT_SIZE * INPUT_SIZE;

/// Normalized `[1, 3, 224, 224]` input, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
}

impl ImageTensor {
    /// Tensor shape in NCHW order
    pub const SHAPE: (usize, usize, usize, usize) = (1, CHANNELS, INPUT_SIZE, INPUT_SIZE);

    /// Number of elements in a tensor
    pub const LEN: usize = CHANNELS * PLANE;

    /// Wrap already-normalized values; the length must match [`Self::LEN`]
    pub fn from_raw(data: Vec<f32>) -> Result<Self> {
        if data.len() != Self::LEN {
            return Err(Error::config(format!(
                "expected {} tensor values, got {}",
                Self::LEN,
                data.len()
            )));
        }
        Ok(Self { data })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn shape(&self) -> [usize; 4] {
        let (n, c, h, w) = Self::SHAPE;
        [n, c, h, w]
    }

    /// One channel plane in row-major order
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.data[index * PLANE..(index + 1) * PLANE]
    }
}

/// Decode image bytes and produce the normalized input tensor
pub fn preprocess(image_bytes: &[u8]) -> Result<ImageTensor> {
    if image_bytes.is_empty() {
        return Err(Error::EmptyInput);
    }

    let decoded = image::load_from_memory(image_bytes).map_err(|e| Error::decode(e.to_string()))?;
    tracing::debug!(
        width = decoded.width(),
        height = decoded.height(),
        color = ?decoded.color(),
        "Decoded input image"
    );

    let rgb = decoded.to_rgb8();
    let resized = imageops::resize(
        &rgb,
        INPUT_SIZE as u32,
        INPUT_SIZE as u32,
        FilterType::CatmullRom,
    );

    let mut data = vec![0.0f32; ImageTensor::LEN];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let offset = y as usize * INPUT_SIZE + x as usize;
        for c in 0..CHANNELS {
            let scaled = pixel[c] as f32 / 255.0;
            data[c * PLANE + offset] = (scaled - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }

    Ok(ImageTensor { data })
}
