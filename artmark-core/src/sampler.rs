//! Image sampling.
//!
//! Every fingerprint in this crate is computed from a [`PixelGrid`]: an
//! immutable, row-major RGBA buffer with 4 bytes per pixel. Grids come either
//! from an [`ImageSampler`] (raw image bytes decoded and resampled to a target
//! square) or from a caller-supplied RGBA buffer.
//!
//! The default sampler, [`CodecSampler`], decodes JPEG, PNG, GIF and WebP with
//! the `image` crate and resamples with a triangle (bilinear) filter.

use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Rgba};

use crate::error::{ArtmarkError, Result};

/// Bytes per pixel in a [`PixelGrid`].
pub const CHANNELS: usize = 4;

/// Immutable width×height grid of RGBA samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelGrid {
    /// Wrap a raw RGBA buffer.
    ///
    /// Fails with [`ArtmarkError::DegenerateInput`] for zero-area grids and
    /// [`ArtmarkError::InvalidInput`] when the buffer length does not match.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ArtmarkError::DegenerateInput { width, height });
        }

        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(CHANNELS))
            .ok_or_else(|| {
                ArtmarkError::InvalidInput(format!("{width}x{height} grid is too large"))
            })?;

        if data.len() != expected {
            return Err(ArtmarkError::InvalidInput(format!(
                "expected {expected} RGBA bytes for a {width}x{height} grid, got {}",
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a grid by evaluating `f(x, y)` for every pixel in raster order.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [u8; 4]) -> Result<Self> {
        let mut data = Vec::with_capacity(width as usize * height as usize * CHANNELS);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self::from_rgba(width, height, data)
    }

    /// Convert a decoded image to a grid at its native resolution.
    pub fn from_image(image: &DynamicImage) -> Result<Self> {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba(width, height, rgba.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// The flat RGBA buffer.
    pub fn as_rgba(&self) -> &[u8] {
        &self.data
    }

    /// RGBA sample at `(x, y)`, or `None` outside the grid.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * CHANNELS;
        let p = &self.data[idx..idx + CHANNELS];
        Some([p[0], p[1], p[2], p[3]])
    }

    /// Resample to `width`×`height` with a triangle filter.
    ///
    /// Returns an identical copy when the size already matches.
    pub fn resample(&self, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ArtmarkError::DegenerateInput { width, height });
        }
        if (width, height) == (self.width, self.height) {
            return Ok(self.clone());
        }

        let view = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(
            self.width,
            self.height,
            self.data.as_slice(),
        )
        .ok_or_else(|| {
            ArtmarkError::Decode("pixel buffer does not match grid dimensions".into())
        })?;

        let resized = image::imageops::resize(&view, width, height, FilterType::Triangle);
        Self::from_rgba(width, height, resized.into_raw())
    }
}

/// Decodes image bytes into a [`PixelGrid`] of a requested size.
///
/// Implementations must be thread-safe (`Send + Sync`) and must fail with
/// [`ArtmarkError::Decode`] on malformed input.
pub trait ImageSampler: Send + Sync {
    fn decode(&self, bytes: &[u8], width: u32, height: u32) -> Result<PixelGrid>;
}

/// [`ImageSampler`] backed by the `image` crate codecs.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecSampler;

impl CodecSampler {
    pub fn new() -> Self {
        Self
    }

    /// Decode at the image's native resolution.
    pub fn decode_native(&self, bytes: &[u8]) -> Result<PixelGrid> {
        let image = load(bytes)?;
        PixelGrid::from_image(&image)
    }

    /// Check if the provided bytes appear to be a supported image format.
    pub fn is_supported_format(data: &[u8]) -> bool {
        image::guess_format(data).is_ok()
    }
}

impl ImageSampler for CodecSampler {
    fn decode(&self, bytes: &[u8], width: u32, height: u32) -> Result<PixelGrid> {
        if width == 0 || height == 0 {
            return Err(ArtmarkError::DegenerateInput { width, height });
        }
        let image = load(bytes)?;
        let resized = image.resize_exact(width, height, FilterType::Triangle);
        PixelGrid::from_image(&resized)
    }
}

fn load(bytes: &[u8]) -> Result<DynamicImage> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| ArtmarkError::Decode(format!("Failed to decode image: {e}")))?;

    if image.width() == 0 || image.height() == 0 {
        return Err(ArtmarkError::DegenerateInput {
            width: image.width(),
            height: image.height(),
        });
    }
    Ok(image)
}
