//! Grayscale and gradient primitives shared by the fingerprinting modules.
//!
//! All reads go through [`LumaImage::get`], which returns 0 outside the
//! image, so every routine here is total over border pixels.

use crate::sampler::{PixelGrid, CHANNELS};

/// ITU-R BT.601 luma of an RGB triple.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

/// Luma of the pixel starting at byte `offset` of an RGBA buffer.
///
/// Channels past the end of the buffer read as 0.
#[inline]
pub(crate) fn luma_at(rgba: &[u8], offset: usize) -> f64 {
    let channel = |i: usize| rgba.get(offset + i).copied().unwrap_or(0);
    luma(channel(0), channel(1), channel(2))
}

/// Row-major grid of `f64` luma values.
#[derive(Debug, Clone, PartialEq)]
pub struct LumaImage {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl LumaImage {
    pub fn new(width: usize, height: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Value at `(x, y)`; 0 outside the image.
    #[inline]
    pub fn get(&self, x: isize, y: isize) -> f64 {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return 0.0;
        }
        self.data[y as usize * self.width + x as usize]
    }

    /// Half-resolution copy: each output pixel is the mean of a 2×2 block.
    ///
    /// Odd trailing rows and columns are dropped.
    pub fn downsample(&self) -> LumaImage {
        let width = self.width / 2;
        let height = self.height / 2;
        let data = (0..height)
            .flat_map(|y| {
                (0..width).map(move |x| {
                    let (sx, sy) = (2 * x as isize, 2 * y as isize);
                    (self.get(sx, sy)
                        + self.get(sx + 1, sy)
                        + self.get(sx, sy + 1)
                        + self.get(sx + 1, sy + 1))
                        / 4.0
                })
            })
            .collect();
        LumaImage::new(width, height, data)
    }
}

/// Convert an RGBA grid to luma.
pub fn to_grayscale(grid: &PixelGrid) -> LumaImage {
    let data = grid
        .as_rgba()
        .chunks_exact(CHANNELS)
        .map(|p| luma(p[0], p[1], p[2]))
        .collect();
    LumaImage::new(grid.width() as usize, grid.height() as usize, data)
}

const SOBEL_X: [f64; 9] = [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0];
const SOBEL_Y: [f64; 9] = [-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0];

/// 3×3 Sobel gradient at `(x, y)`.
pub fn sobel_gradient(luma: &LumaImage, x: isize, y: isize) -> (f64, f64) {
    let mut gx = 0.0;
    let mut gy = 0.0;
    for ky in -1..=1isize {
        for kx in -1..=1isize {
            let value = luma.get(x + kx, y + ky);
            let k = ((ky + 1) * 3 + (kx + 1)) as usize;
            gx += value * SOBEL_X[k];
            gy += value * SOBEL_Y[k];
        }
    }
    (gx, gy)
}

/// Central-difference gradient at `(x, y)`.
pub fn central_gradient(luma: &LumaImage, x: isize, y: isize) -> (f64, f64) {
    let gx = luma.get(x + 1, y) - luma.get(x - 1, y);
    let gy = luma.get(x, y + 1) - luma.get(x, y - 1);
    (gx, gy)
}

/// `levels` images, each the 2×2 box-filtered half of the previous one.
pub fn gaussian_pyramid(base: &LumaImage, levels: usize) -> Vec<LumaImage> {
    let mut pyramid: Vec<LumaImage> = Vec::with_capacity(levels);
    for _ in 0..levels {
        let next = match pyramid.last() {
            None => base.clone(),
            Some(prev) => prev.downsample(),
        };
        pyramid.push(next);
    }
    pyramid
}
