//! Perceptual image hashing for duplicate detection.
//!
//! The hash tolerates re-encoding and mild compression while staying
//! exact-match comparable:
//!
//! 1. Decode (format sniffed from content, not from the extension).
//! 2. Flatten transparency onto a fixed background.
//! 3. Convert to greyscale and downsample to a `grid x grid` image.
//! 4. Equalise: replace each intensity with its percentile rank in the
//!    grid, rescaled to the grid's original min..max range. Uniform
//!    brightness or contrast shifts then map to the same grid.
//! 5. Gradient hash: one bit per horizontally adjacent pair and one per
//!    vertically adjacent pair (`left < right`, `top < bottom`).
//!
//! For the default 8x8 grid that is 56 + 56 = 112 bits, rendered as 28
//! lowercase hex characters.

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageReader, Rgb, RgbImage};
use thiserror::Error;

/// Default side length of the downsampled grid.
pub const DEFAULT_GRID_SIZE: u32 = 8;

/// Errors that can occur during perceptual hashing.
#[derive(Debug, Error)]
pub enum PerceptualError {
    /// Failed to open or read the file.
    #[error("Failed to read image {0}: {1}")]
    Io(String, #[source] std::io::Error),

    /// Failed to decode the image.
    #[error("Failed to decode image {0}: {1}")]
    Decode(String, #[source] image::ImageError),
}

/// Computes equalised gradient hashes.
#[derive(Debug, Clone)]
pub struct PerceptualHasher {
    grid: u32,
    background: Rgb<u8>,
}

impl PerceptualHasher {
    /// Create a hasher with a `grid x grid` sample (minimum 2) and a
    /// white background for transparent pixels.
    #[must_use]
    pub fn new(grid: u32) -> Self {
        Self {
            grid: grid.max(2),
            background: Rgb([255, 255, 255]),
        }
    }

    /// Use a different background for flattening transparency.
    #[must_use]
    pub fn with_background(mut self, background: Rgb<u8>) -> Self {
        self.background = background;
        self
    }

    /// Grid side length.
    #[must_use]
    pub fn grid_size(&self) -> u32 {
        self.grid
    }

    /// Number of bits in every hash produced by this hasher.
    #[must_use]
    pub fn bit_len(&self) -> usize {
        let g = self.grid as usize;
        2 * g * (g - 1)
    }

    /// Compute the perceptual hash of the image at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PerceptualError`] if the file cannot be read or decoded.
    pub fn compute_hash<P: AsRef<Path>>(&self, path: P) -> Result<String, PerceptualError> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let img = ImageReader::open(path)
            .map_err(|e| PerceptualError::Io(name.clone(), e))?
            .with_guessed_format()
            .map_err(|e| PerceptualError::Io(name.clone(), e))?
            .decode()
            .map_err(|e| PerceptualError::Decode(name, e))?;

        Ok(self.hash_image(&img))
    }

    /// Compute the perceptual hash of a decoded image.
    #[must_use]
    pub fn hash_image(&self, img: &DynamicImage) -> String {
        let flat = flatten(img, self.background);
        let grey: GrayImage = image::imageops::grayscale(&flat);
        let small = image::imageops::resize(&grey, self.grid, self.grid, FilterType::Triangle);

        let mut pixels = small.into_raw();
        equalize(&mut pixels);
        let bits = gradient_bits(&pixels, self.grid as usize);
        to_hex(&bits)
    }
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_SIZE)
    }
}

/// Composite an image over an opaque background.
fn flatten(img: &DynamicImage, background: Rgb<u8>) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let alpha = u32::from(px[3]);
        let blend = |c: u8, bg: u8| -> u8 {
            ((u32::from(c) * alpha + u32::from(bg) * (255 - alpha) + 127) / 255) as u8
        };
        out.put_pixel(
            x,
            y,
            Rgb([
                blend(px[0], background[0]),
                blend(px[1], background[1]),
                blend(px[2], background[2]),
            ]),
        );
    }
    out
}

/// Percentile-rank equalisation, rescaled to the original min..max range.
///
/// A pixel's rank is the fraction of pixels with an intensity less than or
/// equal to its own. Uniform inputs are left untouched.
fn equalize(pixels: &mut [u8]) {
    let n = pixels.len();
    let (Some(&min), Some(&max)) = (pixels.iter().min(), pixels.iter().max()) else {
        return;
    };
    if min == max {
        return;
    }

    let mut cumulative = [0usize; 256];
    for &p in pixels.iter() {
        cumulative[p as usize] += 1;
    }
    for i in 1..256 {
        cumulative[i] += cumulative[i - 1];
    }

    let span = f64::from(max - min);
    for p in pixels.iter_mut() {
        let rank = cumulative[*p as usize] as f64 / n as f64;
        *p = (f64::from(min) + rank * span).round().clamp(0.0, 255.0) as u8;
    }
}

/// Row-wise then column-wise gradient comparisons over a square grid.
fn gradient_bits(pixels: &[u8], grid: usize) -> Vec<bool> {
    let at = |x: usize, y: usize| pixels[y * grid + x];
    let mut bits = Vec::with_capacity(2 * grid * (grid - 1));

    for y in 0..grid {
        for x in 0..grid - 1 {
            bits.push(at(x, y) < at(x + 1, y));
        }
    }
    for y in 0..grid - 1 {
        for x in 0..grid {
            bits.push(at(x, y) < at(x, y + 1));
        }
    }
    bits
}

fn to_hex(bits: &[bool]) -> String {
    bits.chunks(8)
        .map(|chunk| {
            let byte = chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (i, &bit)| acc | (u8::from(bit) << (7 - i)));
            format!("{byte:02x}")
        })
        .collect()
}
