//! RGB pixel buffers.

use std::path::Path;

use anyhow::Context as _;
use gymkhana_common::error::{GymkhanaError, GymkhanaResult};
use image::imageops::FilterType;
use image::{ImageBuffer, Rgb, RgbImage};

/// Bytes per pixel in every [`Frame`].
pub const CHANNELS: usize = 3;

/// A decoded video frame: RGB24, row-major, tightly packed.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl Frame {
    /// Wrap raw RGB24 bytes, checking the length against the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> GymkhanaResult<Self> {
        let expected = byte_len(width, height);
        if data.len() != expected {
            return Err(GymkhanaError::decode_failed(format!(
                "frame buffer holds {} bytes, expected {expected} for {width}x{height} rgb24",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A frame where every pixel is `rgb`.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(byte_len(width, height))
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn same_size(&self, other: &Frame) -> bool {
        self.dimensions() == other.dimensions()
    }

    /// Pixel at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let off = (y as usize * self.width as usize + x as usize) * CHANNELS;
        Some([self.data[off], self.data[off + 1], self.data[off + 2]])
    }

    /// Bilinear resample to `width`x`height`. Returns a clone when the
    /// size already matches.
    pub fn resized(&self, width: u32, height: u32) -> GymkhanaResult<Frame> {
        if self.dimensions() == (width, height) {
            return Ok(self.clone());
        }
        if width == 0 || height == 0 {
            return Err(GymkhanaError::invalid_value(format!(
                "cannot resize a frame to {width}x{height}"
            )));
        }
        let view = ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(
            self.width,
            self.height,
            self.data.as_slice(),
        )
        .ok_or_else(|| GymkhanaError::decode_failed("frame buffer does not match its dimensions"))?;
        let out = image::imageops::resize(&view, width, height, FilterType::Triangle);
        Ok(Self::from(out))
    }

    /// Write the frame as a PNG file.
    pub fn save_png(&self, path: &Path) -> GymkhanaResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        image::save_buffer_with_format(
            path,
            &self.data,
            self.width,
            self.height,
            image::ColorType::Rgb8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }
}

impl From<RgbImage> for Frame {
    fn from(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }
}

/// Byte length of an RGB24 frame.
pub fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * CHANNELS
}
