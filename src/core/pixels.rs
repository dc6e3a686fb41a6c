//! Working pixel buffers.
//!
//! Kernels never touch image storage directly. Inputs are decoded from their
//! stored format into interleaved `f32` buffers, kernels produce new buffers,
//! and the engine encodes results back honoring the output's pitches and the
//! attachment rectangle.

use crate::core::error::{FilterError, FilterResult};
use crate::core::types::{ComponentType, ComputeType, ImageDescriptor, Rect};
use half::f16;
use rayon::prelude::*;

/// Interleaved `f32` pixels, slices stacked after each other.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub channels: u32,
    pub data: Vec<f32>,
}

impl PixelBuffer {
    /// Create a zero-filled buffer.
    pub fn new(width: u32, height: u32, depth: u32, channels: u32) -> Self {
        let len = width as usize * height as usize * depth as usize * channels as usize;
        Self {
            width,
            height,
            depth,
            channels,
            data: vec![0.0; len],
        }
    }

    /// Create a buffer with the same shape as `other`.
    pub fn like(other: &PixelBuffer) -> Self {
        Self::new(other.width, other.height, other.depth, other.channels)
    }

    /// Create a buffer shaped after a descriptor.
    pub fn for_descriptor(desc: &ImageDescriptor) -> Self {
        Self::new(desc.width, desc.height, desc.depth, desc.num_components)
    }

    /// Number of `f32` values in one row.
    pub fn row_len(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    /// Number of rows across all slices.
    pub fn total_rows(&self) -> usize {
        self.height as usize * self.depth as usize
    }

    /// Offset of the first channel of a pixel.
    pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
        ((z as usize * self.height as usize + y as usize) * self.width as usize + x as usize)
            * self.channels as usize
    }

    /// Read a channel.
    pub fn get(&self, x: u32, y: u32, z: u32, c: u32) -> f32 {
        self.data[self.index(x, y, z) + c as usize]
    }

    /// Read a channel with coordinates clamped to the slice edges.
    pub fn sample_clamped(&self, x: i64, y: i64, z: u32, c: u32) -> f32 {
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        self.get(x, y, z, c)
    }

    /// Write a channel.
    pub fn set(&mut self, x: u32, y: u32, z: u32, c: u32, value: f32) {
        let i = self.index(x, y, z) + c as usize;
        self.data[i] = value;
    }

    /// Whether two buffers have identical dimensions.
    pub fn same_shape(&self, other: &PixelBuffer) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.depth == other.depth
            && self.channels == other.channels
    }

    /// Round every value through the given compute precision.
    pub fn quantize(&mut self, compute: ComputeType) {
        if compute == ComputeType::Float16 {
            self.data
                .par_iter_mut()
                .for_each(|v| *v = f16::from_f32(*v).to_f32());
        }
    }

    /// Convert to another channel count.
    ///
    /// Colour reduces to Rec. 709 luminance, grey expands to all colour
    /// channels, and a missing alpha channel reads as opaque.
    pub fn convert_channels(&self, channels: u32) -> PixelBuffer {
        if channels == self.channels {
            return self.clone();
        }
        let src_channels = self.channels as usize;
        let mut out = PixelBuffer::new(self.width, self.height, self.depth, channels);
        out.data
            .par_chunks_mut(channels as usize)
            .zip(self.data.par_chunks(src_channels))
            .for_each(|(dst, src)| {
                let (rgb, alpha) = match src_channels {
                    1 => ([src[0]; 3], 1.0),
                    2 => ([src[0]; 3], src[1]),
                    3 => ([src[0], src[1], src[2]], 1.0),
                    _ => ([src[0], src[1], src[2]], src[3]),
                };
                let luma = 0.2126 * rgb[0] + 0.7152 * rgb[1] + 0.0722 * rgb[2];
                match dst.len() {
                    1 => dst[0] = luma,
                    2 => {
                        dst[0] = luma;
                        dst[1] = alpha;
                    }
                    3 => dst.copy_from_slice(&rgb),
                    _ => {
                        dst[..3].copy_from_slice(&rgb);
                        dst[3] = alpha;
                    }
                }
            });
        out
    }

    /// Build a buffer in the shape of `self` by computing every pixel.
    ///
    /// `f` receives the pixel coordinates and the output channels to fill.
    /// Rows are processed in parallel.
    pub fn map_pixels<F>(&self, f: F) -> PixelBuffer
    where
        F: Fn(u32, u32, u32, &mut [f32]) + Sync,
    {
        let mut out = PixelBuffer::like(self);
        let row_len = self.row_len();
        let height = self.height;
        let channels = self.channels as usize;
        if row_len == 0 {
            return out;
        }
        out.data
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(row, pixels)| {
                let z = (row / height as usize) as u32;
                let y = (row % height as usize) as u32;
                for (x, px) in pixels.chunks_mut(channels).enumerate() {
                    f(x as u32, y, z, px);
                }
            });
        out
    }

    /// Decode pixel storage laid out as `desc` describes.
    pub fn decode(bytes: &[u8], desc: &ImageDescriptor) -> FilterResult<Self> {
        check_storage(bytes.len(), desc)?;
        let mut buffer = PixelBuffer::for_descriptor(desc);
        let row_len = buffer.row_len();
        let height = desc.height as usize;
        let row_pitch = desc.row_pitch_bytes();
        let slice_pitch = desc.slice_pitch_bytes();
        let packed = desc.packed_row_size();
        let component = desc.component_type;

        buffer
            .data
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(row, values)| {
                let start = (row / height) * slice_pitch + (row % height) * row_pitch;
                decode_row(&bytes[start..start + packed], component, values);
            });
        Ok(buffer)
    }

    /// Encode into pixel storage laid out as `desc` describes.
    ///
    /// With a rectangle only pixels inside it are written; everything else
    /// keeps its prior contents.
    pub fn encode_into(
        &self,
        bytes: &mut [u8],
        desc: &ImageDescriptor,
        rect: Option<Rect>,
    ) -> FilterResult<()> {
        check_storage(bytes.len(), desc)?;
        if self.width != desc.width
            || self.height != desc.height
            || self.depth != desc.depth
            || self.channels != desc.num_components
        {
            return Err(FilterError::Internal(format!(
                "pixel buffer {}x{}x{}x{} does not match image {}",
                self.width, self.height, self.depth, self.channels, desc
            )));
        }
        let rect = rect.unwrap_or(Rect::new(0, 0, desc.width, desc.height));
        if !rect.fits_within(desc.width, desc.height) {
            return Err(FilterError::InvalidParameter(format!(
                "rect {} exceeds output {}x{}",
                rect, desc.width, desc.height
            )));
        }
        let pixel = desc.pixel_size();
        let channels = self.channels as usize;
        let row_len = self.row_len();
        let component = desc.component_type;
        for z in 0..desc.depth as usize {
            for y in rect.y as usize..(rect.y + rect.height) as usize {
                let start = z * desc.slice_pitch_bytes()
                    + y * desc.row_pitch_bytes()
                    + rect.x as usize * pixel;
                let end = start + rect.width as usize * pixel;
                let src_start =
                    (z * desc.height as usize + y) * row_len + rect.x as usize * channels;
                let src = &self.data[src_start..src_start + rect.width as usize * channels];
                encode_row(src, component, &mut bytes[start..end]);
            }
        }
        Ok(())
    }
}

fn check_storage(len: usize, desc: &ImageDescriptor) -> FilterResult<()> {
    if len < desc.storage_size() {
        return Err(FilterError::Internal(format!(
            "image storage holds {} bytes, descriptor {} needs {}",
            len,
            desc,
            desc.storage_size()
        )));
    }
    Ok(())
}

fn decode_row(bytes: &[u8], component: ComponentType, out: &mut [f32]) {
    match component {
        ComponentType::Uint8 => {
            for (v, b) in out.iter_mut().zip(bytes) {
                *v = *b as f32 / 255.0;
            }
        }
        ComponentType::Float16 => {
            for (v, b) in out.iter_mut().zip(bytes.chunks_exact(2)) {
                *v = f16::from_ne_bytes([b[0], b[1]]).to_f32();
            }
        }
        ComponentType::Float32 => {
            for (v, b) in out.iter_mut().zip(bytes.chunks_exact(4)) {
                *v = f32::from_ne_bytes([b[0], b[1], b[2], b[3]]);
            }
        }
    }
}

fn encode_row(values: &[f32], component: ComponentType, out: &mut [u8]) {
    match component {
        ComponentType::Uint8 => {
            for (b, v) in out.iter_mut().zip(values) {
                *b = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
        }
        ComponentType::Float16 => {
            for (b, v) in out.chunks_exact_mut(2).zip(values) {
                b.copy_from_slice(&f16::from_f32(*v).to_ne_bytes());
            }
        }
        ComponentType::Float32 => {
            for (b, v) in out.chunks_exact_mut(4).zip(values) {
                b.copy_from_slice(&v.to_ne_bytes());
            }
        }
    }
}
