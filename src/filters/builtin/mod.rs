//! Built-in host kernels.
//!
//! This module contains the kernels the host reference device ships with.
//! Each submodule registers its kernels into a [`FilterCatalog`].

mod arithmetic;
mod blur;
mod color;
mod edge;
mod noise;
mod tonemap;
mod transform;
mod user;

use crate::core::pixels::PixelBuffer;
use crate::filters::catalog::FilterCatalog;

/// Register all built-in kernels.
pub fn register_all(catalog: &mut FilterCatalog) {
    blur::register(catalog);
    color::register(catalog);
    tonemap::register(catalog);
    arithmetic::register(catalog);
    transform::register(catalog);
    edge::register(catalog);
    noise::register(catalog);
    user::register(catalog);
}

// Re-export for direct access
pub use arithmetic::{BinaryOp, ScalarMult, WeightedSum};
pub use blur::{BilateralDenoise, GaussianBlur, MedianDenoise};
pub use color::{BgraToRgba, Convert, GammaCorrection, Normalization, Posterize, RemapRange};
pub use edge::{Emboss, Laplace, Sharpen, Sobel};
pub use noise::RgbNoise;
pub use tonemap::{AcesTonemap, ExponentialTonemap, FilmicTonemap, LinearTonemap, Reinhard02Tonemap};
pub use transform::{Flip, Resample, Rotate};
pub use user::UserDefined;

/// Whether channel `c` is the alpha channel of a pixel with `channels` channels.
pub(crate) fn is_alpha(channels: u32, c: u32) -> bool {
    (channels == 2 && c == 1) || (channels == 4 && c == 3)
}

/// Convolve every colour channel with a `kw` x `kh` kernel, clamping at the
/// edges. Alpha is copied through.
pub(crate) fn convolve(src: &PixelBuffer, kernel: &[f32], kw: u32, kh: u32) -> PixelBuffer {
    let hx = (kw / 2) as i64;
    let hy = (kh / 2) as i64;
    src.map_pixels(|x, y, z, px| {
        for (c, out) in px.iter_mut().enumerate() {
            let c = c as u32;
            if is_alpha(src.channels, c) {
                *out = src.get(x, y, z, c);
                continue;
            }
            let mut sum = 0.0;
            for ky in 0..kh as i64 {
                for kx in 0..kw as i64 {
                    let weight = kernel[(ky * kw as i64 + kx) as usize];
                    if weight != 0.0 {
                        sum += weight
                            * src.sample_clamped(x as i64 + kx - hx, y as i64 + ky - hy, z, c);
                    }
                }
            }
            *out = sum;
        }
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::core::context::{KernelContext, ParameterTable};
    use crate::core::kernel::Kernel;
    use crate::core::pixels::PixelBuffer;
    use crate::core::types::{ComponentType, ComputeType, ImageDescriptor, ParameterValue};
    use std::collections::HashMap;

    /// Run a kernel on `input` with its defaults overridden by `params`.
    pub fn run(
        kernel: &dyn Kernel,
        input: &PixelBuffer,
        params: &[(&str, ParameterValue)],
    ) -> PixelBuffer {
        let mut table = ParameterTable::new();
        for def in kernel.metadata().parameters.iter() {
            table.insert(def.name.clone(), def.default_value.clone());
        }
        for (name, value) in params {
            table.insert(name.to_string(), Some(value.clone()));
        }
        let images = HashMap::new();
        let desc = ImageDescriptor::new(
            input.width,
            input.height,
            input.channels,
            ComponentType::Float32,
        );
        let ctx = KernelContext::new(
            kernel.metadata().filter_type,
            ComputeType::Float32,
            input,
            desc,
            &table,
            &images,
        );
        kernel.execute(&ctx).unwrap()
    }
}
