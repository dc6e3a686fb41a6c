//! Geometric transforms: flips, quarter-turn rotation and resampling.

use crate::core::context::{KernelContext, ValidationContext};
use crate::core::error::{FilterError, FilterResult};
use crate::core::kernel::{FilterMetadata, Kernel};
use crate::core::parameter::ParameterDefinition;
use crate::core::pixels::PixelBuffer;
use crate::core::types::ParameterValue;
use crate::filters::catalog::FilterCatalog;
use crate::filters::kind::FilterType;

/// Register transform kernels.
pub fn register(catalog: &mut FilterCatalog) {
    catalog.register(|| Box::new(Flip::vertical()));
    catalog.register(|| Box::new(Flip::horizontal()));
    catalog.register(|| Box::new(Rotate));
    catalog.register(|| Box::new(Resample));
}

/// Mirror the image vertically or horizontally.
#[derive(Debug, Clone)]
pub struct Flip {
    vertical: bool,
}

impl Flip {
    /// Top-bottom mirror.
    pub fn vertical() -> Self {
        Self { vertical: true }
    }

    /// Left-right mirror.
    pub fn horizontal() -> Self {
        Self { vertical: false }
    }
}

impl Kernel for Flip {
    fn metadata(&self) -> FilterMetadata {
        let builder = if self.vertical {
            FilterMetadata::builder(FilterType::FlipVertical, "Flip Vertical")
                .description("Mirrors the image top to bottom")
        } else {
            FilterMetadata::builder(FilterType::FlipHorizontal, "Flip Horizontal")
                .description("Mirrors the image left to right")
        };
        builder.tags(["flip", "mirror"]).build()
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let src = ctx.input();
        let (w, h) = (src.width, src.height);
        let vertical = self.vertical;
        Ok(src.map_pixels(|x, y, z, px| {
            let (sx, sy) = if vertical { (x, h - 1 - y) } else { (w - 1 - x, y) };
            for (c, out) in px.iter_mut().enumerate() {
                *out = src.get(sx, sy, z, c as u32);
            }
        }))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

/// Rotates clockwise by a number of quarter turns.
#[derive(Debug, Clone)]
pub struct Rotate;

impl Kernel for Rotate {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::Rotate, "Rotate")
            .description("Rotates clockwise by quarter turns; odd turns need a transposed output")
            .parameter(
                ParameterDefinition::new("rotation", ParameterValue::uint(1))
                    .with_description("Number of clockwise quarter turns (0 to 3)")
                    .with_range(0.0, 3.0),
            )
            .tags(["rotate"])
            .build()
    }

    fn validate(&self, ctx: &ValidationContext) -> FilterResult<()> {
        let turns = ctx.get_uint("rotation")? % 4;
        let (w, h) = if turns % 2 == 1 {
            (ctx.input.height, ctx.input.width)
        } else {
            (ctx.input.width, ctx.input.height)
        };
        if ctx.output.width != w || ctx.output.height != h || ctx.output.depth != ctx.input.depth {
            return Err(FilterError::InvalidParameter(format!(
                "rotating {} by {} quarter turns needs a {}x{} output, got {}",
                ctx.input, turns, w, h, ctx.output
            )));
        }
        Ok(())
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let src = ctx.input();
        let turns = ctx.get_uint("rotation")? % 4;
        let (w, h) = (src.width, src.height);
        let shape = if turns % 2 == 1 {
            PixelBuffer::new(h, w, src.depth, src.channels)
        } else {
            PixelBuffer::like(src)
        };
        Ok(shape.map_pixels(|x, y, z, px| {
            let (sx, sy) = match turns {
                1 => (y, h - 1 - x),
                2 => (w - 1 - x, h - 1 - y),
                3 => (w - 1 - y, x),
                _ => (x, y),
            };
            for (c, out) in px.iter_mut().enumerate() {
                *out = src.get(sx, sy, z, c as u32);
            }
        }))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

/// Interpolation used by [`Resample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interpolation {
    Nearest,
    Bilinear,
}

impl Interpolation {
    fn from_code(code: u32) -> FilterResult<Self> {
        match code {
            0x0 => Ok(Interpolation::Nearest),
            0x1 => Ok(Interpolation::Bilinear),
            other => Err(FilterError::Unsupported(format!(
                "interpolation operator {:#x} on the host device",
                other
            ))),
        }
    }
}

/// Resamples the input to the output's size.
#[derive(Debug, Clone)]
pub struct Resample;

impl Kernel for Resample {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::Resample, "Resample")
            .description("Scales the input to the output size")
            .parameter(
                ParameterDefinition::new("out_size", ParameterValue::UInt(vec![0, 0]))
                    .with_description("Target width and height; 0 uses the output image size"),
            )
            .parameter(
                ParameterDefinition::new("interp_operator", ParameterValue::uint(1))
                    .with_description("0 nearest, 1 bilinear"),
            )
            .tags(["resize", "scale"])
            .build()
    }

    fn validate(&self, ctx: &ValidationContext) -> FilterResult<()> {
        Interpolation::from_code(ctx.get_uint("interp_operator")?)?;
        let size = ctx.get_uints("out_size")?;
        let requested = (size[0], size[1]);
        if requested != (0, 0) && requested != (ctx.output.width, ctx.output.height) {
            return Err(FilterError::InvalidParameter(format!(
                "out_size {}x{} does not match output {}",
                requested.0, requested.1, ctx.output
            )));
        }
        if ctx.output.depth != ctx.input.depth {
            return Err(FilterError::InvalidParameter(
                "resample cannot change depth".to_string(),
            ));
        }
        Ok(())
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let src = ctx.input();
        let interp = Interpolation::from_code(ctx.get_uint("interp_operator")?)?;
        let out = PixelBuffer::new(ctx.output.width, ctx.output.height, src.depth, src.channels);
        let sx = src.width as f32 / out.width as f32;
        let sy = src.height as f32 / out.height as f32;
        Ok(out.map_pixels(|x, y, z, px| {
            // Pixel centers
            let fx = (x as f32 + 0.5) * sx - 0.5;
            let fy = (y as f32 + 0.5) * sy - 0.5;
            for (c, value) in px.iter_mut().enumerate() {
                let c = c as u32;
                *value = match interp {
                    Interpolation::Nearest => {
                        src.sample_clamped(fx.round() as i64, fy.round() as i64, z, c)
                    }
                    Interpolation::Bilinear => {
                        let (x0, y0) = (fx.floor(), fy.floor());
                        let (tx, ty) = (fx - x0, fy - y0);
                        let (x0, y0) = (x0 as i64, y0 as i64);
                        let top = src.sample_clamped(x0, y0, z, c) * (1.0 - tx)
                            + src.sample_clamped(x0 + 1, y0, z, c) * tx;
                        let bottom = src.sample_clamped(x0, y0 + 1, z, c) * (1.0 - tx)
                            + src.sample_clamped(x0 + 1, y0 + 1, z, c) * tx;
                        top * (1.0 - ty) + bottom * ty
                    }
                };
            }
        }))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}
