//! Per-pixel colour adjustments and format conversion.

use super::is_alpha;
use crate::core::context::{KernelContext, ValidationContext};
use crate::core::error::{FilterError, FilterResult};
use crate::core::kernel::{FilterMetadata, Kernel};
use crate::core::parameter::{Constraint, ParameterDefinition};
use crate::core::pixels::PixelBuffer;
use crate::core::types::ParameterValue;
use crate::filters::catalog::FilterCatalog;
use crate::filters::kind::FilterType;

/// Register colour kernels.
pub fn register(catalog: &mut FilterCatalog) {
    catalog.register(|| Box::new(GammaCorrection));
    catalog.register(|| Box::new(Normalization));
    catalog.register(|| Box::new(RemapRange));
    catalog.register(|| Box::new(Posterize));
    catalog.register(|| Box::new(BgraToRgba));
    catalog.register(|| Box::new(Convert));
}

/// Apply `f` to every colour channel, copying alpha through.
pub(crate) fn map_color<F>(src: &PixelBuffer, f: F) -> PixelBuffer
where
    F: Fn(f32) -> f32 + Sync,
{
    src.map_pixels(|x, y, z, px| {
        for (c, out) in px.iter_mut().enumerate() {
            let c = c as u32;
            let v = src.get(x, y, z, c);
            *out = if is_alpha(src.channels, c) { v } else { f(v) };
        }
    })
}

/// Gamma correction: `v^(1/gamma)`.
#[derive(Debug, Clone)]
pub struct GammaCorrection;

impl Kernel for GammaCorrection {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::GammaCorrection, "Gamma Correction")
            .description("Raises colour channels to the power 1/gamma")
            .parameter(
                ParameterDefinition::new("gamma", ParameterValue::float(2.2))
                    .with_description("Display gamma")
                    .with_constraint(Constraint::Positive),
            )
            .tags(["gamma", "color"])
            .joinable()
            .build()
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let inv = 1.0 / ctx.get_float("gamma")?;
        Ok(map_color(ctx.input(), |v| v.max(0.0).powf(inv)))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

/// Linear normalization: `v * scale + offset`.
#[derive(Debug, Clone)]
pub struct Normalization;

impl Kernel for Normalization {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::Normalization, "Normalization")
            .description("Scales and offsets colour channels")
            .parameter(
                ParameterDefinition::new("scale", ParameterValue::float(1.0))
                    .with_description("Multiplier applied first"),
            )
            .parameter(
                ParameterDefinition::new("offset", ParameterValue::float(0.0))
                    .with_description("Value added after scaling"),
            )
            .joinable()
            .build()
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let scale = ctx.get_float("scale")?;
        let offset = ctx.get_float("offset")?;
        Ok(map_color(ctx.input(), |v| v * scale + offset))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

/// Maps `[src_lo, src_hi]` linearly onto `[dst_lo, dst_hi]`.
#[derive(Debug, Clone)]
pub struct RemapRange;

impl Kernel for RemapRange {
    fn metadata(&self) -> FilterMetadata {
        let bound = |name: &str, default: f32, description: &str| {
            ParameterDefinition::new(name, ParameterValue::float(default))
                .with_description(description)
        };
        FilterMetadata::builder(FilterType::RemapRange, "Remap Range")
            .description("Linearly remaps colour values from one range to another")
            .parameter(bound("src_lo", 0.0, "Lower bound of the source range"))
            .parameter(bound("src_hi", 1.0, "Upper bound of the source range"))
            .parameter(bound("dst_lo", 0.0, "Lower bound of the target range"))
            .parameter(bound("dst_hi", 1.0, "Upper bound of the target range"))
            .joinable()
            .build()
    }

    fn validate(&self, ctx: &ValidationContext) -> FilterResult<()> {
        ctx.require_same_extent()?;
        if ctx.get_float("src_lo")? == ctx.get_float("src_hi")? {
            return Err(FilterError::InvalidParameter(
                "remap range source interval is empty".to_string(),
            ));
        }
        Ok(())
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let (src_lo, src_hi) = (ctx.get_float("src_lo")?, ctx.get_float("src_hi")?);
        let (dst_lo, dst_hi) = (ctx.get_float("dst_lo")?, ctx.get_float("dst_hi")?);
        let scale = (dst_hi - dst_lo) / (src_hi - src_lo);
        Ok(map_color(ctx.input(), |v| dst_lo + (v - src_lo) * scale))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

/// Quantizes colour channels to a number of levels.
#[derive(Debug, Clone)]
pub struct Posterize;

impl Kernel for Posterize {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::Posterize, "Posterize")
            .description("Reduces each colour channel to a fixed number of levels")
            .parameter(
                ParameterDefinition::new("levels", ParameterValue::uint(8))
                    .with_description("Number of levels per channel")
                    .with_range(2.0, 256.0),
            )
            .joinable()
            .build()
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let steps = (ctx.get_uint("levels")? - 1) as f32;
        Ok(map_color(ctx.input(), |v| {
            (v.clamp(0.0, 1.0) * steps).round() / steps
        }))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

/// Swaps the first and third channel.
#[derive(Debug, Clone)]
pub struct BgraToRgba;

impl Kernel for BgraToRgba {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::BgraToRgba, "BGRA to RGBA")
            .description("Swaps blue and red channels")
            .joinable()
            .build()
    }

    fn validate(&self, ctx: &ValidationContext) -> FilterResult<()> {
        ctx.require_same_extent()?;
        if ctx.input.num_components < 3 {
            return Err(FilterError::InvalidParameter(format!(
                "BGRA to RGBA needs a colour input, got {} components",
                ctx.input.num_components
            )));
        }
        Ok(())
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let src = ctx.input();
        Ok(src.map_pixels(|x, y, z, px| {
            for (c, out) in px.iter_mut().enumerate() {
                let from = match c {
                    0 => 2,
                    2 => 0,
                    other => other as u32,
                };
                *out = src.get(x, y, z, from);
            }
        }))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

/// Copies the input; channel count and storage format follow the output.
#[derive(Debug, Clone)]
pub struct Convert;

impl Kernel for Convert {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::Convert, "Convert")
            .description("Converts between component types and channel layouts")
            .joinable()
            .build()
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        Ok(ctx.input().clone())
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::builtin::test_support::run;

    fn rgba(values: [f32; 4]) -> PixelBuffer {
        let mut buffer = PixelBuffer::new(1, 1, 1, 4);
        buffer.data = values.to_vec();
        buffer
    }

    #[test]
    fn test_gamma_keeps_alpha() {
        let out = run(
            &GammaCorrection,
            &rgba([0.25, 0.25, 0.25, 0.25]),
            &[("gamma", ParameterValue::float(2.0))],
        );
        assert!((out.data[0] - 0.5).abs() < 1e-6);
        assert_eq!(out.data[3], 0.25);
    }

    #[test]
    fn test_remap_range() {
        let out = run(
            &RemapRange,
            &rgba([0.5, 0.0, 1.0, 1.0]),
            &[
                ("dst_lo", ParameterValue::float(-1.0)),
                ("dst_hi", ParameterValue::float(1.0)),
            ],
        );
        assert_eq!(&out.data[..3], &[0.0, -1.0, 1.0]);
    }

    #[test]
    fn test_posterize_levels() {
        let out = run(
            &Posterize,
            &rgba([0.4, 0.6, 0.1, 1.0]),
            &[("levels", ParameterValue::uint(2))],
        );
        assert_eq!(&out.data[..3], &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_bgra_swap() {
        let out = run(&BgraToRgba, &rgba([0.1, 0.2, 0.3, 0.4]), &[]);
        assert_eq!(out.data, vec![0.3, 0.2, 0.1, 0.4]);
    }

    #[test]
    fn test_normalization() {
        let out = run(
            &Normalization,
            &rgba([0.5, 0.5, 0.5, 0.5]),
            &[
                ("scale", ParameterValue::float(2.0)),
                ("offset", ParameterValue::float(0.25)),
            ],
        );
        assert_eq!(out.data, vec![1.25, 1.25, 1.25, 0.5]);
    }
}
