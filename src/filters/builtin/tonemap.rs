//! Tone mapping operators.
//!
//! All operators are per-pixel curves on the colour channels and leave alpha
//! untouched.

use super::color::map_color;
use crate::core::context::KernelContext;
use crate::core::error::FilterResult;
use crate::core::kernel::{FilterMetadata, Kernel};
use crate::core::parameter::{Constraint, ParameterDefinition};
use crate::core::pixels::PixelBuffer;
use crate::core::types::ParameterValue;
use crate::filters::catalog::FilterCatalog;
use crate::filters::kind::FilterType;

/// Register tone mapping kernels.
pub fn register(catalog: &mut FilterCatalog) {
    catalog.register(|| Box::new(LinearTonemap));
    catalog.register(|| Box::new(ExponentialTonemap));
    catalog.register(|| Box::new(Reinhard02Tonemap));
    catalog.register(|| Box::new(FilmicTonemap));
    catalog.register(|| Box::new(AcesTonemap));
}

fn float_param(name: &str, default: f32, description: &str) -> ParameterDefinition {
    ParameterDefinition::new(name, ParameterValue::float(default)).with_description(description)
}

/// Scales by a key value.
#[derive(Debug, Clone)]
pub struct LinearTonemap;

impl Kernel for LinearTonemap {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::LinearTonemap, "Linear Tone Map")
            .description("Multiplies colour by a key value")
            .parameter(float_param("key", 1.0, "Scale applied to colour"))
            .tags(["tonemap"])
            .joinable()
            .build()
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let key = ctx.get_float("key")?;
        Ok(map_color(ctx.input(), |v| v * key))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

/// `intensity * (1 - e^(-v * exposure))`
#[derive(Debug, Clone)]
pub struct ExponentialTonemap;

impl Kernel for ExponentialTonemap {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::ExponentialTonemap, "Exponential Tone Map")
            .description("Exponential saturation curve")
            .parameter(
                float_param("exposure", 1.0, "Input multiplier")
                    .with_constraint(Constraint::Positive),
            )
            .parameter(float_param("intensity", 1.0, "Output multiplier"))
            .tags(["tonemap"])
            .joinable()
            .build()
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let exposure = ctx.get_float("exposure")?;
        let intensity = ctx.get_float("intensity")?;
        Ok(map_color(ctx.input(), |v| {
            intensity * (1.0 - (-v.max(0.0) * exposure).exp())
        }))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

/// Reinhard 2002 with a burn-out white point.
#[derive(Debug, Clone)]
pub struct Reinhard02Tonemap;

impl Kernel for Reinhard02Tonemap {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::Reinhard02Tonemap, "Reinhard Tone Map")
            .description("Photographic tone reproduction with white burn-out")
            .parameter(float_param("pre_scale", 1.0, "Scale before the curve"))
            .parameter(float_param("post_scale", 1.0, "Scale after the curve"))
            .parameter(
                float_param("burn", 1.0, "Smallest value mapped to white")
                    .with_constraint(Constraint::Positive),
            )
            .tags(["tonemap", "reinhard"])
            .joinable()
            .build()
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let pre = ctx.get_float("pre_scale")?;
        let post = ctx.get_float("post_scale")?;
        let burn = ctx.get_float("burn")?;
        let inv_white2 = 1.0 / (burn * burn);
        Ok(map_color(ctx.input(), |v| {
            let x = v.max(0.0) * pre;
            post * x * (1.0 + x * inv_white2) / (1.0 + x)
        }))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

/// Hable's filmic curve with exposure and contrast controls.
#[derive(Debug, Clone)]
pub struct FilmicTonemap;

fn hable(x: f32) -> f32 {
    const A: f32 = 0.15;
    const B: f32 = 0.50;
    const C: f32 = 0.10;
    const D: f32 = 0.20;
    const E: f32 = 0.02;
    const F: f32 = 0.30;
    ((x * (A * x + C * B) + D * E) / (x * (A * x + B) + D * F)) - E / F
}

impl Kernel for FilmicTonemap {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::FilmicTonemap, "Filmic Tone Map")
            .description("Exposure, optional filmic shoulder and contrast around mid grey")
            .parameter(float_param("exposure", 0.0, "Exposure in stops"))
            .parameter(
                float_param("contrast", 1.0, "Contrast exponent around mid grey")
                    .with_constraint(Constraint::Positive),
            )
            .parameter(
                ParameterDefinition::new("apply_tone_map", ParameterValue::uint(1))
                    .with_description("Non-zero applies the filmic shoulder"),
            )
            .tags(["tonemap", "filmic"])
            .joinable()
            .build()
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        const MID_GREY: f32 = 0.18;
        let gain = 2f32.powf(ctx.get_float("exposure")?);
        let contrast = ctx.get_float("contrast")?;
        let shoulder = ctx.get_uint("apply_tone_map")? != 0;
        let white = hable(11.2);
        Ok(map_color(ctx.input(), |v| {
            let mut x = v.max(0.0) * gain;
            if shoulder {
                x = hable(x) / white;
            }
            MID_GREY * (x / MID_GREY).powf(contrast)
        }))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

/// Fitted ACES filmic curve.
#[derive(Debug, Clone)]
pub struct AcesTonemap;

impl Kernel for AcesTonemap {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::AcesTonemap, "ACES Tone Map")
            .description("Fitted ACES reference rendering transform")
            .parameter(
                float_param("exposure", 1.0, "Input multiplier")
                    .with_constraint(Constraint::Positive),
            )
            .tags(["tonemap", "aces"])
            .joinable()
            .build()
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let exposure = ctx.get_float("exposure")?;
        Ok(map_color(ctx.input(), |v| {
            let x = v.max(0.0) * exposure;
            ((x * (2.51 * x + 0.03)) / (x * (2.43 * x + 0.59) + 0.14)).clamp(0.0, 1.0)
        }))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::builtin::test_support::run;

    fn grey(v: f32) -> PixelBuffer {
        let mut buffer = PixelBuffer::new(1, 1, 1, 3);
        buffer.data = vec![v; 3];
        buffer
    }

    #[test]
    fn test_linear_key() {
        let out = run(&LinearTonemap, &grey(0.5), &[("key", ParameterValue::float(0.5))]);
        assert_eq!(out.data, vec![0.25; 3]);
    }

    #[test]
    fn test_curves_are_monotonic() {
        let kernels: Vec<Box<dyn Kernel>> = vec![
            Box::new(ExponentialTonemap),
            Box::new(Reinhard02Tonemap),
            Box::new(FilmicTonemap),
            Box::new(AcesTonemap),
        ];
        for kernel in &kernels {
            let low = run(kernel.as_ref(), &grey(0.2), &[]).data[0];
            let high = run(kernel.as_ref(), &grey(4.0), &[]).data[0];
            assert!(high > low, "{} not monotonic", kernel.metadata().name);
        }
    }

    #[test]
    fn test_aces_clamps() {
        let out = run(&AcesTonemap, &grey(1000.0), &[]);
        assert!(out.data.iter().all(|v| *v <= 1.0));
    }

    #[test]
    fn test_reinhard_burn_maps_to_white() {
        let out = run(&Reinhard02Tonemap, &grey(2.0), &[("burn", ParameterValue::float(2.0))]);
        assert!((out.data[0] - 1.0).abs() < 1e-5);
    }
}
