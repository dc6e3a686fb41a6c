//! Blur and classic denoise kernels.

use super::is_alpha;
use crate::core::context::{KernelContext, ValidationContext};
use crate::core::error::{FilterError, FilterResult};
use crate::core::kernel::{FilterMetadata, Kernel};
use crate::core::parameter::{Constraint, ParameterDefinition};
use crate::core::pixels::PixelBuffer;
use crate::core::types::{ParameterType, ParameterValue};
use crate::filters::catalog::FilterCatalog;
use crate::filters::kind::FilterType;

/// Register blur kernels.
pub fn register(catalog: &mut FilterCatalog) {
    catalog.register(|| Box::new(GaussianBlur));
    catalog.register(|| Box::new(MedianDenoise));
    catalog.register(|| Box::new(BilateralDenoise));
}

/// Largest supported neighborhood radius.
const MAX_RADIUS: f64 = 64.0;

/// Separable gaussian blur.
#[derive(Debug, Clone)]
pub struct GaussianBlur;

/// Normalized 1D gaussian weights for offsets `-radius..=radius`.
fn gaussian_weights(radius: u32, sigma: f32) -> Vec<f32> {
    let r = radius as i64;
    let two_sigma2 = 2.0 * sigma * sigma;
    let mut weights: Vec<f32> = (-r..=r)
        .map(|d| (-((d * d) as f32) / two_sigma2).exp())
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.iter_mut().for_each(|w| *w /= sum);
    weights
}

/// One separable pass, horizontal or vertical.
fn blur_pass(src: &PixelBuffer, weights: &[f32], horizontal: bool) -> PixelBuffer {
    let r = (weights.len() / 2) as i64;
    src.map_pixels(|x, y, z, px| {
        for (c, out) in px.iter_mut().enumerate() {
            let c = c as u32;
            let mut sum = 0.0;
            for (i, w) in weights.iter().enumerate() {
                let d = i as i64 - r;
                let (sx, sy) = if horizontal {
                    (x as i64 + d, y as i64)
                } else {
                    (x as i64, y as i64 + d)
                };
                sum += w * src.sample_clamped(sx, sy, z, c);
            }
            *out = sum;
        }
    })
}

impl Kernel for GaussianBlur {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::GaussianBlur, "Gaussian Blur")
            .description("Separable gaussian blur over a square neighborhood")
            .parameter(
                ParameterDefinition::new("radius", ParameterValue::uint(1))
                    .with_description("Neighborhood radius in pixels")
                    .with_range(0.0, MAX_RADIUS),
            )
            .parameter(
                ParameterDefinition::new("sigma", ParameterValue::float(1.0))
                    .with_description("Standard deviation of the gaussian")
                    .with_constraint(Constraint::Positive),
            )
            .tags(["blur", "smooth"])
            .build()
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let radius = ctx.get_uint("radius")?;
        let sigma = ctx.get_float("sigma")?;
        let weights = gaussian_weights(radius, sigma);
        let horizontal = blur_pass(ctx.input(), &weights, true);
        Ok(blur_pass(&horizontal, &weights, false))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

/// Per-channel median over a square neighborhood.
#[derive(Debug, Clone)]
pub struct MedianDenoise;

impl Kernel for MedianDenoise {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::MedianDenoise, "Median Denoise")
            .description("Replaces each channel with the median of its neighborhood")
            .parameter(
                ParameterDefinition::new("radius", ParameterValue::uint(1))
                    .with_description("Neighborhood radius in pixels")
                    .with_range(0.0, 16.0),
            )
            .tags(["denoise", "median"])
            .build()
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let src = ctx.input();
        let r = ctx.get_uint("radius")? as i64;
        let size = ((2 * r + 1) * (2 * r + 1)) as usize;
        Ok(src.map_pixels(|x, y, z, px| {
            let mut neighborhood = Vec::with_capacity(size);
            for (c, out) in px.iter_mut().enumerate() {
                let c = c as u32;
                neighborhood.clear();
                for ky in -r..=r {
                    for kx in -r..=r {
                        neighborhood.push(src.sample_clamped(x as i64 + kx, y as i64 + ky, z, c));
                    }
                }
                neighborhood.sort_by(|a, b| a.total_cmp(b));
                *out = neighborhood[size / 2];
            }
        }))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

/// Cross bilateral filter guided by feature images.
///
/// Each image in `inputs` contributes a range term weighted by the matching
/// entry of `sigmas`. With no guide images the input itself guides the
/// filter using the first sigma.
#[derive(Debug, Clone)]
pub struct BilateralDenoise;

impl Kernel for BilateralDenoise {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::BilateralDenoise, "Bilateral Denoise")
            .description("Edge-preserving blur weighted by feature similarity")
            .parameter(
                ParameterDefinition::new("radius", ParameterValue::uint(1))
                    .with_description("Neighborhood radius in pixels")
                    .with_range(0.0, MAX_RADIUS),
            )
            .parameter(
                ParameterDefinition::new("sigmas", ParameterValue::FloatArray(vec![0.1]))
                    .with_description("Range sigma per guide image")
                    .with_constraint(Constraint::NotEmpty)
                    .with_constraint(Constraint::Positive),
            )
            .parameter(
                ParameterDefinition::declare(
                    "inputs",
                    ParameterType::ImageArray,
                    Some(ParameterValue::ImageArray(Vec::new())),
                )
                .with_description("Guide images (colour, normals, depth, ...)"),
            )
            .tags(["denoise", "bilateral", "edge-preserving"])
            .build()
    }

    fn validate(&self, ctx: &ValidationContext) -> FilterResult<()> {
        ctx.require_same_extent()?;
        let guides = ctx.image_descriptors("inputs")?;
        let sigmas = ctx.get_parameter("sigmas")?.len();
        if !guides.is_empty() && guides.len() != sigmas {
            return Err(FilterError::InvalidParameter(format!(
                "bilateral denoise has {} guide images but {} sigmas",
                guides.len(),
                sigmas
            )));
        }
        if let Some(guide) = guides.iter().find(|g| !g.same_extent(&ctx.output)) {
            return Err(FilterError::InvalidParameter(format!(
                "guide image {} differs in size from output {}",
                guide, ctx.output
            )));
        }
        Ok(())
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let src = ctx.input();
        let r = ctx.get_uint("radius")? as i64;
        let sigmas = ctx.get_floats("sigmas")?;
        let mut guides = ctx.get_images("inputs")?;
        if guides.is_empty() {
            guides.push(src);
        }
        let coeffs: Vec<f32> = sigmas.iter().map(|s| -0.5 / (s * s)).collect();

        Ok(src.map_pixels(|x, y, z, px| {
            let mut sum = vec![0.0f32; px.len()];
            let mut weight_sum = 0.0f32;
            for ky in -r..=r {
                for kx in -r..=r {
                    let (sx, sy) = (x as i64 + kx, y as i64 + ky);
                    let mut exponent = 0.0;
                    for (guide, coeff) in guides.iter().zip(&coeffs) {
                        let mut dist = 0.0;
                        for c in 0..guide.channels {
                            let d = guide.get(x, y, z, c) - guide.sample_clamped(sx, sy, z, c);
                            dist += d * d;
                        }
                        exponent += coeff * dist;
                    }
                    let weight = exponent.exp();
                    for (c, acc) in sum.iter_mut().enumerate() {
                        *acc += weight * src.sample_clamped(sx, sy, z, c as u32);
                    }
                    weight_sum += weight;
                }
            }
            for (c, out) in px.iter_mut().enumerate() {
                *out = if is_alpha(src.channels, c as u32) || weight_sum <= 0.0 {
                    src.get(x, y, z, c as u32)
                } else {
                    sum[c] / weight_sum
                };
            }
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

    fn impulse() -> PixelBuffer {
        let mut buffer = PixelBuffer::new(9, 9, 1, 1);
        buffer.set(4, 4, 0, 0, 1.0);
        buffer
    }

    #[test]
    fn test_gaussian_weights_normalized() {
        let weights = gaussian_weights(3, 2.0);
        assert_eq!(weights.len(), 7);
        assert!((weights.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(weights[3] > weights[0]);
    }

    #[test]
    fn test_gaussian_blur_spreads_energy() {
        let out = run(&GaussianBlur, &impulse(), &[("radius", ParameterValue::uint(2))]);
        assert!(out.get(4, 4, 0, 0) < 1.0);
        assert!(out.get(5, 4, 0, 0) > 0.0);
        assert_eq!(out.get(0, 0, 0, 0), 0.0);
        assert!((out.data.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_median_removes_impulse() {
        let out = run(&MedianDenoise, &impulse(), &[]);
        assert!(out.data.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_bilateral_preserves_flat_image() {
        let mut flat = PixelBuffer::new(4, 4, 1, 3);
        flat.data.iter_mut().for_each(|v| *v = 0.5);
        let out = run(&BilateralDenoise, &flat, &[]);
        assert!(out.data.iter().all(|v| (v - 0.5).abs() < 1e-5));
    }
}
