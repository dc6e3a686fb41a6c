//! Edge detection and sharpening.

use super::{convolve, is_alpha};
use crate::core::context::KernelContext;
use crate::core::error::FilterResult;
use crate::core::kernel::{FilterMetadata, Kernel};
use crate::core::parameter::ParameterDefinition;
use crate::core::pixels::PixelBuffer;
use crate::core::types::ParameterValue;
use crate::filters::catalog::FilterCatalog;
use crate::filters::kind::FilterType;

/// Register edge kernels.
pub fn register(catalog: &mut FilterCatalog) {
    catalog.register(|| Box::new(Sobel));
    catalog.register(|| Box::new(Laplace));
    catalog.register(|| Box::new(Emboss));
    catalog.register(|| Box::new(Sharpen));
}

/// Sobel gradient magnitude.
#[derive(Debug, Clone)]
pub struct Sobel;

impl Kernel for Sobel {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::Sobel, "Sobel")
            .description("Gradient magnitude from the 3x3 Sobel operators")
            .tags(["edge", "gradient"])
            .build()
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        #[rustfmt::skip]
        const SOBEL_X: [f32; 9] = [
            -1.0, 0.0, 1.0,
            -2.0, 0.0, 2.0,
            -1.0, 0.0, 1.0,
        ];
        #[rustfmt::skip]
        const SOBEL_Y: [f32; 9] = [
            -1.0, -2.0, -1.0,
            0.0, 0.0, 0.0,
            1.0, 2.0, 1.0,
        ];
        let src = ctx.input();
        let gx = convolve(src, &SOBEL_X, 3, 3);
        let gy = convolve(src, &SOBEL_Y, 3, 3);
        let mut out = gx.clone();
        for (i, v) in out.data.iter_mut().enumerate() {
            let c = (i % src.channels as usize) as u32;
            if !is_alpha(src.channels, c) {
                *v = (gx.data[i] * gx.data[i] + gy.data[i] * gy.data[i]).sqrt();
            }
        }
        Ok(out)
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

/// 4-neighbour Laplacian.
#[derive(Debug, Clone)]
pub struct Laplace;

impl Kernel for Laplace {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::Laplace, "Laplace")
            .description("Second derivative edge response")
            .tags(["edge"])
            .build()
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        #[rustfmt::skip]
        const LAPLACE: [f32; 9] = [
            0.0, -1.0, 0.0,
            -1.0, 4.0, -1.0,
            0.0, -1.0, 0.0,
        ];
        Ok(convolve(ctx.input(), &LAPLACE, 3, 3))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

/// Directional relief effect.
#[derive(Debug, Clone)]
pub struct Emboss;

impl Kernel for Emboss {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::Emboss, "Emboss")
            .description("Diagonal relief; flat regions keep their value")
            .parameter(
                ParameterDefinition::new("strength", ParameterValue::float(1.0))
                    .with_description("Relief strength"),
            )
            .tags(["edge", "relief"])
            .build()
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let s = ctx.get_float("strength")?;
        #[rustfmt::skip]
        let kernel = [
            -s, -s, 0.0,
            -s, 1.0, s,
            0.0, s, s,
        ];
        Ok(convolve(ctx.input(), &kernel, 3, 3))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

/// Laplacian sharpening.
#[derive(Debug, Clone)]
pub struct Sharpen;

impl Kernel for Sharpen {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::Sharpen, "Sharpen")
            .description("Adds the scaled Laplacian to the input")
            .parameter(
                ParameterDefinition::new("amount", ParameterValue::float(0.5))
                    .with_description("Sharpening strength, 0 leaves the image unchanged"),
            )
            .tags(["enhance", "sharpen"])
            .build()
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let a = ctx.get_float("amount")?;
        let center = 1.0 + 4.0 * a;
        #[rustfmt::skip]
        let kernel = [
            0.0, -a, 0.0,
            -a, center, -a,
            0.0, -a, 0.0,
        ];
        Ok(convolve(ctx.input(), &kernel, 3, 3))
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::builtin::test_support::run;

    fn flat(v: f32) -> PixelBuffer {
        let mut buffer = PixelBuffer::new(4, 4, 1, 4);
        buffer.data.iter_mut().for_each(|p| *p = v);
        buffer
    }

    fn step() -> PixelBuffer {
        let mut buffer = PixelBuffer::new(4, 1, 1, 1);
        buffer.data = vec![0.0, 0.0, 1.0, 1.0];
        buffer
    }

    #[test]
    fn test_flat_regions() {
        let src = flat(0.5);
        let sobel = run(&Sobel, &src, &[]);
        assert_eq!(sobel.get(1, 1, 0, 0), 0.0);
        assert_eq!(sobel.get(1, 1, 0, 3), 0.5);
        assert!(run(&Laplace, &src, &[]).get(1, 1, 0, 0).abs() < 1e-6);
        assert!((run(&Emboss, &src, &[]).get(1, 1, 0, 0) - 0.5).abs() < 1e-6);
        assert!((run(&Sharpen, &src, &[]).get(1, 1, 0, 0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_sobel_detects_step() {
        let out = run(&Sobel, &step(), &[]);
        assert!(out.get(1, 0, 0, 0) > 0.0);
        assert_eq!(out.get(0, 0, 0, 0), 0.0);
    }

    #[test]
    fn test_sharpen_zero_amount_is_identity() {
        let src = step();
        let out = run(&Sharpen, &src, &[("amount", ParameterValue::float(0.0))]);
        assert_eq!(out.data, src.data);
    }
}
