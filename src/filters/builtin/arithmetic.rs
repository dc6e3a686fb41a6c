//! Blending and per-pixel arithmetic between images.

use crate::core::context::{KernelContext, ValidationContext};
use crate::core::error::FilterResult;
use crate::core::kernel::{FilterMetadata, Kernel};
use crate::core::parameter::ParameterDefinition;
use crate::core::pixels::PixelBuffer;
use crate::core::types::ParameterValue;
use crate::filters::catalog::FilterCatalog;
use crate::filters::kind::FilterType;

/// Register arithmetic kernels.
pub fn register(catalog: &mut FilterCatalog) {
    catalog.register(|| Box::new(ScalarMult));
    catalog.register(|| Box::new(WeightedSum));
    for op in BinaryOp::TYPES {
        catalog.register(move || Box::new(BinaryOp::new(op)));
    }
}

fn operand_parameter() -> ParameterDefinition {
    ParameterDefinition::image("operand").with_description("Second operand image")
}

/// The operand with the input's channel layout.
fn operand<'a>(ctx: &'a KernelContext) -> FilterResult<std::borrow::Cow<'a, PixelBuffer>> {
    let operand = ctx.get_image("operand")?;
    Ok(if operand.channels == ctx.input().channels {
        std::borrow::Cow::Borrowed(operand)
    } else {
        std::borrow::Cow::Owned(operand.convert_channels(ctx.input().channels))
    })
}

/// Multiplies every channel by a constant.
#[derive(Debug, Clone)]
pub struct ScalarMult;

impl Kernel for ScalarMult {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::ScalarMult, "Scalar Multiply")
            .description("Multiplies every channel by a constant")
            .parameter(
                ParameterDefinition::new("factor", ParameterValue::float(1.0))
                    .with_description("Multiplier"),
            )
            .joinable()
            .build()
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let factor = ctx.get_float("factor")?;
        let mut out = ctx.input().clone();
        out.data.iter_mut().for_each(|v| *v *= factor);
        Ok(out)
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

/// `weights.x * input + weights.y * operand`
#[derive(Debug, Clone)]
pub struct WeightedSum;

impl Kernel for WeightedSum {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(FilterType::WeightedSum, "Weighted Sum")
            .description("Blends the input with an operand image")
            .parameter(
                ParameterDefinition::new("weights", ParameterValue::Float(vec![0.5, 0.5]))
                    .with_description("Weights of input and operand"),
            )
            .parameter(operand_parameter())
            .tags(["blend"])
            .joinable()
            .build()
    }

    fn validate(&self, ctx: &ValidationContext) -> FilterResult<()> {
        ctx.require_same_extent()?;
        ctx.require_image_extent("operand")
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let weights = ctx.get_floats("weights")?;
        let (wa, wb) = (weights[0], weights[1]);
        let operand = operand(ctx)?;
        let mut out = ctx.input().clone();
        for (v, o) in out.data.iter_mut().zip(&operand.data) {
            *v = wa * *v + wb * o;
        }
        Ok(out)
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

/// Per-channel binary operation between the input and an operand image.
#[derive(Debug, Clone)]
pub struct BinaryOp {
    op: FilterType,
}

impl BinaryOp {
    /// Filter types implemented by this kernel.
    pub const TYPES: [FilterType; 6] = [
        FilterType::Add,
        FilterType::Sub,
        FilterType::Mul,
        FilterType::Div,
        FilterType::Max,
        FilterType::Min,
    ];

    /// Kernel for one of [`BinaryOp::TYPES`].
    pub fn new(op: FilterType) -> Self {
        Self { op }
    }

    fn apply(&self, a: f32, b: f32) -> f32 {
        match self.op {
            FilterType::Add => a + b,
            FilterType::Sub => a - b,
            FilterType::Mul => a * b,
            FilterType::Div if b == 0.0 => 0.0,
            FilterType::Div => a / b,
            FilterType::Max => a.max(b),
            _ => a.min(b),
        }
    }
}

impl Kernel for BinaryOp {
    fn metadata(&self) -> FilterMetadata {
        let (name, description) = match self.op {
            FilterType::Add => ("Add", "input + operand"),
            FilterType::Sub => ("Subtract", "input - operand"),
            FilterType::Mul => ("Multiply", "input * operand"),
            FilterType::Div => ("Divide", "input / operand, 0 where operand is 0"),
            FilterType::Max => ("Maximum", "max(input, operand)"),
            _ => ("Minimum", "min(input, operand)"),
        };
        FilterMetadata::builder(self.op, name)
            .description(description)
            .parameter(operand_parameter())
            .tags(["binary", "arithmetic"])
            .joinable()
            .build()
    }

    fn validate(&self, ctx: &ValidationContext) -> FilterResult<()> {
        ctx.require_same_extent()?;
        ctx.require_image_extent("operand")
    }

    fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
        let operand = operand(ctx)?;
        let mut out = ctx.input().clone();
        for (v, o) in out.data.iter_mut().zip(&operand.data) {
            *v = self.apply(*v, *o);
        }
        Ok(out)
    }

    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}
