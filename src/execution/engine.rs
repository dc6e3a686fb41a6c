//! Job execution on the device worker.
//!
//! A [`Job`] is the snapshot of a command queue taken at execute time: every
//! attachment with its kernel, resolved parameters and image storage. The
//! engine runs the attachments in order. Outputs are written to staged copies
//! and only committed to image storage when the whole job succeeded; later
//! attachments that read an image an earlier one wrote see the staged bytes.

use crate::core::context::{KernelContext, ParameterTable};
use crate::core::error::{FilterError, FilterResult};
use crate::core::handle::{FilterId, ImageId, QueueId};
use crate::core::kernel::Kernel;
use crate::core::pixels::PixelBuffer;
use crate::core::types::{ComputeType, ImageDescriptor, Rect};
use crate::execution::timeline::JobReport;
use crate::filters::kind::FilterType;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Pixel storage shared between an image and the jobs that reference it.
pub type Storage = Arc<RwLock<Vec<u8>>>;

/// An image as seen by one job.
#[derive(Debug, Clone)]
pub struct ImageBinding {
    pub id: ImageId,
    pub descriptor: ImageDescriptor,
    pub storage: Storage,
}

/// One attachment, ready to run.
#[derive(Clone)]
pub struct Step {
    pub filter: FilterId,
    pub filter_type: FilterType,
    pub kernel: Box<dyn Kernel>,
    pub compute: ComputeType,
    /// Every schema parameter, defaults filled in
    pub parameters: ParameterTable,
    pub input: ImageBinding,
    pub output: ImageBinding,
    pub rect: Option<Rect>,
    /// Images bound to image and image-array parameters
    pub images: Vec<ImageBinding>,
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("filter", &self.filter)
            .field("filter_type", &self.filter_type)
            .field("compute", &self.compute)
            .field("input", &self.input.id)
            .field("output", &self.output.id)
            .field("rect", &self.rect)
            .finish()
    }
}

/// Snapshot of a queue's attachments.
#[derive(Debug, Clone)]
pub struct Job {
    pub queue: QueueId,
    pub steps: Vec<Step>,
}

/// Output bytes written by the job so far, keyed by image.
type Staging = IndexMap<ImageId, (ImageBinding, Vec<u8>)>;

fn decode(binding: &ImageBinding, staged: &Staging) -> FilterResult<PixelBuffer> {
    match staged.get(&binding.id) {
        Some((_, bytes)) => PixelBuffer::decode(bytes, &binding.descriptor),
        None => PixelBuffer::decode(&binding.storage.read(), &binding.descriptor),
    }
}

/// Failures while running are reported as internal errors, tagged with the
/// filter that failed.
fn runtime_error(step: &Step, error: FilterError) -> FilterError {
    match error {
        FilterError::Kernel { .. } | FilterError::Internal(_) => error,
        other => FilterError::Kernel {
            filter_type: step.filter_type,
            message: other.to_string(),
        },
    }
}

fn run_step(step: &Step, staged: &mut Staging) -> FilterResult<()> {
    let input = decode(&step.input, staged)?;
    let images = step
        .images
        .iter()
        .map(|binding| Ok((binding.id, decode(binding, staged)?)))
        .collect::<FilterResult<HashMap<_, _>>>()?;

    let output_desc = step.output.descriptor;
    let ctx = KernelContext::new(
        step.filter_type,
        step.compute,
        &input,
        output_desc,
        &step.parameters,
        &images,
    );
    let mut result = step.kernel.execute(&ctx)?;
    if result.channels != output_desc.num_components {
        result = result.convert_channels(output_desc.num_components);
    }
    if result.width != output_desc.width
        || result.height != output_desc.height
        || result.depth != output_desc.depth
    {
        return Err(FilterError::Kernel {
            filter_type: step.filter_type,
            message: format!(
                "kernel produced {}x{}x{} pixels for output {}",
                result.width, result.height, result.depth, output_desc
            ),
        });
    }
    result.quantize(step.compute);

    let (_, bytes) = staged
        .entry(step.output.id)
        .or_insert_with(|| (step.output.clone(), step.output.storage.read().clone()));
    result.encode_into(bytes, &output_desc, step.rect)
}

/// Run every attachment of a job and commit the outputs.
///
/// On failure nothing is committed and every image keeps its prior
/// contents.
pub fn run_job(job: &Job) -> FilterResult<JobReport> {
    let start = Instant::now();
    let mut staged = Staging::new();
    for step in &job.steps {
        log::trace!(
            "queue {}: running {} ({})",
            job.queue,
            step.filter_type,
            step.filter
        );
        run_step(step, &mut staged).map_err(|e| runtime_error(step, e))?;
    }
    for (_, (binding, bytes)) in staged {
        *binding.storage.write() = bytes;
    }
    Ok(JobReport {
        execution_time: start.elapsed(),
        attachments: job.steps.len(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::context::ValidationContext;
    use crate::core::kernel::FilterMetadata;
    use crate::core::types::{ComponentType, ParameterValue};
    use crate::filters::builtin::{BinaryOp, Convert};

    /// Kernel that always fails at run time.
    #[derive(Debug, Clone)]
    pub struct Failing;

    impl Kernel for Failing {
        fn metadata(&self) -> FilterMetadata {
            FilterMetadata::builder(FilterType::Convert, "Failing").build()
        }

        fn validate(&self, _ctx: &ValidationContext) -> FilterResult<()> {
            Ok(())
        }

        fn execute(&self, ctx: &KernelContext) -> FilterResult<PixelBuffer> {
            Err(FilterError::Kernel {
                filter_type: ctx.filter_type,
                message: "device fault".to_string(),
            })
        }

        fn clone_box(&self) -> Box<dyn Kernel> {
            Box::new(self.clone())
        }
    }

    fn binding(desc: ImageDescriptor, fill: u8) -> ImageBinding {
        let desc = desc.resolved();
        ImageBinding {
            id: ImageId::new(),
            descriptor: desc,
            storage: Arc::new(RwLock::new(vec![fill; desc.storage_size()])),
        }
    }

    fn parameters(kernel: &dyn Kernel) -> ParameterTable {
        kernel
            .metadata()
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.default_value.clone()))
            .collect()
    }

    fn step(kernel: Box<dyn Kernel>, input: &ImageBinding, output: &ImageBinding) -> Step {
        let parameters = parameters(kernel.as_ref());
        Step {
            filter: FilterId::new(),
            filter_type: kernel.metadata().filter_type,
            kernel,
            compute: ComputeType::Float32,
            parameters,
            input: input.clone(),
            output: output.clone(),
            rect: None,
            images: Vec::new(),
        }
    }

    fn identity() -> Box<dyn Kernel> {
        Box::new(Convert)
    }

    #[test]
    fn test_chained_steps_see_staged_output() {
        let desc = ImageDescriptor::new(8, 8, 1, ComponentType::Uint8);
        let a = binding(desc, 10);
        let b = binding(desc, 0);
        let c = binding(desc, 0);

        // b = a + a, then c = b + a
        let mut first = step(Box::new(BinaryOp::new(FilterType::Add)), &a, &b);
        first.images.push(a.clone());
        first
            .parameters
            .insert("operand".to_string(), Some(ParameterValue::image(a.id)));
        let mut second = step(Box::new(BinaryOp::new(FilterType::Add)), &b, &c);
        second.images.push(a.clone());
        second
            .parameters
            .insert("operand".to_string(), Some(ParameterValue::image(a.id)));

        let job = Job {
            queue: QueueId::new(),
            steps: vec![first, second],
        };
        let report = run_job(&job).unwrap();
        assert_eq!(report.attachments, 2);
        assert!(b.storage.read().iter().all(|v| *v == 20));
        assert!(c.storage.read().iter().all(|v| *v == 30));
    }

    #[test]
    fn test_failure_commits_nothing() {
        let desc = ImageDescriptor::new(8, 8, 1, ComponentType::Uint8);
        let a = binding(desc, 10);
        let b = binding(desc, 0);
        let c = binding(desc, 0);
        let job = Job {
            queue: QueueId::new(),
            steps: vec![step(identity(), &a, &b), step(Box::new(Failing), &b, &c)],
        };
        let err = run_job(&job).unwrap_err();
        assert_eq!(err.status(), crate::core::error::Status::InternalError);
        assert!(b.storage.read().iter().all(|v| *v == 0));
    }

    #[test]
    fn test_rect_limits_writes() {
        let desc = ImageDescriptor::new(16, 16, 1, ComponentType::Uint8);
        let input = binding(desc, 200);
        let output = binding(desc, 7);
        let mut only = step(identity(), &input, &output);
        only.rect = Some(Rect::new(8, 8, 8, 8));
        run_job(&Job {
            queue: QueueId::new(),
            steps: vec![only],
        })
        .unwrap();

        let bytes = output.storage.read();
        assert_eq!(bytes[0], 7);
        assert_eq!(bytes[8 * 16 + 8], 200);
        assert_eq!(bytes[7 * 16 + 15], 7);
    }

    #[test]
    fn test_in_place_and_channel_conversion() {
        let rgb = binding(ImageDescriptor::new(8, 8, 3, ComponentType::Uint8), 100);
        let grey = binding(ImageDescriptor::new(8, 8, 1, ComponentType::Float32), 0);
        let job = Job {
            queue: QueueId::new(),
            steps: vec![step(identity(), &rgb, &rgb), step(identity(), &rgb, &grey)],
        };
        run_job(&job).unwrap();
        assert!(rgb.storage.read().iter().all(|v| *v == 100));
        let pixels = PixelBuffer::decode(&grey.storage.read(), &grey.descriptor).unwrap();
        assert!(pixels.data.iter().all(|v| (v - 100.0 / 255.0).abs() < 1e-4));
    }
}
