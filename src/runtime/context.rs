//! The context: owner of every object and entry point of every operation.

use crate::config::EngineConfig;
use crate::core::context::ValidationContext;
use crate::core::error::{ErrorSlot, FilterError, FilterResult, Status};
use crate::core::handle::{ContextId, FilterId, ImageId, Object, QueueId};
use crate::core::info::{
    decode_descriptor, decode_string, decode_u32, decode_u64, write_info, ContextInfo,
    DeviceInfo, FilterInfo, ImageInfo, InfoValue, ParameterInfo,
};
use crate::core::types::{
    BackendApi, ComputeType, ImageDescriptor, MapAccess, ParameterType, ParameterValue,
    PerformanceStatistic, Rect,
};
use crate::execution::cache::{ProgramCache, DEFAULT_CAPACITY};
use crate::execution::device::{Device, DeviceDescription, HostDevice};
use crate::execution::engine::{ImageBinding, Job, Step};
use crate::execution::timeline::Submission;
use crate::filters::catalog::FilterCatalog;
use crate::filters::kind::FilterType;
use crate::runtime::filter::Filter;
use crate::runtime::image::{Image, MappedImage};
use crate::runtime::queue::{Attachment, CommandQueue};
use indexmap::IndexMap;
use semver::Version;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Called once after a queue's work has been handed to the device.
pub type SubmitCallback<'a> = Box<dyn FnOnce(&Submission) + 'a>;

/// Split a packed API version into its semantic version.
fn unpack_api_version(version: u64) -> Version {
    Version::new(
        (version >> 56) & 0xff,
        (version >> 48) & 0xff,
        (version >> 32) & 0xffff,
    )
}

/// Accept versions with the library's major number that are not newer than
/// the library.
pub fn check_api_version(requested: u64) -> FilterResult<()> {
    let library = unpack_api_version(crate::API_VERSION);
    let wanted = unpack_api_version(requested);
    if wanted.major != library.major || wanted > library {
        return Err(FilterError::InvalidApiVersion {
            requested: wanted.to_string(),
            supported: library.to_string(),
        });
    }
    Ok(())
}

/// Options for opening a context.
#[derive(Clone)]
pub struct ContextOptions {
    pub api_version: u64,
    pub backend: BackendApi,
    pub device_id: u32,
    pub cache_dir: Option<PathBuf>,
    pub kernel_source_dir: Option<PathBuf>,
    pub program_cache_capacity: usize,
    pub catalog: Arc<FilterCatalog>,
}

impl ContextOptions {
    /// Options for the host device under `backend` with the built-in catalog.
    pub fn new(backend: BackendApi) -> Self {
        Self {
            api_version: crate::API_VERSION,
            backend,
            device_id: 0,
            cache_dir: None,
            kernel_source_dir: None,
            program_cache_capacity: DEFAULT_CAPACITY,
            catalog: FilterCatalog::shared(),
        }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Use a custom catalog instead of the built-in one.
    pub fn with_catalog(mut self, catalog: Arc<FilterCatalog>) -> Self {
        self.catalog = catalog;
        self
    }
}

/// Owner of images, filters and command queues bound to one device.
///
/// Every fallible call records its failure in the context, readable through
/// [`Context::last_error_message`] until the next failure or
/// [`Context::clear_last_error`].
pub struct Context {
    id: ContextId,
    device: Box<dyn Device>,
    catalog: Arc<FilterCatalog>,
    programs: ProgramCache,
    images: IndexMap<ImageId, Image>,
    filters: IndexMap<FilterId, Filter>,
    queues: IndexMap<QueueId, CommandQueue>,
    cache_dir: Option<PathBuf>,
    source_dir: Option<PathBuf>,
    last_error: ErrorSlot,
}

fn create_dir(dir: &Path) -> FilterResult<()> {
    fs::create_dir_all(dir).map_err(|e| FilterError::io(dir.display(), e))
}

impl Context {
    /// Open a context on a device.
    ///
    /// `api_version` is the packed version the caller was built against,
    /// normally [`API_VERSION`](crate::API_VERSION). The cache directory is
    /// created when missing.
    pub fn new(
        api_version: u64,
        backend: BackendApi,
        device_id: u32,
        cache_dir: Option<&Path>,
    ) -> FilterResult<Self> {
        let mut options = ContextOptions::new(backend);
        options.api_version = api_version;
        options.device_id = device_id;
        options.cache_dir = cache_dir.map(Path::to_path_buf);
        Self::with_options(options)
    }

    /// Open a context from a configuration.
    pub fn from_config(config: &EngineConfig) -> FilterResult<Self> {
        let mut options = ContextOptions::new(config.backend);
        options.device_id = config.device_id;
        options.cache_dir = config.cache_dir.clone();
        options.kernel_source_dir = config.kernel_source_dir.clone();
        options.program_cache_capacity = config.program_cache_capacity;
        Self::with_options(options)
    }

    /// Open a context with explicit options.
    pub fn with_options(options: ContextOptions) -> FilterResult<Self> {
        check_api_version(options.api_version)?;
        if let Some(dir) = &options.cache_dir {
            create_dir(dir)?;
        }
        let device = HostDevice::open(options.backend, options.device_id)?;
        let programs = ProgramCache::new(
            options.program_cache_capacity,
            options.cache_dir.clone(),
            device.description(),
        );
        let id = ContextId::new();
        log::info!("context {} opened on {}", id, device.description().name);
        Ok(Self {
            id,
            device: Box::new(device),
            catalog: options.catalog,
            programs,
            images: IndexMap::new(),
            filters: IndexMap::new(),
            queues: IndexMap::new(),
            cache_dir: options.cache_dir,
            source_dir: options.kernel_source_dir,
            last_error: ErrorSlot::new(),
        })
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Device this context dispatches to.
    pub fn device(&self) -> &DeviceDescription {
        self.device.description()
    }

    /// Catalog filters are created from.
    pub fn catalog(&self) -> &FilterCatalog {
        &self.catalog
    }

    /// Prepared-program cache statistics.
    pub fn program_cache(&self) -> &ProgramCache {
        &self.programs
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    fn track<T>(&mut self, result: FilterResult<T>) -> FilterResult<T> {
        if let Err(e) = &result {
            if e.is_validation() {
                log::debug!("context {}: {}", self.id, e);
            } else {
                log::error!("context {}: {}", self.id, e);
            }
            self.last_error.record(e);
        }
        result
    }

    /// Message of the most recent failure.
    pub fn last_error_message(&self) -> Option<&str> {
        self.last_error.message()
    }

    /// Status of the most recent failure.
    pub fn last_error_status(&self) -> Option<Status> {
        self.last_error.status()
    }

    pub fn clear_last_error(&mut self) {
        self.last_error.clear();
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    fn image(&self, id: ImageId) -> FilterResult<&Image> {
        self.images
            .get(&id)
            .ok_or_else(|| FilterError::invalid_image(id, "no such image in this context"))
    }

    fn filter(&self, id: FilterId) -> FilterResult<&Filter> {
        self.filters.get(&id).ok_or(FilterError::InvalidFilter(id))
    }

    fn queue(&self, id: QueueId) -> FilterResult<&CommandQueue> {
        self.queues.get(&id).ok_or(FilterError::InvalidQueue(id))
    }

    /// Live image handles.
    pub fn images(&self) -> impl Iterator<Item = ImageId> + '_ {
        self.images.keys().copied()
    }

    /// Live filter handles.
    pub fn filters(&self) -> impl Iterator<Item = FilterId> + '_ {
        self.filters.keys().copied()
    }

    /// Live command queue handles.
    pub fn queues(&self) -> impl Iterator<Item = QueueId> + '_ {
        self.queues.keys().copied()
    }

    /// Inspect a filter.
    pub fn get_filter(&self, id: FilterId) -> Option<&Filter> {
        self.filters.get(&id)
    }

    /// Inspect a command queue.
    pub fn get_queue(&self, id: QueueId) -> Option<&CommandQueue> {
        self.queues.get(&id)
    }

    // ------------------------------------------------------------------
    // Object creation and deletion
    // ------------------------------------------------------------------

    /// Create an image, optionally initialized from `data`.
    ///
    /// `data` must hold at least the descriptor's storage size.
    pub fn create_image(
        &mut self,
        descriptor: &ImageDescriptor,
        data: Option<&[u8]>,
    ) -> FilterResult<ImageId> {
        let result = Image::new(ImageId::new(), descriptor, data).map(|image| {
            let id = image.id();
            log::debug!("created image {} {}", id, image.descriptor());
            self.images.insert(id, image);
            id
        });
        self.track(result)
    }

    /// Create a filter of a catalogued type.
    pub fn create_filter(&mut self, filter_type: FilterType) -> FilterResult<FilterId> {
        let result = self.catalog.entry(filter_type).map(|entry| {
            let filter = Filter::new(FilterId::new(), entry);
            let id = filter.id();
            log::debug!("created filter {} ({})", id, filter_type);
            self.filters.insert(id, filter);
            id
        });
        self.track(result)
    }

    /// Create an empty command queue.
    pub fn create_command_queue(&mut self) -> QueueId {
        let id = QueueId::new();
        self.queues.insert(id, CommandQueue::new(id));
        id
    }

    /// Delete any object owned by this context.
    ///
    /// Queues referencing a deleted image or filter fail their next execute.
    /// Deleting a queue waits for its submitted work.
    pub fn delete_object(&mut self, object: impl Into<Object>) -> FilterResult<()> {
        let object = object.into();
        let removed = match object {
            Object::Image(id) => self.images.shift_remove(&id).is_some(),
            Object::Filter(id) => self.filters.shift_remove(&id).is_some(),
            Object::Queue(id) => match self.queues.shift_remove(&id) {
                Some(queue) => {
                    if let Err(e) = queue.timeline().synchronize() {
                        log::debug!("queue {} deleted after a failed job: {}", id, e);
                    }
                    true
                }
                None => false,
            },
        };
        let result = if removed {
            Ok(())
        } else {
            Err(FilterError::InvalidParameter(format!(
                "{} is not a live {} of this context",
                match object {
                    Object::Image(id) => id.to_string(),
                    Object::Filter(id) => id.to_string(),
                    Object::Queue(id) => id.to_string(),
                },
                object.kind_name()
            )))
        };
        self.track(result)
    }

    // ------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------

    /// Set a filter parameter.
    ///
    /// Checks in order: the filter handle, the parameter name, the value
    /// type, the element count of fixed-size arrays, and that bound images
    /// live in this context. Nothing changes on failure.
    pub fn set_parameter(
        &mut self,
        filter: FilterId,
        name: &str,
        value: ParameterValue,
    ) -> FilterResult<()> {
        let images = &self.images;
        let result = match self.filters.get_mut(&filter) {
            Some(f) => f.set_parameter(name, value, |id| images.contains_key(&id)),
            None => Err(FilterError::InvalidFilter(filter)),
        };
        self.track(result)
    }

    pub fn set_parameter_1u(&mut self, filter: FilterId, name: &str, x: u32) -> FilterResult<()> {
        self.set_parameter(filter, name, ParameterValue::uint(x))
    }

    pub fn set_parameter_2u(
        &mut self,
        filter: FilterId,
        name: &str,
        x: u32,
        y: u32,
    ) -> FilterResult<()> {
        self.set_parameter(filter, name, ParameterValue::UInt(vec![x, y]))
    }

    pub fn set_parameter_4u(
        &mut self,
        filter: FilterId,
        name: &str,
        v: [u32; 4],
    ) -> FilterResult<()> {
        self.set_parameter(filter, name, ParameterValue::UInt(v.to_vec()))
    }

    pub fn set_parameter_1i(&mut self, filter: FilterId, name: &str, x: i32) -> FilterResult<()> {
        self.set_parameter(filter, name, ParameterValue::int(x))
    }

    pub fn set_parameter_1f(&mut self, filter: FilterId, name: &str, x: f32) -> FilterResult<()> {
        self.set_parameter(filter, name, ParameterValue::float(x))
    }

    pub fn set_parameter_2f(
        &mut self,
        filter: FilterId,
        name: &str,
        x: f32,
        y: f32,
    ) -> FilterResult<()> {
        self.set_parameter(filter, name, ParameterValue::Float(vec![x, y]))
    }

    pub fn set_parameter_3f(
        &mut self,
        filter: FilterId,
        name: &str,
        v: [f32; 3],
    ) -> FilterResult<()> {
        self.set_parameter(filter, name, ParameterValue::Float(v.to_vec()))
    }

    pub fn set_parameter_4f(
        &mut self,
        filter: FilterId,
        name: &str,
        v: [f32; 4],
    ) -> FilterResult<()> {
        self.set_parameter(filter, name, ParameterValue::Float(v.to_vec()))
    }

    /// Set a 4x4 matrix parameter, row major.
    pub fn set_parameter_16f(
        &mut self,
        filter: FilterId,
        name: &str,
        m: [f32; 16],
    ) -> FilterResult<()> {
        self.set_parameter(filter, name, ParameterValue::Float(m.to_vec()))
    }

    pub fn set_parameter_float_array(
        &mut self,
        filter: FilterId,
        name: &str,
        values: &[f32],
    ) -> FilterResult<()> {
        self.set_parameter(filter, name, ParameterValue::FloatArray(values.to_vec()))
    }

    pub fn set_parameter_string(
        &mut self,
        filter: FilterId,
        name: &str,
        value: &str,
    ) -> FilterResult<()> {
        self.set_parameter(filter, name, ParameterValue::String(value.to_string()))
    }

    pub fn set_parameter_image(
        &mut self,
        filter: FilterId,
        name: &str,
        image: ImageId,
    ) -> FilterResult<()> {
        self.set_parameter(filter, name, ParameterValue::image(image))
    }

    pub fn set_parameter_image_array(
        &mut self,
        filter: FilterId,
        name: &str,
        images: &[ImageId],
    ) -> FilterResult<()> {
        self.set_parameter(filter, name, ParameterValue::ImageArray(images.to_vec()))
    }

    /// Reset an image or image-array parameter to unset.
    pub fn clear_parameter_image(&mut self, filter: FilterId, name: &str) -> FilterResult<()> {
        let result = match self.filters.get_mut(&filter) {
            Some(f) => f.clear_image(name),
            None => Err(FilterError::InvalidFilter(filter)),
        };
        self.track(result)
    }

    /// Choose the precision a filter computes in.
    pub fn set_compute_type(&mut self, filter: FilterId, compute: ComputeType) -> FilterResult<()> {
        let result = match self.filters.get_mut(&filter) {
            Some(f) => {
                f.set_compute_type(compute);
                Ok(())
            }
            None => Err(FilterError::InvalidFilter(filter)),
        };
        self.track(result)
    }

    // ------------------------------------------------------------------
    // Command queues
    // ------------------------------------------------------------------

    /// Attach a filter to a queue, or replace its attachment in place.
    pub fn attach(
        &mut self,
        queue: QueueId,
        filter: FilterId,
        input: ImageId,
        output: ImageId,
        rect: Option<Rect>,
    ) -> FilterResult<()> {
        let result = self.attach_inner(queue, filter, input, output, rect);
        self.track(result)
    }

    fn attach_inner(
        &mut self,
        queue: QueueId,
        filter: FilterId,
        input: ImageId,
        output: ImageId,
        rect: Option<Rect>,
    ) -> FilterResult<()> {
        self.queue(queue)?;
        self.filter(filter)?;
        self.image(input)?;
        self.image(output)?;
        let attachment = Attachment {
            filter,
            input,
            output,
            rect,
        };
        self.queues
            .get_mut(&queue)
            .ok_or(FilterError::InvalidQueue(queue))?
            .attach(attachment)
    }

    /// Remove a filter from a queue.
    pub fn detach(&mut self, queue: QueueId, filter: FilterId) -> FilterResult<()> {
        let result = match self.queues.get_mut(&queue) {
            Some(q) => q.detach(filter).map(|_| ()),
            None => Err(FilterError::InvalidQueue(queue)),
        };
        self.track(result)
    }

    /// Submit every attachment of a queue as one job.
    ///
    /// Attachments are validated synchronously; any failure here leaves all
    /// images untouched. Kernel failures while running surface from
    /// [`Context::synchronize`] or [`Submission::wait`]. `on_submitted` runs
    /// once the job is handed to the device, which does not mean it is
    /// complete. With measurements requested in `statistics`, this call
    /// waits for completion and fills in the timings.
    pub fn execute(
        &mut self,
        queue: QueueId,
        on_submitted: Option<SubmitCallback<'_>>,
        statistics: Option<&mut PerformanceStatistic>,
    ) -> FilterResult<Submission> {
        let result = self.execute_inner(queue, on_submitted, statistics);
        self.track(result)
    }

    fn image_binding(&self, id: ImageId) -> FilterResult<ImageBinding> {
        let image = self.image(id)?;
        image.require_unmapped()?;
        Ok(image.binding())
    }

    fn build_step(&mut self, attachment: &Attachment) -> FilterResult<(Step, Duration)> {
        let filter = self.filter(attachment.filter)?;
        let filter_type = filter.filter_type();
        let compute = filter.compute_type();
        let parameters = filter.resolved_parameters()?;
        let image_refs = filter.image_refs();

        let input = self.image_binding(attachment.input)?;
        let output = self.image_binding(attachment.output)?;
        if let Some(rect) = attachment.rect {
            if !rect.fits_within(output.descriptor.width, output.descriptor.height) {
                return Err(FilterError::InvalidParameter(format!(
                    "rect {} exceeds output {}",
                    rect, output.descriptor
                )));
            }
        }
        let mut images = Vec::with_capacity(image_refs.len());
        for id in image_refs {
            images.push(self.image_binding(id)?);
        }

        let prepared = self.programs.prepare(&self.catalog, filter_type, compute)?;
        let descriptors: HashMap<ImageId, ImageDescriptor> =
            images.iter().map(|b| (b.id, b.descriptor)).collect();
        let validation = ValidationContext::new(
            attachment.filter,
            filter_type,
            input.descriptor,
            output.descriptor,
            &parameters,
            &descriptors,
        );
        prepared.kernel.validate(&validation)?;

        Ok((
            Step {
                filter: attachment.filter,
                filter_type,
                kernel: prepared.kernel,
                compute,
                parameters,
                input,
                output,
                rect: attachment.rect,
                images,
            },
            prepared.compile_time,
        ))
    }

    fn execute_inner(
        &mut self,
        queue: QueueId,
        on_submitted: Option<SubmitCallback<'_>>,
        statistics: Option<&mut PerformanceStatistic>,
    ) -> FilterResult<Submission> {
        let attachments = self.queue(queue)?.attachments().to_vec();
        let mut steps = Vec::with_capacity(attachments.len());
        let mut compile_time = Duration::ZERO;
        for attachment in &attachments {
            let (step, prepared_in) = self.build_step(attachment)?;
            compile_time += prepared_in;
            steps.push(step);
        }

        let command_queue = self
            .queues
            .get_mut(&queue)
            .ok_or(FilterError::InvalidQueue(queue))?;
        let submission = self.device.submit(
            Job {
                queue,
                steps,
            },
            command_queue.timeline(),
        )?;
        command_queue.mark_submitted();
        log::debug!(
            "queue {}: submitted {} attachment(s) as job {}",
            queue,
            attachments.len(),
            submission.ticket()
        );
        if let Some(callback) = on_submitted {
            callback(&submission);
        }

        if let Some(stats) = statistics {
            if stats.measure_compile_time {
                stats.compile_time = compile_time.as_secs_f32() * 1000.0;
            }
            if stats.measure_execution_time {
                let report = submission.wait()?;
                stats.execution_time = report.execution_time.as_micros() as u64;
            }
        }
        Ok(submission)
    }

    /// Hand pending work to the device without waiting.
    pub fn flush(&mut self, queue: QueueId) -> FilterResult<()> {
        let result = self.queue(queue).map(|_| self.device.flush());
        self.track(result)
    }

    /// Wait for everything submitted on a queue.
    ///
    /// Reports the first failure since the previous synchronize.
    pub fn synchronize(&mut self, queue: QueueId) -> FilterResult<()> {
        let result = match self.queues.get_mut(&queue) {
            Some(q) => {
                let outcome = q.timeline().synchronize();
                q.mark_synchronized();
                outcome
            }
            None => Err(FilterError::InvalidQueue(queue)),
        };
        self.track(result)
    }

    // ------------------------------------------------------------------
    // Mapping
    // ------------------------------------------------------------------

    /// Map an image's storage for host access.
    pub fn map_image(&mut self, image: ImageId, access: MapAccess) -> FilterResult<MappedImage> {
        let result = self.image(image).and_then(|i| i.map(access));
        self.track(result)
    }

    /// Release a mapping.
    pub fn unmap_image(&mut self, mapping: MappedImage) -> FilterResult<()> {
        let image = mapping.image();
        drop(mapping);
        let result = self.image(image).map(|_| ());
        self.track(result)
    }

    // ------------------------------------------------------------------
    // Info queries
    // ------------------------------------------------------------------

    fn context_value(&self, key: ContextInfo) -> InfoValue {
        let dir = match key {
            ContextInfo::KernelsSourceDir => &self.source_dir,
            ContextInfo::KernelsCacheDir => &self.cache_dir,
        };
        InfoValue::Text(
            dir.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        )
    }

    /// Query context info.
    pub fn context_info(&mut self, key: u32, buffer: Option<&mut [u8]>) -> FilterResult<usize> {
        let result = ContextInfo::try_from(key)
            .and_then(|key| write_info(&self.context_value(key), buffer));
        self.track(result)
    }

    /// Change a context setting; `value` is a NUL-terminated UTF-8 path.
    ///
    /// An empty path unsets the directory.
    pub fn set_info(&mut self, key: u32, value: &[u8]) -> FilterResult<()> {
        let result = ContextInfo::try_from(key).and_then(|key| {
            let text = decode_string(value)?;
            let path = (!text.is_empty()).then(|| PathBuf::from(text));
            match key {
                ContextInfo::KernelsSourceDir => self.source_dir = path,
                ContextInfo::KernelsCacheDir => {
                    if let Some(dir) = &path {
                        create_dir(dir)?;
                    }
                    self.programs.set_directory(path.clone());
                    self.cache_dir = path;
                }
            }
            Ok(())
        });
        self.track(result)
    }

    fn device_value(&self, key: DeviceInfo) -> InfoValue {
        let desc = self.device.description();
        match key {
            DeviceInfo::Name => InfoValue::Text(desc.name.clone()),
            DeviceInfo::Vendor => InfoValue::Text(desc.vendor.clone()),
            DeviceInfo::MemorySize => InfoValue::U64(desc.memory_size),
        }
    }

    /// Query info of the context's device.
    pub fn device_info(&mut self, key: u32, buffer: Option<&mut [u8]>) -> FilterResult<usize> {
        let result = DeviceInfo::try_from(key)
            .and_then(|key| write_info(&self.device_value(key), buffer));
        self.track(result)
    }

    /// Query image info.
    pub fn image_info(
        &mut self,
        image: ImageId,
        key: u32,
        buffer: Option<&mut [u8]>,
    ) -> FilterResult<usize> {
        let result = self.image(image).and_then(|image| {
            let value = match ImageInfo::try_from(key)? {
                ImageInfo::Descriptor => InfoValue::Descriptor(image.descriptor().to_raw()),
                ImageInfo::DataSizeBytes => InfoValue::U64(image.data_size()),
            };
            write_info(&value, buffer)
        });
        self.track(result)
    }

    /// Query filter info.
    pub fn filter_info(
        &mut self,
        filter: FilterId,
        key: u32,
        buffer: Option<&mut [u8]>,
    ) -> FilterResult<usize> {
        let result = self.filter(filter).and_then(|filter| {
            let metadata = filter.metadata();
            let value = match FilterInfo::try_from(key)? {
                FilterInfo::Type => InfoValue::U32(filter.filter_type().code()),
                FilterInfo::ParameterCount => InfoValue::U32(metadata.parameters.len() as u32),
                FilterInfo::Description => InfoValue::Text(metadata.description.clone()),
                FilterInfo::Joinable => InfoValue::Bool(metadata.joinable),
            };
            write_info(&value, buffer)
        });
        self.track(result)
    }

    /// Query info of the parameter at `index` in schema order.
    pub fn parameter_info(
        &mut self,
        filter: FilterId,
        index: usize,
        key: u32,
        buffer: Option<&mut [u8]>,
    ) -> FilterResult<usize> {
        let result = self.filter(filter).and_then(|filter| {
            let key = ParameterInfo::try_from(key)?;
            let def = filter.definition(index)?;
            let value = match key {
                ParameterInfo::Name => InfoValue::Text(def.name.clone()),
                ParameterInfo::Type => InfoValue::U32(def.ty.code()),
                ParameterInfo::Description => InfoValue::Text(def.description.clone()),
                ParameterInfo::Value => InfoValue::Bytes(
                    filter
                        .parameter(&def.name)
                        .map(ParameterValue::to_bytes)
                        .unwrap_or_default(),
                ),
            };
            write_info(&value, buffer)
        });
        self.track(result)
    }

    /// Run a query twice: once for the size, once into a buffer of that size.
    fn fetch(
        &mut self,
        query: impl Fn(&mut Self, Option<&mut [u8]>) -> FilterResult<usize>,
    ) -> FilterResult<Vec<u8>> {
        let size = query(self, None)?;
        let mut buffer = vec![0u8; size];
        let written = query(self, Some(&mut buffer))?;
        buffer.truncate(written);
        Ok(buffer)
    }

    /// Kernel cache directory, empty when unset.
    pub fn kernel_cache_dir(&mut self) -> FilterResult<String> {
        let key = ContextInfo::KernelsCacheDir.code();
        decode_string(&self.fetch(|ctx, buf| ctx.context_info(key, buf))?)
    }

    /// Kernel source directory, empty when unset.
    pub fn kernel_source_dir(&mut self) -> FilterResult<String> {
        let key = ContextInfo::KernelsSourceDir.code();
        decode_string(&self.fetch(|ctx, buf| ctx.context_info(key, buf))?)
    }

    pub fn device_name(&mut self) -> FilterResult<String> {
        let key = DeviceInfo::Name.code();
        decode_string(&self.fetch(|ctx, buf| ctx.device_info(key, buf))?)
    }

    pub fn device_vendor(&mut self) -> FilterResult<String> {
        let key = DeviceInfo::Vendor.code();
        decode_string(&self.fetch(|ctx, buf| ctx.device_info(key, buf))?)
    }

    /// Device memory in bytes.
    pub fn device_memory_size(&mut self) -> FilterResult<u64> {
        let key = DeviceInfo::MemorySize.code();
        decode_u64(&self.fetch(|ctx, buf| ctx.device_info(key, buf))?)
    }

    /// Descriptor of an image, pitches resolved.
    pub fn image_descriptor(&mut self, image: ImageId) -> FilterResult<ImageDescriptor> {
        let key = ImageInfo::Descriptor.code();
        decode_descriptor(&self.fetch(|ctx, buf| ctx.image_info(image, key, buf))?)
    }

    pub fn image_data_size(&mut self, image: ImageId) -> FilterResult<u64> {
        let key = ImageInfo::DataSizeBytes.code();
        decode_u64(&self.fetch(|ctx, buf| ctx.image_info(image, key, buf))?)
    }

    pub fn filter_type(&mut self, filter: FilterId) -> FilterResult<FilterType> {
        let key = FilterInfo::Type.code();
        let code = decode_u32(&self.fetch(|ctx, buf| ctx.filter_info(filter, key, buf))?)?;
        FilterType::from_code(code)
            .ok_or_else(|| FilterError::Internal(format!("unknown filter type code {:#x}", code)))
    }

    pub fn filter_parameter_count(&mut self, filter: FilterId) -> FilterResult<u32> {
        let key = FilterInfo::ParameterCount.code();
        decode_u32(&self.fetch(|ctx, buf| ctx.filter_info(filter, key, buf))?)
    }

    pub fn filter_description(&mut self, filter: FilterId) -> FilterResult<String> {
        let key = FilterInfo::Description.code();
        decode_string(&self.fetch(|ctx, buf| ctx.filter_info(filter, key, buf))?)
    }

    pub fn filter_joinable(&mut self, filter: FilterId) -> FilterResult<bool> {
        let key = FilterInfo::Joinable.code();
        Ok(decode_u32(&self.fetch(|ctx, buf| ctx.filter_info(filter, key, buf))?)? != 0)
    }

    pub fn parameter_name(&mut self, filter: FilterId, index: usize) -> FilterResult<String> {
        let key = ParameterInfo::Name.code();
        decode_string(&self.fetch(|ctx, buf| ctx.parameter_info(filter, index, key, buf))?)
    }

    pub fn parameter_type(
        &mut self,
        filter: FilterId,
        index: usize,
    ) -> FilterResult<ParameterType> {
        let key = ParameterInfo::Type.code();
        let bytes = self.fetch(|ctx, buf| ctx.parameter_info(filter, index, key, buf))?;
        let code = decode_u32(&bytes)?;
        ParameterType::from_code(code).ok_or_else(|| {
            FilterError::Internal(format!("unknown parameter type code {}", code))
        })
    }

    pub fn parameter_description(
        &mut self,
        filter: FilterId,
        index: usize,
    ) -> FilterResult<String> {
        let key = ParameterInfo::Description.code();
        decode_string(&self.fetch(|ctx, buf| ctx.parameter_info(filter, index, key, buf))?)
    }

    /// Packed bytes of a parameter's current value, empty when unset.
    pub fn parameter_value_bytes(
        &mut self,
        filter: FilterId,
        index: usize,
    ) -> FilterResult<Vec<u8>> {
        let key = ParameterInfo::Value.code();
        self.fetch(|ctx, buf| ctx.parameter_info(filter, index, key, buf))
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if !(self.images.is_empty() && self.filters.is_empty() && self.queues.is_empty()) {
            log::warn!(
                "context {} dropped with {} image(s), {} filter(s) and {} queue(s) still alive",
                self.id,
                self.images.len(),
                self.filters.len(),
                self.queues.len()
            );
        }
        // Dropping the device drains submitted work
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ComponentType, RawImageDescriptor};
    use crate::execution::engine::tests::Failing;
    use proptest::prelude::*;
    use std::cell::Cell;

    fn context() -> Context {
        Context::new(crate::API_VERSION, BackendApi::OpenCl, 0, None).unwrap()
    }

    fn rgb8(width: u32, height: u32) -> ImageDescriptor {
        ImageDescriptor::new(width, height, 3, ComponentType::Uint8)
    }

    fn read_bytes(ctx: &mut Context, image: ImageId) -> Vec<u8> {
        ctx.map_image(image, MapAccess::Read).unwrap().as_slice().to_vec()
    }

    #[test]
    fn test_context_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Context>();
    }

    #[test]
    fn test_api_version_checks() {
        assert!(check_api_version(crate::API_VERSION).is_ok());
        assert!(check_api_version(crate::make_api_version(1, 0, 0, 0)).is_ok());
        for bad in [crate::make_api_version(2, 0, 0, 0), crate::make_api_version(1, 9, 0, 0)] {
            let err = Context::new(bad, BackendApi::Metal, 0, None).err().unwrap();
            assert_eq!(err.status(), Status::InvalidApiVersion);
        }
    }

    #[test]
    fn test_device_out_of_range() {
        let err = Context::new(crate::API_VERSION, BackendApi::OpenCl, 3, None)
            .err()
            .unwrap();
        assert_eq!(err.status(), Status::InvalidParameter);
    }

    #[test]
    fn test_blur_end_to_end() {
        let mut ctx = context();
        let data: Vec<u8> = (0..800 * 600 * 3).map(|i| (i % 251) as u8).collect();
        let input = ctx.create_image(&rgb8(800, 600), Some(&data)).unwrap();
        let output = ctx.create_image(&rgb8(800, 600), None).unwrap();
        let blur = ctx.create_filter(FilterType::GaussianBlur).unwrap();
        ctx.set_parameter_1u(blur, "radius", 3).unwrap();
        ctx.set_parameter_1f(blur, "sigma", 2.0).unwrap();

        let queue = ctx.create_command_queue();
        ctx.attach(queue, blur, input, output, None).unwrap();
        ctx.execute(queue, None, None).unwrap();
        ctx.synchronize(queue).unwrap();

        let out = read_bytes(&mut ctx, output);
        assert_eq!(out.len(), data.len());
        assert!(out.iter().any(|v| *v != 0));
        assert_ne!(out, data);
        assert_eq!(ctx.image_data_size(output).unwrap(), 800 * 600 * 3);

        let size = ctx
            .image_info(output, ImageInfo::Descriptor.code(), None)
            .unwrap();
        assert_eq!(size, std::mem::size_of::<RawImageDescriptor>());
        assert_eq!(size, 28);
        let desc = ctx.image_descriptor(output).unwrap();
        assert_eq!((desc.width, desc.height, desc.depth), (800, 600, 1));
        assert_eq!(desc.num_components, 3);
        assert_eq!(desc.component_type, ComponentType::Uint8);
    }

    #[test]
    fn test_oversized_image_is_out_of_memory() {
        let mut ctx = context();
        let huge = ImageDescriptor::new(u32::MAX, u32::MAX, 4, ComponentType::Float32);
        let err = ctx.create_image(&huge, None).unwrap_err();
        assert_eq!(err.status(), Status::OutOfMemory);
        assert_eq!(ctx.last_error_status(), Some(Status::OutOfMemory));
    }

    #[test]
    fn test_deeply_nested_user_code_is_rejected() {
        let mut ctx = context();
        let input = ctx.create_image(&rgb8(8, 8), Some(&[10; 192])).unwrap();
        let output = ctx.create_image(&rgb8(8, 8), None).unwrap();
        let filter = ctx.create_filter(FilterType::UserDefined).unwrap();
        ctx.set_parameter_string(filter, "code", &format!("{}v", "-".repeat(200_000)))
            .unwrap();

        let queue = ctx.create_command_queue();
        ctx.attach(queue, filter, input, output, None).unwrap();
        let err = ctx.execute(queue, None, None).unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameter);
        assert!(err.to_string().contains("nested too deeply"));
    }

    #[test]
    fn test_attach_detach_sequence() {
        let mut ctx = context();
        let a_in = ctx.create_image(&rgb8(8, 8), Some(&[100; 192])).unwrap();
        let a_out = ctx.create_image(&rgb8(8, 8), None).unwrap();
        let b_out = ctx.create_image(&rgb8(8, 8), None).unwrap();
        let a = ctx.create_filter(FilterType::Convert).unwrap();
        let b = ctx.create_filter(FilterType::ScalarMult).unwrap();
        ctx.set_parameter_1f(b, "factor", 0.5).unwrap();

        let queue = ctx.create_command_queue();
        ctx.attach(queue, a, a_in, a_out, None).unwrap();
        ctx.attach(queue, b, a_in, b_out, None).unwrap();
        ctx.detach(queue, a).unwrap();
        assert_eq!(ctx.get_queue(queue).unwrap().attachments().len(), 1);

        ctx.execute(queue, None, None).unwrap();
        ctx.synchronize(queue).unwrap();
        assert!(read_bytes(&mut ctx, a_out).iter().all(|v| *v == 0));
        assert!(read_bytes(&mut ctx, b_out).iter().all(|v| *v == 50));

        let err = ctx.detach(queue, a).unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameter);
        assert_eq!(ctx.last_error_status(), Some(Status::InvalidParameter));
    }

    #[test]
    fn test_handle_validation() {
        let mut ctx = context();
        let mut other = context();
        let foreign = other.create_image(&rgb8(8, 8), None).unwrap();
        let image = ctx.create_image(&rgb8(8, 8), None).unwrap();
        let filter = ctx.create_filter(FilterType::Convert).unwrap();
        let queue = ctx.create_command_queue();

        let err = ctx.attach(QueueId::new(), filter, image, image, None).unwrap_err();
        assert_eq!(err.status(), Status::InvalidQueue);
        let err = ctx.attach(queue, FilterId::new(), image, image, None).unwrap_err();
        assert_eq!(err.status(), Status::InvalidFilter);
        let err = ctx.attach(queue, filter, foreign, image, None).unwrap_err();
        assert_eq!(err.status(), Status::InvalidImage);
        let err = ctx.delete_object(foreign).unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameter);
        assert!(ctx.last_error_message().is_some());

        ctx.clear_last_error();
        assert!(ctx.last_error_message().is_none());
        other.delete_object(foreign).unwrap();
    }

    #[test]
    fn test_filter_creation_errors() {
        let mut ctx = context();
        assert_eq!(
            ctx.create_filter(FilterType::AiDenoise).unwrap_err().status(),
            Status::Unsupported
        );
        assert_eq!(
            ctx.create_filter(FilterType::DepthOfField).unwrap_err().status(),
            Status::Unimplemented
        );
    }

    #[test]
    fn test_set_parameter_order() {
        let mut ctx = context();
        let filter = ctx.create_filter(FilterType::WeightedSum).unwrap();
        let err = ctx.set_parameter_1f(FilterId::new(), "weights", 1.0).unwrap_err();
        assert_eq!(err.status(), Status::InvalidFilter);
        let err = ctx.set_parameter_1f(filter, "nope", 1.0).unwrap_err();
        assert_eq!(err.status(), Status::InvalidFilterArgumentName);
        let err = ctx.set_parameter_1f(filter, "weights", 1.0).unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameterType);
        let err = ctx
            .set_parameter(filter, "weights", ParameterValue::Float(vec![1.0; 5]))
            .unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameter);
        let err = ctx.set_parameter_image(filter, "operand", ImageId::new()).unwrap_err();
        assert_eq!(err.status(), Status::InvalidImage);

        ctx.set_parameter_2f(filter, "weights", 0.25, 0.75).unwrap();
        assert_eq!(
            ctx.get_filter(filter).unwrap().parameter("weights"),
            Some(&ParameterValue::Float(vec![0.25, 0.75]))
        );
        let err = ctx.clear_parameter_image(filter, "weights").unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameterType);
    }

    #[test]
    fn test_reattach_runs_in_original_position() {
        let mut ctx = context();
        let src = ctx.create_image(&rgb8(8, 8), Some(&[40; 192])).unwrap();
        let mid = ctx.create_image(&rgb8(8, 8), None).unwrap();
        let dst = ctx.create_image(&rgb8(8, 8), None).unwrap();
        let first = ctx.create_filter(FilterType::ScalarMult).unwrap();
        let second = ctx.create_filter(FilterType::ScalarMult).unwrap();
        ctx.set_parameter_1f(first, "factor", 2.0).unwrap();
        ctx.set_parameter_1f(second, "factor", 2.0).unwrap();

        let queue = ctx.create_command_queue();
        ctx.attach(queue, first, src, dst, None).unwrap();
        ctx.attach(queue, second, mid, dst, None).unwrap();
        // first now writes mid, still ahead of second
        ctx.attach(queue, first, src, mid, None).unwrap();
        let order: Vec<_> = ctx
            .get_queue(queue)
            .unwrap()
            .attachments()
            .iter()
            .map(|a| a.filter)
            .collect();
        assert_eq!(order, vec![first, second]);

        ctx.execute(queue, None, None).unwrap();
        ctx.synchronize(queue).unwrap();
        assert!(read_bytes(&mut ctx, dst).iter().all(|v| *v == 160));
    }

    #[test]
    fn test_mapped_and_deleted_images_block_execute() {
        let mut ctx = context();
        let input = ctx.create_image(&rgb8(8, 8), None).unwrap();
        let output = ctx.create_image(&rgb8(8, 8), None).unwrap();
        let filter = ctx.create_filter(FilterType::Convert).unwrap();
        let queue = ctx.create_command_queue();
        ctx.attach(queue, filter, input, output, None).unwrap();

        let mapping = ctx.map_image(input, MapAccess::ReadWrite).unwrap();
        let err = ctx.execute(queue, None, None).unwrap_err();
        assert_eq!(err.status(), Status::InvalidImage);
        ctx.unmap_image(mapping).unwrap();
        ctx.execute(queue, None, None).unwrap();
        ctx.synchronize(queue).unwrap();

        ctx.delete_object(output).unwrap();
        let err = ctx.execute(queue, None, None).unwrap_err();
        assert_eq!(err.status(), Status::InvalidImage);
    }

    #[test]
    fn test_failing_attachment_commits_nothing() {
        let mut catalog = FilterCatalog::with_builtins();
        catalog.register(|| Box::new(Failing));
        let options = ContextOptions::new(BackendApi::Metal).with_catalog(Arc::new(catalog));
        let mut ctx = Context::with_options(options).unwrap();

        let src = ctx.create_image(&rgb8(8, 8), Some(&[90; 192])).unwrap();
        let first_out = ctx.create_image(&rgb8(8, 8), Some(&[7; 192])).unwrap();
        let second_out = ctx.create_image(&rgb8(8, 8), None).unwrap();
        let ok = ctx.create_filter(FilterType::ScalarMult).unwrap();
        let failing = ctx.create_filter(FilterType::Convert).unwrap();

        let queue = ctx.create_command_queue();
        ctx.attach(queue, ok, src, first_out, None).unwrap();
        ctx.attach(queue, failing, first_out, second_out, None).unwrap();
        let submission = ctx.execute(queue, None, None).unwrap();
        assert_eq!(submission.wait().unwrap_err().status(), Status::InternalError);

        let err = ctx.synchronize(queue).unwrap_err();
        assert_eq!(err.status(), Status::InternalError);
        assert!(read_bytes(&mut ctx, first_out).iter().all(|v| *v == 7));
        ctx.synchronize(queue).unwrap();
    }

    #[test]
    fn test_delete_queue_with_failed_job() {
        let mut catalog = FilterCatalog::with_builtins();
        catalog.register(|| Box::new(Failing));
        let options = ContextOptions::new(BackendApi::OpenCl).with_catalog(Arc::new(catalog));
        let mut ctx = Context::with_options(options).unwrap();

        let image = ctx.create_image(&rgb8(8, 8), None).unwrap();
        let failing = ctx.create_filter(FilterType::Convert).unwrap();
        let queue = ctx.create_command_queue();
        ctx.attach(queue, failing, image, image, None).unwrap();
        ctx.execute(queue, None, None).unwrap();

        ctx.delete_object(queue).unwrap();
        assert!(ctx.last_error_status().is_none());
        let err = ctx.synchronize(queue).unwrap_err();
        assert_eq!(err.status(), Status::InvalidQueue);
    }

    #[test]
    fn test_callback_fires_once() {
        let mut ctx = context();
        let image = ctx.create_image(&rgb8(8, 8), None).unwrap();
        let filter = ctx.create_filter(FilterType::Convert).unwrap();
        let queue = ctx.create_command_queue();
        ctx.attach(queue, filter, image, image, None).unwrap();

        let calls = Cell::new(0);
        ctx.execute(queue, Some(Box::new(|_| calls.set(calls.get() + 1))), None)
            .unwrap();
        ctx.synchronize(queue).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_profiling_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = Context::new(crate::API_VERSION, BackendApi::DirectX12, 0, Some(dir.path()))
            .unwrap();
        let image = ctx.create_image(&rgb8(256, 256), None).unwrap();
        let filter = ctx.create_filter(FilterType::Sobel).unwrap();
        ctx.set_compute_type(filter, ComputeType::Float16).unwrap();
        let queue = ctx.create_command_queue();
        let output = ctx.create_image(&rgb8(256, 256), None).unwrap();
        ctx.attach(queue, filter, image, output, None).unwrap();

        let mut stats = PerformanceStatistic::measure_all();
        let submission = ctx.execute(queue, None, Some(&mut stats)).unwrap();
        assert!(submission.is_complete());
        assert!(stats.execution_time > 0);
        assert!(stats.compile_time > 0.0);
        assert!(dir.path().join("sobel-fp16.json").exists());

        // Second run hits the in-memory program cache
        let mut again = PerformanceStatistic::measure_all();
        ctx.execute(queue, None, Some(&mut again)).unwrap();
        assert_eq!(again.compile_time, 0.0);
        ctx.synchronize(queue).unwrap();
    }

    #[test]
    fn test_rect_validation() {
        let mut ctx = context();
        let input = ctx.create_image(&rgb8(16, 16), None).unwrap();
        let output = ctx.create_image(&rgb8(16, 16), None).unwrap();
        let filter = ctx.create_filter(FilterType::Convert).unwrap();
        let queue = ctx.create_command_queue();

        let err = ctx
            .attach(queue, filter, input, output, Some(Rect::new(3, 0, 8, 8)))
            .unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameter);
        assert!(ctx.get_queue(queue).unwrap().attachments().is_empty());

        ctx.attach(queue, filter, input, output, Some(Rect::new(8, 8, 16, 8)))
            .unwrap();
        let err = ctx.execute(queue, None, None).unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameter);
    }

    #[test]
    fn test_info_queries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("kernels");
        let mut ctx =
            Context::new(crate::API_VERSION, BackendApi::OpenCl, 0, Some(&cache)).unwrap();
        assert!(cache.is_dir());
        assert_eq!(ctx.kernel_cache_dir().unwrap(), cache.display().to_string());
        assert_eq!(ctx.kernel_source_dir().unwrap(), "");

        ctx.set_info(ContextInfo::KernelsSourceDir.code(), b"/opt/kernels\0")
            .unwrap();
        assert_eq!(ctx.kernel_source_dir().unwrap(), "/opt/kernels");
        assert!(ctx.device_name().unwrap().contains("OpenCL"));
        assert_eq!(ctx.device_vendor().unwrap(), "filterworks");

        let image = ctx
            .create_image(&ImageDescriptor::new(10, 4, 4, ComponentType::Float16), None)
            .unwrap();
        let desc = ctx.image_descriptor(image).unwrap();
        assert_eq!(desc.row_pitch, 80);
        assert_eq!(desc.slice_pitch, 320);

        let filter = ctx.create_filter(FilterType::GaussianBlur).unwrap();
        assert_eq!(ctx.filter_type(filter).unwrap(), FilterType::GaussianBlur);
        assert_eq!(ctx.filter_parameter_count(filter).unwrap(), 2);
        assert!(!ctx.filter_joinable(filter).unwrap());
        assert!(!ctx.filter_description(filter).unwrap().is_empty());
        assert_eq!(ctx.parameter_name(filter, 1).unwrap(), "sigma");
        assert_eq!(ctx.parameter_type(filter, 0).unwrap(), ParameterType::UInt1);
        assert_eq!(ctx.parameter_value_bytes(filter, 1).unwrap(), 1.0f32.to_ne_bytes());
        assert_eq!(
            ctx.parameter_name(filter, 2).unwrap_err().status(),
            Status::InvalidParameter
        );
    }

    #[test]
    fn test_unknown_info_keys() {
        let mut ctx = context();
        let image = ctx.create_image(&rgb8(8, 8), None).unwrap();
        let filter = ctx.create_filter(FilterType::Convert).unwrap();
        let errors = [
            ctx.context_info(0x77, None).unwrap_err(),
            ctx.device_info(0x77, None).unwrap_err(),
            ctx.image_info(image, 0x77, None).unwrap_err(),
            ctx.filter_info(filter, 0x77, None).unwrap_err(),
            ctx.parameter_info(filter, 0, 0x77, None).unwrap_err(),
        ];
        for err in errors {
            assert_eq!(err.status(), Status::InvalidParameterType);
        }
    }

    #[test]
    fn test_short_info_buffer() {
        let mut ctx = context();
        let image = ctx.create_image(&rgb8(8, 8), None).unwrap();
        let key = ImageInfo::Descriptor.code();
        let size = ctx.image_info(image, key, None).unwrap();
        let mut small = vec![0x5au8; size - 1];
        let err = ctx.image_info(image, key, Some(&mut small)).unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameter);
        assert!(small.iter().all(|b| *b == 0x5a));
    }

    proptest! {
        #[test]
        fn prop_map_round_trip(bytes in proptest::collection::vec(any::<u8>(), 8 * 8 * 3)) {
            let mut ctx = context();
            let image = ctx.create_image(&rgb8(8, 8), None).unwrap();
            {
                let mut mapping = ctx.map_image(image, MapAccess::Write).unwrap();
                mapping.as_mut_slice().unwrap().copy_from_slice(&bytes);
            }
            prop_assert_eq!(read_bytes(&mut ctx, image), bytes);
        }

        #[test]
        fn prop_rect_preserves_outside(x in 0u32..3, y in 0u32..3, w in 1u32..3, h in 1u32..3) {
            let rect = Rect::new(x * 8, y * 8, w * 8, h * 8);
            prop_assume!(rect.fits_within(32, 32));

            let mut ctx = context();
            let input = ctx.create_image(&rgb8(32, 32), Some(&[200; 32 * 32 * 3])).unwrap();
            let output = ctx.create_image(&rgb8(32, 32), Some(&[1; 32 * 32 * 3])).unwrap();
            let filter = ctx.create_filter(FilterType::Convert).unwrap();
            let queue = ctx.create_command_queue();
            ctx.attach(queue, filter, input, output, Some(rect)).unwrap();
            ctx.execute(queue, None, None).unwrap();
            ctx.synchronize(queue).unwrap();

            let out = read_bytes(&mut ctx, output);
            for py in 0..32 {
                for px in 0..32 {
                    let expected = if rect.contains(px, py) { 200 } else { 1 };
                    prop_assert_eq!(out[((py * 32 + px) * 3) as usize], expected);
                }
            }
        }
    }
}
