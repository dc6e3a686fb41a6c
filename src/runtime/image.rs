//! Images and image mapping.

use crate::core::error::{FilterError, FilterResult};
use crate::core::handle::ImageId;
use crate::core::types::{ImageDescriptor, MapAccess};
use crate::execution::engine::{ImageBinding, Storage};
use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, RawRwLock, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Host pixel storage laid out exactly as its descriptor says.
#[derive(Debug)]
pub struct Image {
    id: ImageId,
    descriptor: ImageDescriptor,
    storage: Storage,
    mapped: Arc<AtomicBool>,
}

impl Image {
    /// Allocate an image, optionally copying initial contents.
    pub(crate) fn new(
        id: ImageId,
        descriptor: &ImageDescriptor,
        data: Option<&[u8]>,
    ) -> FilterResult<Self> {
        descriptor.validate()?;
        let descriptor = descriptor.resolved();
        let size = descriptor.storage_size();

        let mut bytes = Vec::new();
        bytes.try_reserve_exact(size).map_err(|_| {
            FilterError::OutOfMemory(format!("{} bytes for image {}", size, descriptor))
        })?;
        match data {
            Some(data) if data.len() < size => {
                return Err(FilterError::InvalidParameter(format!(
                    "initial data holds {} bytes, image {} needs {}",
                    data.len(),
                    descriptor,
                    size
                )));
            }
            Some(data) => bytes.extend_from_slice(&data[..size]),
            None => bytes.resize(size, 0),
        }

        Ok(Self {
            id,
            descriptor,
            storage: Arc::new(RwLock::new(bytes)),
            mapped: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    /// Descriptor with pitches resolved.
    pub fn descriptor(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    /// Size of the pixel storage in bytes.
    pub fn data_size(&self) -> u64 {
        self.descriptor.storage_size() as u64
    }

    /// Whether a [`MappedImage`] for this image is alive.
    pub fn is_mapped(&self) -> bool {
        self.mapped.load(Ordering::Acquire)
    }

    /// Fail with invalid-image if the image is mapped.
    pub(crate) fn require_unmapped(&self) -> FilterResult<()> {
        if self.is_mapped() {
            return Err(FilterError::invalid_image(self.id, "image is mapped"));
        }
        Ok(())
    }

    /// View of the image handed to a job.
    pub(crate) fn binding(&self) -> ImageBinding {
        ImageBinding {
            id: self.id,
            descriptor: self.descriptor,
            storage: self.storage.clone(),
        }
    }

    /// Map the storage for host access.
    ///
    /// Blocks while the device is committing to this image.
    pub(crate) fn map(&self, access: MapAccess) -> FilterResult<MappedImage> {
        if self.mapped.swap(true, Ordering::AcqRel) {
            return Err(FilterError::invalid_image(self.id, "image is already mapped"));
        }
        let guard = if access.writable() {
            Guard::Write(self.storage.write_arc())
        } else {
            Guard::Read(self.storage.read_arc())
        };
        Ok(MappedImage {
            image: self.id,
            access,
            guard,
            mapped: self.mapped.clone(),
        })
    }
}

enum Guard {
    Read(ArcRwLockReadGuard<RawRwLock, Vec<u8>>),
    Write(ArcRwLockWriteGuard<RawRwLock, Vec<u8>>),
}

/// Host access to an image's pixel bytes.
///
/// The image counts as mapped until this guard is dropped or passed to
/// [`Context::unmap_image`](crate::runtime::Context::unmap_image). Queues
/// referencing a mapped image refuse to execute.
pub struct MappedImage {
    image: ImageId,
    access: MapAccess,
    guard: Guard,
    mapped: Arc<AtomicBool>,
}

impl MappedImage {
    /// Image this mapping belongs to.
    pub fn image(&self) -> ImageId {
        self.image
    }

    pub fn access(&self) -> MapAccess {
        self.access
    }

    /// Pixel bytes, laid out as the image descriptor says.
    pub fn as_slice(&self) -> &[u8] {
        match &self.guard {
            Guard::Read(guard) => guard.as_slice(),
            Guard::Write(guard) => guard.as_slice(),
        }
    }

    /// Writable pixel bytes; fails for read-only mappings.
    pub fn as_mut_slice(&mut self) -> FilterResult<&mut [u8]> {
        match &mut self.guard {
            Guard::Write(guard) => Ok(guard.as_mut_slice()),
            Guard::Read(_) => Err(FilterError::InvalidParameter(format!(
                "image {} is mapped read-only",
                self.image
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MappedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedImage")
            .field("image", &self.image)
            .field("access", &self.access)
            .field("len", &self.len())
            .finish()
    }
}

impl Drop for MappedImage {
    fn drop(&mut self) {
        self.mapped.store(false, Ordering::Release);
    }
}
