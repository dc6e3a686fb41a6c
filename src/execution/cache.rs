//! Prepared-program cache.
//!
//! Before a queue is submitted every attached filter type is prepared for
//! its compute precision. Prepared kernels are kept in an LRU keyed by
//! (filter type, precision). When the context has a kernel cache directory a
//! JSON manifest is written there for each prepared program, so a later
//! context on the same directory loads it instead of preparing it again.

use crate::core::error::{FilterError, FilterResult};
use crate::core::kernel::Kernel;
use crate::core::types::ComputeType;
use crate::execution::device::DeviceDescription;
use crate::filters::catalog::FilterCatalog;
use crate::filters::kind::FilterType;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Default number of prepared programs kept in memory.
pub const DEFAULT_CAPACITY: usize = 64;

/// A cache key combining filter type and precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    pub filter_type: FilterType,
    pub compute: ComputeType,
}

impl ProgramKey {
    /// File name of the manifest for this key.
    pub fn manifest_name(&self) -> String {
        format!("{}-{}.json", self.filter_type.id(), self.compute.name())
    }
}

/// On-disk record of a prepared program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramManifest {
    pub filter_type: FilterType,
    pub compute: ComputeType,
    pub device: String,
    pub library_version: String,
    /// Parameter names of the schema the program was prepared against
    pub parameters: Vec<String>,
    /// Preparation time in milliseconds
    pub compile_time: f32,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Programs found in memory.
    pub hits: u64,
    /// Programs found as a manifest on disk.
    pub disk_hits: u64,
    /// Programs prepared from scratch.
    pub misses: u64,
    pub evictions: u64,
}

/// A prepared kernel and what it cost to get it.
pub struct Prepared {
    pub kernel: Box<dyn Kernel>,
    /// Zero for in-memory hits
    pub compile_time: Duration,
}

/// LRU of prepared kernels backed by a manifest directory.
pub struct ProgramCache {
    programs: LruCache<ProgramKey, Box<dyn Kernel>>,
    directory: Option<PathBuf>,
    device: String,
    stats: CacheStats,
}

impl ProgramCache {
    /// Create a cache for a device.
    pub fn new(capacity: usize, directory: Option<PathBuf>, device: &DeviceDescription) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            programs: LruCache::new(capacity),
            directory,
            device: device.name.clone(),
            stats: CacheStats::default(),
        }
    }

    /// Directory manifests are written to.
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Point the cache at another directory; prepared programs stay valid.
    pub fn set_directory(&mut self, directory: Option<PathBuf>) {
        self.directory = directory;
    }

    /// Get the kernel for a filter type, preparing it if necessary.
    pub fn prepare(
        &mut self,
        catalog: &FilterCatalog,
        filter_type: FilterType,
        compute: ComputeType,
    ) -> FilterResult<Prepared> {
        let key = ProgramKey {
            filter_type,
            compute,
        };
        if let Some(kernel) = self.programs.get(&key) {
            self.stats.hits += 1;
            return Ok(Prepared {
                kernel: kernel.clone(),
                compile_time: Duration::ZERO,
            });
        }

        let start = Instant::now();
        let kernel = catalog.create(filter_type)?;
        let loaded = match &self.directory {
            Some(dir) => self.load_or_write_manifest(dir, &key, kernel.as_ref(), start)?,
            None => false,
        };
        if loaded {
            self.stats.disk_hits += 1;
        } else {
            self.stats.misses += 1;
        }
        let compile_time = start.elapsed();
        log::debug!(
            "prepared {} ({}) in {:?}{}",
            filter_type,
            compute.name(),
            compile_time,
            if loaded { " from manifest" } else { "" }
        );

        if self.programs.push(key, kernel.clone()).is_some_and(|(k, _)| k != key) {
            self.stats.evictions += 1;
        }
        Ok(Prepared {
            kernel,
            compile_time,
        })
    }

    /// Returns true if a matching manifest already existed.
    fn load_or_write_manifest(
        &self,
        dir: &Path,
        key: &ProgramKey,
        kernel: &dyn Kernel,
        start: Instant,
    ) -> FilterResult<bool> {
        let path = dir.join(key.manifest_name());
        let parameters: Vec<String> = kernel
            .metadata()
            .parameter_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        if let Ok(text) = fs::read_to_string(&path) {
            match serde_json::from_str::<ProgramManifest>(&text) {
                Ok(manifest)
                    if manifest.library_version == crate::VERSION
                        && manifest.parameters == parameters =>
                {
                    return Ok(true);
                }
                Ok(_) => log::debug!("stale program manifest {}", path.display()),
                Err(e) => log::warn!("ignoring unreadable manifest {}: {}", path.display(), e),
            }
        }

        let manifest = ProgramManifest {
            filter_type: key.filter_type,
            compute: key.compute,
            device: self.device.clone(),
            library_version: crate::VERSION.to_string(),
            parameters,
            compile_time: start.elapsed().as_secs_f32() * 1000.0,
        };
        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| FilterError::Internal(format!("serializing manifest: {}", e)))?;
        fs::write(&path, json).map_err(|e| FilterError::io(path.display(), e))?;
        Ok(false)
    }

    /// Drop every in-memory program.
    pub fn clear(&mut self) {
        self.programs.clear();
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Number of programs held in memory.
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BackendApi;
    use crate::execution::device::describe;

    fn device() -> DeviceDescription {
        describe(BackendApi::OpenCl, 0).unwrap()
    }

    #[test]
    fn test_memory_hits() {
        let catalog = FilterCatalog::with_builtins();
        let mut cache = ProgramCache::new(4, None, &device());

        cache
            .prepare(&catalog, FilterType::GaussianBlur, ComputeType::Float32)
            .unwrap();
        let again = cache
            .prepare(&catalog, FilterType::GaussianBlur, ComputeType::Float32)
            .unwrap();
        assert_eq!(again.compile_time, Duration::ZERO);
        cache
            .prepare(&catalog, FilterType::GaussianBlur, ComputeType::Float16)
            .unwrap();

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 2));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_eviction() {
        let catalog = FilterCatalog::with_builtins();
        let mut cache = ProgramCache::new(1, None, &device());
        for ty in [FilterType::GaussianBlur, FilterType::Sobel, FilterType::GaussianBlur] {
            cache.prepare(&catalog, ty, ComputeType::Float32).unwrap();
        }
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().evictions, 2);
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_manifests_persist() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FilterCatalog::with_builtins();

        let mut first = ProgramCache::new(4, Some(dir.path().to_path_buf()), &device());
        first
            .prepare(&catalog, FilterType::AcesTonemap, ComputeType::Float16)
            .unwrap();
        let path = dir.path().join("aces_tonemap-fp16.json");
        let manifest: ProgramManifest =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(manifest.filter_type, FilterType::AcesTonemap);
        assert_eq!(manifest.parameters, vec!["exposure"]);

        let mut second = ProgramCache::new(4, Some(dir.path().to_path_buf()), &device());
        second
            .prepare(&catalog, FilterType::AcesTonemap, ComputeType::Float16)
            .unwrap();
        assert_eq!(second.stats().disk_hits, 1);
    }

    #[test]
    fn test_unknown_types_fail() {
        let catalog = FilterCatalog::with_builtins();
        let mut cache = ProgramCache::new(4, None, &device());
        assert!(cache
            .prepare(&catalog, FilterType::DepthOfField, ComputeType::Float32)
            .is_err());
        assert!(cache.is_empty());
    }
}
