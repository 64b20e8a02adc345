//! Version-aware catalog cache.
//!
//! The loader owns the only copy of the validated catalog. Each `load()`
//! compares the source's current [`VersionToken`] with the cached one and
//! reparses only when they differ. Snapshots are immutable and published by
//! swapping an `Arc`, so a reader holds either the old snapshot or the new
//! one in full.

use crate::catalog::parse_catalog;
use crate::{Catalog, Result, VersionToken};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::UNIX_EPOCH;

/// Where catalog text comes from
pub trait CatalogSource: Send + Sync {
    /// Cheap freshness check (no content read)
    fn version(&self) -> Result<VersionToken>;

    /// Read the full source text
    fn read(&self) -> Result<String>;

    /// Human-readable description for log lines
    fn describe(&self) -> String;
}

/// Catalog stored in a YAML file; the version is the file's mtime
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogSource for FileSource {
    fn version(&self) -> Result<VersionToken> {
        let modified = std::fs::metadata(&self.path)?.modified()?;
        // Pre-epoch mtimes collapse to 0
        let nanos = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Ok(VersionToken(nanos))
    }

    fn read(&self) -> Result<String> {
        Ok(std::fs::read_to_string(&self.path)?)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// A validated catalog tied to the source version it was parsed from
#[derive(Debug)]
pub struct CatalogSnapshot {
    pub catalog: Catalog,
    pub version: VersionToken,
}

/// Caching front for a [`CatalogSource`]
pub struct CatalogLoader {
    source: Box<dyn CatalogSource>,
    cache: RwLock<Option<Arc<CatalogSnapshot>>>,
}

impl CatalogLoader {
    pub fn new(source: impl CatalogSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: RwLock::new(None),
        }
    }

    /// Loader over a catalog file
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(FileSource::new(path))
    }

    /// Return the current validated catalog, reparsing only if the source changed.
    ///
    /// A read or validation failure is returned to the caller. The previous
    /// snapshot stays in the cache but is not served while the source is bad.
    pub fn load(&self) -> Result<Arc<CatalogSnapshot>> {
        let version = self.source.version()?;

        if let Some(snapshot) = self.cached(version) {
            tracing::trace!("Catalog cache hit at version {}", version);
            return Ok(snapshot);
        }

        // The version is taken before the read, so a concurrent edit at worst
        // causes one extra reparse on the next call.
        let text = self.source.read()?;
        let catalog = parse_catalog(&text).map_err(|e| {
            tracing::warn!("Catalog at {} failed validation: {}", self.source.describe(), e);
            e
        })?;

        let snapshot = Arc::new(CatalogSnapshot { catalog, version });
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));

        tracing::info!(
            "Loaded catalog from {} ({} items, version {})",
            self.source.describe(),
            snapshot.catalog.items.len(),
            version
        );
        Ok(snapshot)
    }

    /// Current source version without reading or parsing the catalog
    pub fn version(&self) -> Result<VersionToken> {
        self.source.version()
    }

    fn cached(&self, version: VersionToken) -> Option<Arc<CatalogSnapshot>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|snapshot| snapshot.version == version)
            .map(Arc::clone)
    }
}
