use std::path::{Path, PathBuf};

use cloutcheck_core::{MediaKind, MediaRef};
use tokio::sync::OwnedSemaphorePermit;

/// One downloaded media file.
#[derive(Debug, Clone)]
pub struct LocalAsset {
    pub source: MediaRef,
    pub path: PathBuf,
    pub bytes: u64,
}

/// A media ref that could not be downloaded.
#[derive(Debug, Clone)]
pub struct FailedAsset {
    pub source: MediaRef,
    pub reason: String,
}

/// Local storage for one post's media.
///
/// Holds the disk-budget reservation (and, under the immediate policy, the
/// residency gate) until the store releases it. Dropping a handle without
/// releasing it returns the permits but leaves the files on disk.
#[derive(Debug)]
pub struct MediaHandle {
    pub(crate) post_id: String,
    pub(crate) dir: PathBuf,
    pub(crate) assets: Vec<LocalAsset>,
    pub(crate) failed: Vec<FailedAsset>,
    pub(crate) resident_bytes: u64,
    pub(crate) budget: Option<OwnedSemaphorePermit>,
    pub(crate) gate: Option<OwnedSemaphorePermit>,
}

impl MediaHandle {
    #[must_use]
    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    /// Directory owned by this handle. Derived files (frames, audio) written
    /// here are removed together with the downloads.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn assets(&self) -> &[LocalAsset] {
        &self.assets
    }

    pub fn assets_of(&self, kind: MediaKind) -> impl Iterator<Item = &LocalAsset> {
        self.assets.iter().filter(move |a| a.source.kind == kind)
    }

    #[must_use]
    pub fn failed(&self) -> &[FailedAsset] {
        &self.failed
    }

    /// Bytes charged against the disk budget.
    #[must_use]
    pub fn resident_bytes(&self) -> u64 {
        self.resident_bytes
    }
}
