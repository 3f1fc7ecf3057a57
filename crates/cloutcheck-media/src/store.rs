//! Per-post media lifecycle: acquire, release, and retention under a disk budget.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cloutcheck_core::{slugify, MediaKind, MediaRef, Post, RetentionPolicy};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, Notify, OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::error::MediaError;
use crate::fetch::MediaFetcher;
use crate::handle::{FailedAsset, LocalAsset, MediaHandle};

#[derive(Debug, Clone)]
pub struct MediaStoreConfig {
    pub root: PathBuf,
    pub policy: RetentionPolicy,
    pub ceiling_bytes: u64,
    /// How long a reservation may wait for in-flight posts to free budget.
    pub budget_wait: Duration,
}

/// Owns every media directory under `root` and arbitrates the disk budget.
///
/// Budget is a counting semaphore with one permit per byte. Under
/// [`RetentionPolicy::Immediate`] an additional single-permit gate is held from
/// the start of acquisition until release, so at most one post's media is on
/// disk at any time.
pub struct MediaStore<F> {
    fetcher: F,
    root: PathBuf,
    policy: RetentionPolicy,
    ceiling_bytes: u64,
    budget_wait: Duration,
    budget: Arc<Semaphore>,
    gate: Arc<Semaphore>,
    deferred: Mutex<Vec<MediaHandle>>,
    parked: Notify,
    resident: AtomicU64,
    peak: AtomicU64,
    seq: AtomicU64,
}

impl<F: MediaFetcher> MediaStore<F> {
    #[must_use]
    pub fn new(fetcher: F, config: MediaStoreConfig) -> Self {
        let capacity = usize::try_from(config.ceiling_bytes)
            .unwrap_or(usize::MAX)
            .min(Semaphore::MAX_PERMITS);
        Self {
            fetcher,
            root: config.root,
            policy: config.policy,
            ceiling_bytes: capacity as u64,
            budget_wait: config.budget_wait,
            budget: Arc::new(Semaphore::new(capacity)),
            gate: Arc::new(Semaphore::new(1)),
            deferred: Mutex::new(Vec::new()),
            parked: Notify::new(),
            resident: AtomicU64::new(0),
            peak: AtomicU64::new(0),
            seq: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Bytes currently on disk and charged to the budget.
    #[must_use]
    pub fn resident_bytes(&self) -> u64 {
        self.resident.load(Ordering::SeqCst)
    }

    /// Highest value [`Self::resident_bytes`] has reached.
    #[must_use]
    pub fn peak_resident_bytes(&self) -> u64 {
        self.peak.load(Ordering::SeqCst)
    }

    /// Number of handles parked until [`Self::flush_deferred`].
    pub async fn deferred_count(&self) -> usize {
        self.deferred.lock().await.len()
    }

    /// Download every media ref of `post` into a private directory.
    ///
    /// Individual asset failures are recorded on the handle; the call fails
    /// only when nothing could be fetched.
    ///
    /// # Errors
    ///
    /// - [`MediaError::Acquisition`] when every asset failed to download.
    /// - [`MediaError::ResourceExhausted`] when the budget cannot cover the
    ///   post (`oversize` when the post alone exceeds the ceiling).
    /// - [`MediaError::Io`] when the files cannot be written.
    pub async fn acquire(&self, post: &Post) -> Result<MediaHandle, MediaError> {
        let gate = if self.policy == RetentionPolicy::Immediate {
            Some(
                Arc::clone(&self.gate)
                    .acquire_owned()
                    .await
                    .map_err(|_| MediaError::ArbiterClosed)?,
            )
        } else {
            None
        };

        let fetched = futures::future::join_all(post.media.iter().map(|media| async move {
            (media, self.fetcher.fetch(&media.url).await)
        }))
        .await;

        let mut downloads: Vec<(&MediaRef, Vec<u8>)> = Vec::new();
        let mut failed = Vec::new();
        for (media, result) in fetched {
            match result {
                Ok(bytes) => downloads.push((media, bytes)),
                Err(e) => {
                    tracing::warn!(post = %post.id, url = %media.url, error = %e, "media download failed");
                    failed.push(FailedAsset {
                        source: media.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if downloads.is_empty() {
            return Err(MediaError::Acquisition {
                post_id: post.id.clone(),
                failed: failed.len(),
                reason: failed
                    .first()
                    .map_or_else(|| "post has no media".to_string(), |f| f.reason.clone()),
            });
        }

        let total: u64 = downloads.iter().map(|(_, b)| b.len() as u64).sum();
        let budget = self.reserve(total, 0).await?;

        let dir = self.handle_dir(&post.id);
        let assets = match write_assets(&dir, &downloads).await {
            Ok(assets) => assets,
            Err(e) => {
                remove_dir(&dir).await;
                return Err(e);
            }
        };

        let resident = self.resident.fetch_add(total, Ordering::SeqCst) + total;
        self.peak.fetch_max(resident, Ordering::SeqCst);
        tracing::debug!(
            post = %post.id,
            bytes = total,
            assets = assets.len(),
            failed = failed.len(),
            resident,
            "media acquired"
        );

        Ok(MediaHandle {
            post_id: post.id.clone(),
            dir,
            assets,
            failed,
            resident_bytes: total,
            budget: Some(budget),
            gate,
        })
    }

    /// Delete the handle's directory and return its budget. Returns the bytes freed.
    pub async fn release(&self, mut handle: MediaHandle) -> u64 {
        remove_dir(&handle.dir).await;
        let bytes = handle.resident_bytes;
        self.resident.fetch_sub(bytes, Ordering::SeqCst);
        handle.budget.take();
        handle.gate.take();
        tracing::debug!(post = %handle.post_id, bytes, "media released");
        bytes
    }

    /// Apply the retention policy to a handle whose analysis has finished.
    ///
    /// Returns the handle only under [`RetentionPolicy::None`], where the
    /// caller becomes responsible for cleanup.
    pub async fn finish(&self, handle: MediaHandle) -> Option<MediaHandle> {
        match self.policy {
            RetentionPolicy::Immediate => {
                self.release(handle).await;
                None
            }
            RetentionPolicy::EndOfBatch => {
                self.deferred.lock().await.push(handle);
                self.parked.notify_waiters();
                None
            }
            RetentionPolicy::None => Some(handle),
        }
    }

    /// Charge files derived from the handle's media (decoded frames, extracted
    /// audio) to the budget. Returns the bytes charged.
    ///
    /// On failure the files are deleted so the handle's footprint stays
    /// within what it holds permits for.
    ///
    /// # Errors
    ///
    /// - [`MediaError::ResourceExhausted`] when the budget cannot cover the
    ///   files (`oversize` when the handle plus the files exceed the ceiling).
    /// - [`MediaError::Io`] when a file cannot be inspected.
    pub async fn charge(&self, handle: &mut MediaHandle, files: &[PathBuf]) -> Result<u64, MediaError> {
        let mut bytes = 0u64;
        for path in files {
            match tokio::fs::metadata(path).await {
                Ok(meta) => bytes += meta.len(),
                Err(e) => {
                    remove_files(files).await;
                    return Err(MediaError::io(path, e));
                }
            }
        }
        if bytes == 0 {
            return Ok(0);
        }

        let permit = match self.reserve(bytes, handle.resident_bytes).await {
            Ok(permit) => permit,
            Err(e) => {
                remove_files(files).await;
                return Err(e);
            }
        };
        match handle.budget.as_mut() {
            Some(held) => held.merge(permit),
            None => handle.budget = Some(permit),
        }
        handle.resident_bytes += bytes;

        let resident = self.resident.fetch_add(bytes, Ordering::SeqCst) + bytes;
        self.peak.fetch_max(resident, Ordering::SeqCst);
        tracing::debug!(post = %handle.post_id, bytes, resident, "derived media charged");
        Ok(bytes)
    }

    /// Release every parked handle. Returns the bytes freed.
    pub async fn flush_deferred(&self) -> u64 {
        let parked = std::mem::take(&mut *self.deferred.lock().await);
        let mut freed = 0;
        for handle in parked {
            freed += self.release(handle).await;
        }
        if freed > 0 {
            tracing::info!(freed, "flushed deferred media");
        }
        freed
    }

    /// Reserve `bytes` on top of `held` bytes the caller already owns.
    async fn reserve(&self, bytes: u64, held: u64) -> Result<OwnedSemaphorePermit, MediaError> {
        let exhausted = |oversize| MediaError::ResourceExhausted {
            requested_bytes: bytes,
            ceiling_bytes: self.ceiling_bytes,
            oversize,
        };

        if held.saturating_add(bytes) > self.ceiling_bytes {
            return Err(exhausted(true));
        }
        let permits = u32::try_from(bytes).map_err(|_| exhausted(true))?;
        let deferring = self.policy == RetentionPolicy::EndOfBatch;
        let deadline = tokio::time::Instant::now() + self.budget_wait;

        loop {
            // Registered before trying so a handle parked in between still wakes us.
            let parked = self.parked.notified();
            match Arc::clone(&self.budget).try_acquire_many_owned(permits) {
                Ok(permit) => return Ok(permit),
                Err(TryAcquireError::Closed) => return Err(MediaError::ArbiterClosed),
                Err(TryAcquireError::NoPermits) => {}
            }

            // Parked media is only freed early when it stands in the way.
            if deferring && self.flush_deferred().await > 0 {
                continue;
            }

            tracing::debug!(bytes, resident = self.resident_bytes(), "waiting for disk budget");
            tokio::select! {
                permit = Arc::clone(&self.budget).acquire_many_owned(permits) => {
                    return permit.map_err(|_| MediaError::ArbiterClosed);
                }
                () = parked, if deferring => {}
                () = tokio::time::sleep_until(deadline) => {
                    tracing::warn!(
                        bytes,
                        ceiling = self.ceiling_bytes,
                        resident = self.resident_bytes(),
                        "disk budget wait timed out"
                    );
                    return Err(exhausted(false));
                }
            }
        }
    }

    fn handle_dir(&self, post_id: &str) -> PathBuf {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let digest = format!("{:x}", Sha256::digest(post_id.as_bytes()));
        let mut slug = slugify(post_id);
        slug.truncate(32);
        self.root
            .join(format!("{seq:05}-{slug}-{}", &digest[..12]))
    }
}

async fn write_assets(
    dir: &Path,
    downloads: &[(&MediaRef, Vec<u8>)],
) -> Result<Vec<LocalAsset>, MediaError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| MediaError::io(dir, e))?;

    let mut assets = Vec::with_capacity(downloads.len());
    for (idx, (media, bytes)) in downloads.iter().enumerate() {
        let path = dir.join(format!("{idx:02}.{}", extension_for(media)));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| MediaError::io(&path, e))?;
        assets.push(LocalAsset {
            source: (*media).clone(),
            path,
            bytes: bytes.len() as u64,
        });
    }
    Ok(assets)
}

async fn remove_dir(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to remove media directory");
        }
    }
}

async fn remove_files(files: &[PathBuf]) {
    for path in files {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove derived file");
            }
        }
    }
}

fn extension_for(media: &MediaRef) -> &'static str {
    let path = media.url.split(['?', '#']).next().unwrap_or_default();
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match (media.kind, ext.as_str()) {
        (MediaKind::Image, "png") => "png",
        (MediaKind::Image, "webp") => "webp",
        (MediaKind::Image, "gif") => "gif",
        (MediaKind::Image, _) => "jpg",
        (MediaKind::Video, "mov") => "mov",
        (MediaKind::Video, "webm") => "webm",
        (MediaKind::Video, _) => "mp4",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(url: &str, kind: MediaKind) -> MediaRef {
        MediaRef {
            url: url.to_string(),
            kind,
        }
    }

    #[test]
    fn extension_follows_url_and_kind() {
        assert_eq!(
            extension_for(&media("https://cdn/a.PNG?sig=1", MediaKind::Image)),
            "png"
        );
        assert_eq!(
            extension_for(&media("https://cdn/a/b?x.mp4", MediaKind::Image)),
            "jpg"
        );
        assert_eq!(
            extension_for(&media("https://cdn/v.webm", MediaKind::Video)),
            "webm"
        );
        assert_eq!(
            extension_for(&media("https://cdn/v", MediaKind::Video)),
            "mp4"
        );
    }
}
