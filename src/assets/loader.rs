use std::fmt;
use std::sync::Arc;

use futures::StreamExt as _;
use futures::stream::FuturesUnordered;
use tokio_util::sync::CancellationToken;

use crate::assets::decode::decode_image;
use crate::assets::source::{Fetcher, SourceRef};
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::surface::pixmap_from_premul_bytes;
use crate::session::epoch::EpochGuard;

/// A decoded, drawable photo. Immutable once created.
#[derive(Clone)]
pub struct ImageAsset {
    source: SourceRef,
    width: u32,
    height: u32,
    pixmap: Arc<vello_cpu::Pixmap>,
}

impl ImageAsset {
    pub(crate) fn from_pixmap(
        source: SourceRef,
        width: u32,
        height: u32,
        pixmap: Arc<vello_cpu::Pixmap>,
    ) -> Self {
        Self {
            source,
            width,
            height,
            pixmap,
        }
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    /// Width after decode (and any downscale), in pixels.
    pub fn natural_width(&self) -> u32 {
        self.width
    }

    /// Height after decode (and any downscale), in pixels.
    pub fn natural_height(&self) -> u32 {
        self.height
    }

    pub(crate) fn paint(&self) -> vello_cpu::Image {
        vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::clone(&self.pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        }
    }
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("source", &self.source)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Outcome of loading a whole image list.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Loaded photos, in input order, failures skipped.
    pub assets: Vec<ImageAsset>,
    /// `(input index, error)` for every photo that was dropped.
    pub failures: Vec<(usize, ReelError)>,
}

/// Fetches photos as raw bytes and decodes them locally.
#[derive(Clone, Debug)]
pub struct AssetLoader {
    fetcher: Arc<Fetcher>,
    max_decode_dimension: u32,
}

impl AssetLoader {
    pub fn new(fetcher: Arc<Fetcher>, max_decode_dimension: u32) -> Self {
        Self {
            fetcher,
            max_decode_dimension,
        }
    }

    /// Load one photo. Every failure is an [`ReelError::AssetLoad`].
    pub async fn load(&self, source: SourceRef) -> ReelResult<ImageAsset> {
        let bytes = self
            .fetcher
            .fetch(&source)
            .await
            .map_err(|e| ReelError::asset_load(format!("{source}: {e}")))?;

        let max = self.max_decode_dimension;
        let decoded = tokio::task::spawn_blocking(move || decode_image(&bytes, max))
            .await
            .map_err(|e| ReelError::asset_load(format!("{source}: decode task: {e}")))?
            .map_err(|e| ReelError::asset_load(format!("{source}: {e}")))?;

        let pixmap =
            pixmap_from_premul_bytes(&decoded.rgba8_premul, decoded.width, decoded.height)?;
        tracing::debug!(
            source = %source,
            width = decoded.width,
            height = decoded.height,
            "image loaded"
        );
        Ok(ImageAsset::from_pixmap(
            source,
            decoded.width,
            decoded.height,
            pixmap,
        ))
    }

    /// Load every source concurrently, keeping input order for the survivors.
    ///
    /// `on_settled(done, total)` runs as each load finishes, successful or not. Results that
    /// arrive after `epoch` went stale, or after `cancel` fired, are discarded and the call
    /// returns [`ReelError::Cancelled`].
    pub async fn load_all(
        &self,
        sources: Vec<SourceRef>,
        cancel: &CancellationToken,
        epoch: &EpochGuard,
        mut on_settled: impl FnMut(usize, usize),
    ) -> ReelResult<LoadReport> {
        let total = sources.len();
        let mut pending: FuturesUnordered<_> = sources
            .into_iter()
            .enumerate()
            .map(|(idx, src)| async move { (idx, self.load(src).await) })
            .collect();

        let mut slots: Vec<Option<ReelResult<ImageAsset>>> =
            std::iter::repeat_with(|| None).take(total).collect();
        let mut done = 0usize;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ReelError::Cancelled),
                next = pending.next() => next,
            };
            let Some((idx, res)) = next else {
                break;
            };
            if !epoch.is_current() {
                tracing::debug!(index = idx, "discarding image load from stale session");
                return Err(ReelError::Cancelled);
            }
            slots[idx] = Some(res);
            done += 1;
            on_settled(done, total);
        }

        let mut report = LoadReport::default();
        for (idx, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(Ok(asset)) => report.assets.push(asset),
                Some(Err(e)) => {
                    tracing::warn!(index = idx, error = %e, "dropping image");
                    report.failures.push((idx, e));
                }
                None => report
                    .failures
                    .push((idx, ReelError::asset_load("load never settled"))),
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/loader.rs"]
mod tests;
