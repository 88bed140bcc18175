use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique path under the system temp dir.
pub(crate) fn temp_path(prefix: &str, ext: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "slidereel_{prefix}_{}_{}_{}.{ext}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
        TEMP_SEQ.fetch_add(1, Ordering::Relaxed),
    ))
}

/// Removes the file when dropped.
#[derive(Debug, Default)]
pub(crate) struct TempFileGuard(pub(crate) Option<PathBuf>);

impl TempFileGuard {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self(Some(path))
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}
