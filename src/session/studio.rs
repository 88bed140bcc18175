use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::assets::loader::AssetLoader;
use crate::assets::source::Fetcher;
use crate::audio::decode::{FfmpegPcmDecoder, PcmDecoder};
use crate::audio::graph::AudioGraphBuilder;
use crate::config::SessionConfig;
use crate::encode::encoder::EncodedOutput;
use crate::encode::runtime::MediaRuntime;
use crate::foundation::error::{ReelError, ReelResult};
use crate::session::epoch::EpochGuard;
use crate::session::progress::ProgressReporter;
use crate::session::render_session::{RenderRequest, RenderSession, SessionNotice, SessionShared};
use crate::session::resources::{LedgerSnapshot, ResourceLedger};
use crate::session::state::SessionState;

/// Caller-side view of one session.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<SessionShared>,
}

impl SessionHandle {
    pub fn epoch(&self) -> u64 {
        self.shared.epoch.epoch()
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Abort the session. Every resource is released before this returns; partial output is
    /// discarded. No-op on a finished session.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// 0..=100, never decreasing.
    pub fn progress(&self) -> watch::Receiver<u8> {
        self.shared.progress.subscribe()
    }

    /// Recoverable events so far (dropped photos, missing audio).
    pub fn notices(&self) -> Vec<SessionNotice> {
        self.shared.notices()
    }

    pub fn is_finished(&self) -> bool {
        *self.shared.finished().borrow()
    }

    /// Resolve once the session task has ended, whatever the outcome.
    pub async fn finished(&self) {
        let mut rx = self.shared.finished();
        let _ = rx.wait_for(|done| *done).await;
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("epoch", &self.epoch())
            .field("state", &self.state())
            .finish()
    }
}

/// A started session: its handle plus the task producing the artifact.
#[derive(Debug)]
pub struct SessionTicket {
    pub handle: SessionHandle,
    pub join: JoinHandle<ReelResult<EncodedOutput>>,
}

impl SessionTicket {
    /// Wait for the artifact.
    pub async fn wait(self) -> ReelResult<EncodedOutput> {
        self.join
            .await
            .map_err(|e| ReelError::Other(anyhow::anyhow!("session task failed: {e}")))?
    }
}

/// Owner of the one active session.
///
/// Starting a session cancels the previous one and waits for it to wind down first, so at most
/// one session holds native resources at any time.
pub struct Studio {
    cfg: SessionConfig,
    runtime: Arc<dyn MediaRuntime>,
    fetcher: Arc<Fetcher>,
    decoder: Arc<dyn PcmDecoder>,
    ledger: Arc<ResourceLedger>,
    epochs: Arc<AtomicU64>,
    active: Option<SessionHandle>,
}

impl Studio {
    pub fn new(cfg: SessionConfig, runtime: Arc<dyn MediaRuntime>) -> ReelResult<Self> {
        cfg.validate()?;
        let fetcher = Arc::new(Fetcher::new(&cfg.fetch)?);
        Ok(Self {
            cfg,
            runtime,
            fetcher,
            decoder: Arc::new(FfmpegPcmDecoder),
            ledger: ResourceLedger::new(),
            epochs: Arc::new(AtomicU64::new(0)),
            active: None,
        })
    }

    /// Replace the audio decoder (defaults to the system `ffmpeg`).
    pub fn with_pcm_decoder(mut self, decoder: Arc<dyn PcmDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Fetcher) -> Self {
        self.fetcher = Arc::new(fetcher);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.cfg
    }

    pub fn resources(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    pub fn active(&self) -> Option<&SessionHandle> {
        self.active.as_ref()
    }

    /// Cancel the active session, if any, and wait for its task to end.
    pub async fn cancel_active(&mut self) {
        if let Some(prev) = self.active.take() {
            prev.cancel();
            prev.finished().await;
        }
    }

    /// Tear down any previous session, then spawn a new one on the current tokio runtime.
    #[tracing::instrument(skip_all, fields(images = request.images.len(), audio = request.audio.is_some()))]
    pub async fn start(&mut self, request: RenderRequest) -> ReelResult<SessionTicket> {
        self.cancel_active().await;

        let epoch = EpochGuard::begin(&self.epochs);
        let (progress, _rx) = ProgressReporter::new(self.cfg.loading_progress_allowance);
        let shared = Arc::new(SessionShared::new(epoch, progress));
        let session = RenderSession {
            cfg: self.cfg.clone(),
            request,
            runtime: Arc::clone(&self.runtime),
            loader: AssetLoader::new(Arc::clone(&self.fetcher), self.cfg.max_decode_dimension),
            audio_builder: AudioGraphBuilder::new(
                Arc::clone(&self.fetcher),
                Arc::clone(&self.decoder),
                Arc::clone(&self.ledger),
            ),
            ledger: Arc::clone(&self.ledger),
            shared: Arc::clone(&shared),
        };
        let handle = SessionHandle { shared };
        tracing::info!(epoch = handle.epoch(), "session starting");
        let join = tokio::spawn(session.run());
        self.active = Some(handle.clone());
        Ok(SessionTicket { handle, join })
    }
}

impl Drop for Studio {
    fn drop(&mut self) {
        if let Some(prev) = self.active.take() {
            prev.cancel();
        }
    }
}
