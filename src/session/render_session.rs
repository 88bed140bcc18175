use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::assets::loader::AssetLoader;
use crate::assets::source::SourceRef;
use crate::audio::graph::{AudioGraph, AudioGraphBuilder, AudioTrack};
use crate::audio::preview::make_preview;
use crate::config::SessionConfig;
use crate::encode::encoder::{EncodedOutput, Encoder, EncoderSettings};
use crate::encode::format::{ChosenFormat, CodecNegotiator};
use crate::encode::runtime::{MediaRuntime, RecorderKill};
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::clock::FrameClock;
use crate::render::compositor::{Compositor, TickOutcome};
use crate::session::epoch::EpochGuard;
use crate::session::lock;
use crate::session::progress::ProgressReporter;
use crate::session::resources::ResourceLedger;
use crate::session::state::SessionState;
use crate::stream::capture::SurfaceCapture;
use crate::stream::multiplex::{AudioCapture, CombinedStream, combine};
use crate::stream::track::{MediaTrack, TrackKind};

/// What to render: photos in play order and at most one music track.
#[derive(Clone, Debug, Default)]
pub struct RenderRequest {
    pub images: Vec<SourceRef>,
    pub audio: Option<AudioTrack>,
}

/// Recoverable events the caller should hear about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionNotice {
    /// A photo failed to load and was left out.
    AssetDropped { index: usize, reason: String },
    /// The music track could not be set up; the output is silent.
    AudioUnavailable { reason: String },
}

/// Every native resource a session holds once it is past loading.
#[derive(Default)]
pub(crate) struct SessionResources {
    compositor: Option<Compositor>,
    graph: Option<AudioGraph>,
    stream: Option<CombinedStream>,
    encoder: Option<Encoder>,
    released: bool,
}

impl SessionResources {
    /// Tear everything down. Runs its body at most once; later calls return `false`.
    pub(crate) fn release_all(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        if let Some(enc) = self.encoder.as_mut() {
            enc.abort();
        }
        if let Some(graph) = self.graph.as_mut() {
            graph.close();
        }
        if let Some(stream) = self.stream.as_mut() {
            stream.detach();
        }
        if let Some(comp) = self.compositor.as_mut() {
            comp.release();
        }
        self.encoder = None;
        self.graph = None;
        self.stream = None;
        self.compositor = None;
        true
    }
}

/// State shared between a running session and its handles.
pub(crate) struct SessionShared {
    state: Mutex<SessionState>,
    resources: Mutex<SessionResources>,
    notices: Mutex<Vec<SessionNotice>>,
    // Outside `resources`: a recorder blocked in a write or in `finish` may hold that lock.
    recorder_kill: Mutex<Option<RecorderKill>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) epoch: EpochGuard,
    pub(crate) progress: ProgressReporter,
    finished: watch::Sender<bool>,
}

impl SessionShared {
    pub(crate) fn new(epoch: EpochGuard, progress: ProgressReporter) -> Self {
        Self {
            state: Mutex::new(SessionState::Idle),
            resources: Mutex::new(SessionResources::default()),
            notices: Mutex::new(Vec::new()),
            recorder_kill: Mutex::new(None),
            cancel: CancellationToken::new(),
            epoch,
            progress,
            finished: watch::channel(false).0,
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    pub(crate) fn notices(&self) -> Vec<SessionNotice> {
        lock(&self.notices).clone()
    }

    pub(crate) fn finished(&self) -> watch::Receiver<bool> {
        self.finished.subscribe()
    }

    fn notify(&self, notice: SessionNotice) {
        lock(&self.notices).push(notice);
    }

    fn transition(&self, next: SessionState) -> ReelResult<()> {
        let mut st = lock(&self.state);
        if *st == SessionState::Aborted {
            return Err(ReelError::Cancelled);
        }
        *st = st.transition(next)?;
        tracing::debug!(state = %next, "session state");
        Ok(())
    }

    /// Move to `terminal` unless already terminal, then release. Returns the final state.
    fn terminate(&self, terminal: SessionState) -> SessionState {
        let final_state = {
            let mut st = lock(&self.state);
            if !st.is_terminal() {
                *st = terminal;
            }
            *st
        };
        if lock(&self.resources).release_all() {
            tracing::debug!(state = %final_state, "session resources released");
        }
        final_state
    }

    /// Synchronous cancellation: once this returns, every resource is released and any work
    /// still in flight for this session is stale.
    pub(crate) fn cancel(&self) {
        self.epoch.revoke();
        self.cancel.cancel();
        let kill = lock(&self.recorder_kill).take();
        if let Some(kill) = kill {
            kill.kill();
        }
        let state = self.terminate(SessionState::Aborted);
        tracing::info!(epoch = self.epoch.epoch(), state = %state, "session cancelled");
    }

    fn with_resources<T>(
        &self,
        f: impl FnOnce(&mut SessionResources) -> ReelResult<T>,
    ) -> ReelResult<T> {
        let mut res = lock(&self.resources);
        if res.released {
            return Err(ReelError::Cancelled);
        }
        f(&mut res)
    }
}

/// Marks the session finished however the task ends, including panics and task abort.
struct FinishGuard(Arc<SessionShared>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        if !self.0.state().is_terminal() {
            self.0.terminate(SessionState::Failed);
        }
        self.0.finished.send_replace(true);
    }
}

/// One end-to-end run from photo list to encoded artifact.
pub(crate) struct RenderSession {
    pub(crate) cfg: SessionConfig,
    pub(crate) request: RenderRequest,
    pub(crate) runtime: Arc<dyn MediaRuntime>,
    pub(crate) loader: AssetLoader,
    pub(crate) audio_builder: AudioGraphBuilder,
    pub(crate) ledger: Arc<ResourceLedger>,
    pub(crate) shared: Arc<SessionShared>,
}

impl RenderSession {
    #[tracing::instrument(
        name = "render_session",
        skip_all,
        fields(epoch = self.shared.epoch.epoch(), images = self.request.images.len())
    )]
    pub(crate) async fn run(self) -> ReelResult<EncodedOutput> {
        let _guard = FinishGuard(Arc::clone(&self.shared));
        let res = self.drive().await;
        self.finish(res)
    }

    fn finish(&self, res: ReelResult<EncodedOutput>) -> ReelResult<EncodedOutput> {
        let shared = &self.shared;
        match res {
            Ok(out) => {
                if shared.transition(SessionState::Complete).is_err() {
                    shared.terminate(SessionState::Aborted);
                    return Err(ReelError::Cancelled);
                }
                shared.terminate(SessionState::Complete);
                shared.progress.complete();
                tracing::info!(
                    mime = %out.mime_type,
                    bytes = out.bytes.len(),
                    duration_ms = out.nominal_duration.as_millis() as u64,
                    "session complete"
                );
                Ok(out)
            }
            Err(e) if e.is_cancelled() || shared.state() == SessionState::Aborted => {
                shared.terminate(SessionState::Aborted);
                Err(ReelError::Cancelled)
            }
            Err(e) => {
                tracing::error!(error = %e, "session failed");
                shared.terminate(SessionState::Failed);
                Err(e)
            }
        }
    }

    async fn drive(&self) -> ReelResult<EncodedOutput> {
        let shared = &self.shared;
        let cancel = &shared.cancel;
        shared.transition(SessionState::Loading)?;

        // Fatal before any fetch or draw.
        let format = CodecNegotiator::new(self.runtime.as_ref())
            .negotiate(&self.cfg.codec_preferences)?;
        tracing::info!(format = %format, "encoding target chosen");

        let requested = self.request.images.len();
        let (report, audio) = tokio::join!(
            self.loader.load_all(
                self.request.images.clone(),
                cancel,
                &shared.epoch,
                |done, total| shared.progress.loading(done, total),
            ),
            self.build_audio(),
        );
        let report = report?;
        if !shared.epoch.is_current() || cancel.is_cancelled() {
            return Err(ReelError::Cancelled);
        }

        for (index, err) in &report.failures {
            shared.notify(SessionNotice::AssetDropped {
                index: *index,
                reason: err.to_string(),
            });
        }
        let mut graph = match audio {
            None => None,
            Some(Ok(g)) => Some(g),
            Some(Err(e)) if e.is_cancelled() => return Err(e),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "continuing without audio");
                shared.notify(SessionNotice::AudioUnavailable {
                    reason: e.to_string(),
                });
                None
            }
        };
        if report.assets.is_empty() {
            return Err(ReelError::EmptyAssetSet { requested });
        }
        shared.progress.loading(1, 1);

        let compositor = Compositor::new(report.assets, &self.cfg)?;
        let total = compositor.total_duration();
        tracing::info!(
            images = compositor.image_count(),
            dropped = report.failures.len(),
            total_ms = total.as_millis() as u64,
            audio = graph.is_some(),
            "assets ready"
        );

        let video = SurfaceCapture::new(self.cfg.fps, MediaTrack::new(TrackKind::Video, &self.ledger));
        let audio_capture = graph.as_mut().map(|g| {
            g.start();
            AudioCapture {
                track: g.capture_track(&self.ledger),
                spec: g.spec(),
            }
        });
        let stream = combine(video, audio_capture)?;
        shared.with_resources(|r| {
            r.compositor = Some(compositor);
            r.graph = graph;
            r.stream = Some(stream);
            Ok(())
        })?;
        shared.transition(SessionState::Ready)?;

        self.start_encoder(&format)?;
        shared.transition(SessionState::Recording)?;

        let mut clock = FrameClock::start(self.cfg.clock, self.cfg.fps);
        loop {
            let elapsed = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ReelError::Cancelled),
                elapsed = clock.tick() => elapsed,
            };
            // Drawing and recorder writes block; keep them off the async workers.
            let tick_shared = Arc::clone(shared);
            let done = tokio::task::spawn_blocking(move || {
                tick_shared.with_resources(|r| tick(r, elapsed, total))
            })
            .await
            .map_err(worker_failed)??;
            shared.progress.recording(elapsed, total);
            if done {
                break;
            }
        }
        tracing::debug!(ticks = clock.ticks(), "clock reached total duration");

        shared.transition(SessionState::Finalizing)?;
        // Out of the shared resources: cancel reaches this recorder through its kill handle.
        let mut encoder =
            shared.with_resources(|r| r.encoder.take().ok_or(ReelError::Cancelled))?;
        let mut finalize = tokio::task::spawn_blocking(move || encoder.stop());
        tokio::select! {
            biased;
            res = &mut finalize => res.map_err(worker_failed)?,
            _ = cancel.cancelled() => {
                let _ = finalize.await;
                Err(ReelError::Cancelled)
            }
        }
    }

    async fn build_audio(&self) -> Option<ReelResult<AudioGraph>> {
        let track = self.request.audio.as_ref()?;
        let preview = make_preview(self.cfg.audio_preview, self.cfg.clock);
        let res = tokio::select! {
            biased;
            _ = self.shared.cancel.cancelled() => Err(ReelError::Cancelled),
            res = self.audio_builder.build(track, preview) => res,
        };
        if res.is_ok() && !self.shared.epoch.is_current() {
            tracing::debug!("discarding audio graph from stale session");
            return Some(Err(ReelError::Cancelled));
        }
        Some(res)
    }

    fn start_encoder(&self, format: &ChosenFormat) -> ReelResult<()> {
        let settings = EncoderSettings {
            canvas: self.cfg.canvas,
            chunk_interval: self.cfg.chunk_interval(),
            background_rgba: self.cfg.background_rgba,
        };
        let runtime = Arc::clone(&self.runtime);
        self.shared.with_resources(|r| {
            let Some(stream) = r.stream.as_ref() else {
                return Err(ReelError::Cancelled);
            };
            let mut enc = Encoder::new(runtime);
            let res = enc.start(stream, format, settings);
            *lock(&self.shared.recorder_kill) = enc.kill_handle();
            // Keep the failed encoder so teardown sees it too.
            r.encoder = Some(enc);
            res
        })
    }
}

fn worker_failed(e: tokio::task::JoinError) -> ReelError {
    ReelError::Other(anyhow::anyhow!("session worker task failed: {e}"))
}

/// One compositor tick: audio first, then the drawn frame, then hand both to the encoder.
///
/// Returns `true` once the programme is complete and the last slots are flushed.
fn tick(r: &mut SessionResources, elapsed: Duration, total: Duration) -> ReelResult<bool> {
    let (Some(comp), Some(stream), Some(enc)) =
        (r.compositor.as_mut(), r.stream.as_mut(), r.encoder.as_mut())
    else {
        return Err(ReelError::Cancelled);
    };
    if let Some(graph) = r.graph.as_mut() {
        stream.push_audio(graph.pump_to(elapsed.min(total)));
    }
    let done = match comp.tick(elapsed) {
        TickOutcome::Drawn(_) => {
            stream.push_video_frame(comp.snapshot(), elapsed);
            false
        }
        TickOutcome::Complete => {
            stream.flush_video_to(total);
            true
        }
    };
    enc.feed(stream.drain())?;
    Ok(done)
}
