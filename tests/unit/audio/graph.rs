use std::sync::Mutex;

use super::*;
use crate::audio::decode::{RawF32Decoder, f32le_bytes};
use crate::config::FetchConfig;

fn ramp_pcm(frames: usize) -> AudioPcm {
    let mut samples = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let v = (i + 1) as f32;
        samples.push(v);
        samples.push(-v);
    }
    AudioPcm {
        sample_rate: MIX_SAMPLE_RATE,
        channels: MIX_CHANNELS,
        interleaved_f32: samples,
    }
}

fn builder(ledger: &Arc<ResourceLedger>) -> AudioGraphBuilder {
    let fetcher = Arc::new(Fetcher::new(&FetchConfig::default()).unwrap());
    AudioGraphBuilder::new(fetcher, Arc::new(RawF32Decoder), Arc::clone(ledger))
}

fn ramp_track(frames: usize) -> AudioTrack {
    let pcm = ramp_pcm(frames);
    AudioTrack::new(
        "ramp",
        "Ramp",
        SourceRef::blob("ramp.f32", f32le_bytes(&pcm.interleaved_f32)),
    )
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<f32>>>);

impl PreviewSink for Recorder {
    fn write(&mut self, samples: &[f32]) -> ReelResult<()> {
        self.0.lock().unwrap().extend_from_slice(samples);
        Ok(())
    }
}

struct Broken;

impl PreviewSink for Broken {
    fn write(&mut self, _samples: &[f32]) -> ReelResult<()> {
        Err(ReelError::audio_setup("speaker unplugged"))
    }
}

#[test]
fn looping_source_wraps_without_gap() {
    let mut src = LoopingSource::new(Arc::new(ramp_pcm(10)));
    src.start();
    let a = src.render(7);
    let b = src.render(18);
    let all: Vec<f32> = a.into_iter().chain(b).collect();
    assert_eq!(all.len(), 25 * 2);
    for (i, frame) in all.chunks_exact(2).enumerate() {
        let expected = ((i % 10) + 1) as f32;
        assert_eq!(frame, &[expected, -expected], "frame {i}");
    }
    assert_eq!(src.loops_completed(), 2);
}

#[test]
fn stopped_source_is_silent() {
    let mut src = LoopingSource::new(Arc::new(ramp_pcm(4)));
    assert!(src.render(3).iter().all(|s| *s == 0.0));
}

#[tokio::test]
async fn build_opens_one_context_and_close_releases_it() {
    let ledger = ResourceLedger::new();
    let mut graph = builder(&ledger)
        .build(&ramp_track(480), Box::new(NullPreview))
        .await
        .unwrap();
    assert_eq!(graph.decoded_duration(), Duration::from_millis(10));
    assert_eq!(ledger.snapshot().live_audio_contexts, 1);

    graph.close();
    graph.close();
    assert!(graph.is_closed());
    assert_eq!(ledger.snapshot().live_audio_contexts, 0);
}

#[tokio::test]
async fn build_failure_is_audio_setup_and_holds_nothing() {
    let ledger = ResourceLedger::new();
    let empty = AudioTrack::new("e", "Empty", SourceRef::blob("empty", Vec::<u8>::new()));
    let err = builder(&ledger)
        .build(&empty, Box::new(NullPreview))
        .await
        .unwrap_err();
    assert!(matches!(err, ReelError::AudioSetup(_)));

    let misaligned = AudioTrack::new("m", "Odd", SourceRef::blob("odd", vec![0u8; 3]));
    let err = builder(&ledger)
        .build(&misaligned, Box::new(NullPreview))
        .await
        .unwrap_err();
    assert!(matches!(err, ReelError::AudioSetup(_)));
    assert!(ledger.snapshot().is_quiescent());
    assert_eq!(ledger.snapshot().peak_audio_contexts, 0);
}

#[tokio::test]
async fn pump_feeds_preview_and_capture_identically() {
    let ledger = ResourceLedger::new();
    let preview = Recorder::default();
    let mut graph = builder(&ledger)
        .build(&ramp_track(480), Box::new(preview.clone()))
        .await
        .unwrap();

    // Not started yet: nothing flows.
    assert!(graph.pump_to(Duration::from_millis(5)).is_empty());
    let idle_track = graph.capture_track(&ledger);
    assert!(!idle_track.is_flowing());

    graph.start();
    let track = graph.capture_track(&ledger);
    assert!(track.is_flowing());

    let mut captured = graph.pump_to(Duration::from_millis(15));
    captured.extend(graph.pump_to(Duration::from_millis(25)));
    // Same timestamp again renders nothing.
    assert!(graph.pump_to(Duration::from_millis(25)).is_empty());

    assert_eq!(captured.len(), 1_200 * 2);
    assert_eq!(*preview.0.lock().unwrap(), captured);
    assert_eq!(graph.loops_completed(), 2);
}

#[tokio::test]
async fn failing_preview_is_disconnected_but_capture_continues() {
    let ledger = ResourceLedger::new();
    let mut graph = builder(&ledger)
        .build(&ramp_track(48), Box::new(Broken))
        .await
        .unwrap();
    graph.start();
    assert_eq!(graph.pump_to(Duration::from_millis(1)).len(), 96);
    assert_eq!(graph.pump_to(Duration::from_millis(2)).len(), 96);
}
