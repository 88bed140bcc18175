use super::*;
use crate::session::resources::ResourceLedger;

fn frame() -> FrameRGBA {
    FrameRGBA {
        width: 2,
        height: 2,
        data: vec![0; 16],
        premultiplied: true,
    }
}

fn video(ledger: &Arc<ResourceLedger>) -> SurfaceCapture {
    SurfaceCapture::new(
        Fps::new(10, 1).unwrap(),
        MediaTrack::new(TrackKind::Video, ledger),
    )
}

fn audio(ledger: &Arc<ResourceLedger>, flowing: bool) -> AudioCapture {
    let mut track = MediaTrack::new(TrackKind::Audio, ledger);
    if flowing {
        track.mark_flowing();
    }
    AudioCapture {
        track,
        spec: AudioSpec {
            sample_rate: 48_000,
            channels: 2,
        },
    }
}

#[test]
fn combine_rejects_audio_that_is_not_flowing() {
    let ledger = ResourceLedger::new();
    let res = combine(video(&ledger), Some(audio(&ledger, false)));
    assert!(matches!(res, Err(ReelError::Validation(_))));
}

#[test]
fn video_only_stream_has_no_audio() {
    let ledger = ResourceLedger::new();
    let mut stream = combine(video(&ledger), None).unwrap();
    assert!(!stream.has_audio());
    stream.push_audio(vec![0.1, 0.2]);
    stream.push_video_frame(frame(), Duration::ZERO);
    let samples = stream.drain();
    assert_eq!(samples.len(), 1);
    assert!(matches!(samples[0], MediaSample::Video { .. }));
}

#[test]
fn samples_keep_capture_order() {
    let ledger = ResourceLedger::new();
    let mut stream = combine(video(&ledger), Some(audio(&ledger, true))).unwrap();
    assert_eq!(stream.audio_spec().map(|s| s.sample_rate), Some(48_000));

    stream.push_audio(vec![0.5, 0.5]);
    stream.push_video_frame(frame(), Duration::ZERO);
    stream.push_audio(Vec::new());
    stream.push_audio(vec![0.25, 0.25]);
    stream.push_video_frame(frame(), Duration::from_millis(100));

    let kinds: Vec<&str> = stream
        .drain()
        .iter()
        .map(|s| match s {
            MediaSample::Video { .. } => "v",
            MediaSample::Audio { .. } => "a",
        })
        .collect();
    assert_eq!(kinds, vec!["a", "v", "a", "v"]);
    assert!(stream.drain().is_empty());

    stream.flush_video_to(Duration::from_millis(500));
    assert_eq!(stream.drain().len(), 3);
    assert_eq!(stream.video_frames(), 5);
}

#[test]
fn detach_stops_every_track() {
    let ledger = ResourceLedger::new();
    let mut stream = combine(video(&ledger), Some(audio(&ledger, true))).unwrap();
    assert_eq!(ledger.snapshot().live_media_tracks, 2);
    stream.push_audio(vec![1.0, 1.0]);

    stream.detach();
    stream.detach();
    assert!(stream.is_detached());
    assert!(stream.drain().is_empty());
    assert_eq!(ledger.snapshot().live_media_tracks, 0);

    stream.push_video_frame(frame(), Duration::ZERO);
    assert!(stream.drain().is_empty());
}
