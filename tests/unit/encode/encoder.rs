use super::*;
use crate::encode::runtime::InMemoryRuntime;
use crate::foundation::core::FrameIndex;
use crate::render::frame::FrameRGBA;
use crate::session::resources::ResourceLedger;
use crate::stream::capture::SurfaceCapture;
use crate::stream::multiplex::{AudioCapture, combine};
use crate::stream::track::{AudioSpec, MediaTrack, TrackKind};

fn settings() -> EncoderSettings {
    EncoderSettings {
        canvas: Canvas {
            width: 2,
            height: 2,
        },
        chunk_interval: Duration::from_millis(100),
        background_rgba: [0, 0, 0, 255],
    }
}

fn stream(ledger: &Arc<ResourceLedger>, with_audio: bool) -> CombinedStream {
    let video = SurfaceCapture::new(
        Fps::new(10, 1).unwrap(),
        MediaTrack::new(TrackKind::Video, ledger),
    );
    let audio = with_audio.then(|| {
        let mut track = MediaTrack::new(TrackKind::Audio, ledger);
        track.mark_flowing();
        AudioCapture {
            track,
            spec: AudioSpec {
                sample_rate: 48_000,
                channels: 2,
            },
        }
    });
    combine(video, audio).unwrap()
}

fn video_samples(range: std::ops::Range<u64>) -> Vec<MediaSample> {
    range
        .map(|i| MediaSample::Video {
            index: FrameIndex(i),
            frame: Arc::new(FrameRGBA {
                width: 2,
                height: 2,
                data: vec![i as u8; 16],
                premultiplied: true,
            }),
        })
        .collect()
}

fn webm_vp9_opus() -> ChosenFormat {
    ChosenFormat::Preferred(MimeType::parse("video/webm;codecs=vp9,opus").unwrap())
}

#[test]
fn full_lifecycle_assembles_chunks_in_order() {
    let ledger = ResourceLedger::new();
    let rt = InMemoryRuntime::new();
    let mut enc = Encoder::new(Arc::new(rt.clone()));
    assert_eq!(enc.state(), EncoderState::Idle);

    enc.start(&stream(&ledger, false), &webm_vp9_opus(), settings())
        .unwrap();
    assert_eq!(enc.state(), EncoderState::Recording);
    // The header chunk exists before any frame is fed.
    assert_eq!(enc.chunk_count(), 1);

    enc.feed(video_samples(0..4)).unwrap();
    enc.feed(video_samples(4..10)).unwrap();
    let out = enc.stop().unwrap();
    assert_eq!(enc.state(), EncoderState::Complete);

    assert!(out.bytes.starts_with(b"SLRL"));
    assert_eq!(out.mime_type, "video/webm;codecs=vp9");
    assert_eq!(out.frame_count, 10);
    assert_eq!(out.nominal_duration, Duration::from_secs(1));

    // Video records follow the header in index order.
    let header_len = b"SLRL".len() + "video/webm;codecs=vp9".len() + 1;
    let body = &out.bytes[header_len..];
    assert_eq!(body.len(), 10 * 17);
    for (i, rec) in body.chunks_exact(17).enumerate() {
        assert_eq!(rec[0], b'V');
        assert_eq!(u64::from_le_bytes(rec[1..9].try_into().unwrap()), i as u64);
    }
    assert_eq!(rt.log().finished, 1);
}

#[test]
fn audio_streams_keep_audio_codec_in_mime() {
    let ledger = ResourceLedger::new();
    let rt = InMemoryRuntime::new();
    let mut enc = Encoder::new(Arc::new(rt.clone()));
    enc.start(&stream(&ledger, true), &webm_vp9_opus(), settings())
        .unwrap();
    enc.feed(vec![MediaSample::Audio {
        samples: vec![0.0; 4],
    }])
    .unwrap();
    let out = enc.stop().unwrap();
    assert_eq!(out.mime_type, "video/webm;codecs=vp9,opus");
    assert_eq!(rt.log().audio.len(), 4);
    assert!(rt.log().last_spec.unwrap().audio.is_some());
}

#[test]
fn illegal_transitions_are_rejected() {
    let ledger = ResourceLedger::new();
    let mut enc = Encoder::new(Arc::new(InMemoryRuntime::new()));
    assert!(matches!(enc.stop(), Err(ReelError::InvalidTransition(_))));
    assert!(matches!(
        enc.feed(Vec::new()),
        Err(ReelError::InvalidTransition(_))
    ));

    let s = stream(&ledger, false);
    enc.start(&s, &webm_vp9_opus(), settings()).unwrap();
    assert!(matches!(
        enc.start(&s, &webm_vp9_opus(), settings()),
        Err(ReelError::InvalidTransition(_))
    ));
}

#[test]
fn recorder_error_moves_to_failed_and_aborts() {
    let ledger = ResourceLedger::new();
    let rt = InMemoryRuntime::new().failing_after(3);
    let mut enc = Encoder::new(Arc::new(rt.clone()));
    enc.start(&stream(&ledger, false), &webm_vp9_opus(), settings())
        .unwrap();
    let err = enc.feed(video_samples(0..5)).unwrap_err();
    assert!(matches!(err, ReelError::Encode(_)));
    assert_eq!(enc.state(), EncoderState::Failed);
    assert_eq!(enc.chunk_count(), 0);
    assert_eq!(rt.log().aborted, 1);
}

#[test]
fn start_failure_moves_to_failed() {
    let ledger = ResourceLedger::new();
    let rt = InMemoryRuntime::with_supported(&[]);
    let mut enc = Encoder::new(Arc::new(rt));
    let err = enc
        .start(&stream(&ledger, false), &webm_vp9_opus(), settings())
        .unwrap_err();
    assert!(matches!(err, ReelError::EncoderUnsupported(_)));
    assert_eq!(enc.state(), EncoderState::Failed);
}

#[test]
fn abort_discards_partial_output_once() {
    let ledger = ResourceLedger::new();
    let rt = InMemoryRuntime::new();
    let mut enc = Encoder::new(Arc::new(rt.clone()));
    enc.start(&stream(&ledger, false), &webm_vp9_opus(), settings())
        .unwrap();
    enc.feed(video_samples(0..2)).unwrap();
    enc.abort();
    enc.abort();
    drop(enc);
    assert_eq!(rt.log().aborted, 1);
    assert_eq!(rt.log().finished, 0);
}

#[test]
fn kill_handle_stops_the_recording_from_outside() {
    let ledger = ResourceLedger::new();
    let rt = InMemoryRuntime::new();
    let mut enc = Encoder::new(Arc::new(rt.clone()));
    assert!(enc.kill_handle().is_none());
    enc.start(&stream(&ledger, false), &webm_vp9_opus(), settings())
        .unwrap();
    enc.feed(video_samples(0..2)).unwrap();

    let kill = enc.kill_handle().unwrap();
    kill.kill();
    assert!(enc.feed(video_samples(2..3)).is_err());
    assert_eq!(enc.state(), EncoderState::Failed);
    assert_eq!(rt.log().aborted, 1);
    assert_eq!(rt.log().video_frames.len(), 2);
}
