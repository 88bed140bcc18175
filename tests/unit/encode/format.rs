use super::*;
use crate::encode::runtime::InMemoryRuntime;

fn prefs(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

#[test]
fn parse_handles_quoted_and_spaced_codecs() {
    let m = MimeType::parse(r#"Video/WebM; codecs="VP9, opus""#).unwrap();
    assert_eq!(m.essence(), "video/webm");
    assert_eq!(m.codecs(), &["vp9".to_owned(), "opus".to_owned()]);
    assert_eq!(m.to_string(), "video/webm;codecs=vp9,opus");
    assert!(MimeType::parse("webm").is_err());
    assert!(MimeType::parse("video/").is_err());
}

#[test]
fn codec_kinds() {
    assert_eq!(codec_kind("avc1.42E01E"), CodecKind::Video);
    assert_eq!(codec_kind("mp4a.40.2"), CodecKind::Audio);
    assert_eq!(codec_kind("opus"), CodecKind::Audio);
    assert_eq!(codec_kind("xyz"), CodecKind::Unknown);
}

#[test]
fn effective_mime_strips_audio_for_video_only_streams() {
    let chosen = ChosenFormat::Preferred(MimeType::parse("video/webm;codecs=vp9,opus").unwrap());
    assert_eq!(chosen.effective_mime(true).to_string(), "video/webm;codecs=vp9,opus");
    assert_eq!(chosen.effective_mime(false).to_string(), "video/webm;codecs=vp9");

    let only_audio_codec =
        ChosenFormat::RuntimeDefault(MimeType::parse("audio/webm;codecs=opus").unwrap());
    assert_eq!(only_audio_codec.effective_mime(false).to_string(), "audio/webm");
}

#[test]
fn negotiate_returns_first_supported_preference() {
    let rt = InMemoryRuntime::with_supported(&["video/webm;codecs=vp8,opus", "video/mp4"]);
    let chosen = CodecNegotiator::new(&rt)
        .negotiate(&prefs(&[
            "video/webm;codecs=vp9,opus",
            "not a mime",
            "video/webm;codecs=vp8,opus",
            "video/mp4",
        ]))
        .unwrap();
    assert_eq!(
        chosen,
        ChosenFormat::Preferred(MimeType::parse("video/webm;codecs=vp8,opus").unwrap())
    );
}

#[test]
fn negotiate_falls_back_to_runtime_default() {
    let rt = InMemoryRuntime::with_supported(&[]).with_default(Some("video/x-matroska"));
    let chosen = CodecNegotiator::new(&rt)
        .negotiate(&prefs(&["video/webm;codecs=vp9,opus"]))
        .unwrap();
    assert!(chosen.is_runtime_default());
    assert_eq!(chosen.mime().essence(), "video/x-matroska");
}

#[test]
fn negotiate_fails_when_default_is_rejected_too() {
    let rt = InMemoryRuntime::with_supported(&[]).with_default(None);
    let err = CodecNegotiator::new(&rt)
        .negotiate(&prefs(&["video/webm", "video/mp4"]))
        .unwrap_err();
    assert!(matches!(err, ReelError::EncoderUnsupported(_)));
    assert!(err.is_fatal());
}
