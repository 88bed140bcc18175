use super::*;

const MUXERS: &str = "\
File formats:
 D. = Demuxing supported
 .E = Muxing supported
 --
  E matroska        Matroska
  E mp4             MP4 (MPEG-4 Part 14)
  E webm            WebM
";

const ENCODERS: &str = "\
Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libvpx-vp9           libvpx VP9 (codec vp9)
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 A....D aac                  AAC (Advanced Audio Coding)
 A....D libopus              libopus Opus (codec opus)
";

fn caps() -> FfmpegCaps {
    FfmpegCaps {
        muxers: parse_capability_list(MUXERS),
        encoders: parse_capability_list(ENCODERS),
    }
}

fn mime(s: &str) -> MimeType {
    MimeType::parse(s).unwrap()
}

#[test]
fn capability_listing_skips_legend() {
    let c = caps();
    assert!(c.muxers.contains("webm"));
    assert!(c.muxers.contains("matroska"));
    assert!(!c.muxers.contains("E"));
    assert!(!c.muxers.contains("="));
    assert!(c.encoders.contains("libvpx-vp9"));
    assert!(c.encoders.contains("libopus"));
    assert_eq!(c.encoders.len(), 4);
}

#[test]
fn aliases_are_split() {
    let names = parse_capability_list(" --\n D  matroska,webm   Matroska / WebM\n");
    assert!(names.contains("matroska"));
    assert!(names.contains("webm"));
}

#[test]
fn resolve_maps_named_codecs() {
    let t = resolve_target(&mime("video/webm;codecs=vp9,opus"), &caps(), true).unwrap();
    assert_eq!(
        t,
        FfmpegTarget {
            muxer: "webm",
            video_encoder: "libvpx-vp9",
            audio_encoder: Some("libopus"),
        }
    );
    let t = resolve_target(&mime("video/webm;codecs=vp9,opus"), &caps(), false).unwrap();
    assert_eq!(t.audio_encoder, None);
}

#[test]
fn resolve_rejects_missing_encoders() {
    // No libvpx (vp8) in this build.
    assert!(resolve_target(&mime("video/webm;codecs=vp8,opus"), &caps(), true).is_none());
    assert!(resolve_target(&mime("video/ogg"), &caps(), false).is_none());
    assert!(resolve_target(&mime("video/webm;codecs=vp9,zzz"), &caps(), false).is_none());
}

#[test]
fn resolve_fills_container_defaults() {
    let t = resolve_target(&mime("video/mp4"), &caps(), true).unwrap();
    assert_eq!(t.video_encoder, "libx264");
    assert_eq!(t.audio_encoder, Some("aac"));
    let t = resolve_target(&mime("video/x-matroska"), &caps(), true).unwrap();
    assert_eq!(t.muxer, "matroska");
    assert_eq!(t.audio_encoder, Some("libopus"));
}

#[test]
fn runtime_reports_support_and_default() {
    let rt = FfmpegRuntime::from_caps(caps());
    assert!(rt.is_type_supported(&mime("video/webm;codecs=vp9,opus")));
    assert!(!rt.is_type_supported(&mime("video/webm;codecs=vp8,opus")));
    assert_eq!(
        rt.default_format().map(|m| m.to_string()),
        Some("video/x-matroska".to_owned())
    );

    let empty = FfmpegRuntime::from_caps(FfmpegCaps::default());
    assert!(empty.default_format().is_none());
}

#[test]
fn flatten_composites_premultiplied_over_background() {
    let src = [0u8, 0, 0, 0, 100, 50, 25, 255, 64, 0, 0, 128];
    let mut dst = [0u8; 12];
    flatten_to_opaque_rgba8(&mut dst, &src, true, [200, 100, 50, 255]).unwrap();
    assert_eq!(&dst[0..4], &[200, 100, 50, 255]);
    assert_eq!(&dst[4..8], &[100, 50, 25, 255]);
    assert_eq!(dst[11], 255);
    assert_eq!(dst[8], 64 + mul_div255_u16(200, 127) as u8);

    assert!(flatten_to_opaque_rgba8(&mut dst, &src[..8], true, [0, 0, 0, 255]).is_err());
}
