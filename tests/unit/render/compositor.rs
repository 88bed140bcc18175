use super::*;

use crate::assets::loader::ImageAsset;
use crate::assets::source::SourceRef;
use crate::render::surface::pixmap_from_premul_bytes;

fn solid(rgba: [u8; 4]) -> ImageAsset {
    let (w, h) = (4u32, 4u32);
    let bytes: Vec<u8> = std::iter::repeat_n(rgba, (w * h) as usize)
        .flatten()
        .collect();
    let pixmap = pixmap_from_premul_bytes(&bytes, w, h).unwrap();
    ImageAsset::from_pixmap(SourceRef::blob("solid", Vec::new()), w, h, pixmap)
}

fn small_cfg() -> SessionConfig {
    SessionConfig {
        canvas: Canvas {
            width: 32,
            height: 16,
        },
        per_image_duration_ms: 3_000,
        ..SessionConfig::default()
    }
}

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

#[test]
fn select_frame_follows_index_formula() {
    let d = ms(3_000);
    assert_eq!(select_frame(ms(0), d, 3), (0, ms(0)));
    assert_eq!(select_frame(ms(2_999), d, 3), (0, ms(2_999)));
    assert_eq!(select_frame(ms(3_000), d, 3), (1, ms(0)));
    assert_eq!(select_frame(ms(7_500), d, 3), (2, ms(1_500)));
}

#[test]
fn select_frame_never_reads_past_the_end() {
    let d = ms(1_000);
    let (idx, local) = select_frame(ms(50_000), d, 2);
    assert_eq!(idx, 1);
    assert!(local < d);
}

#[test]
fn zoom_is_linear_in_local_time() {
    let d = ms(3_000);
    assert_eq!(zoom_factor(ms(0), d, 0.1), 1.0);
    assert!((zoom_factor(ms(1_500), d, 0.1) - 1.05).abs() < 1e-12);
    assert!((zoom_factor(ms(3_000), d, 0.1) - 1.1).abs() < 1e-12);
    assert_eq!(zoom_factor(ms(10), Duration::ZERO, 0.1), 1.0);
}

#[test]
fn compositor_requires_images() {
    assert!(Compositor::new(Vec::new(), &small_cfg()).is_err());
}

#[test]
fn compositor_draws_then_completes_at_total() {
    let images = vec![solid([255, 0, 0, 255]), solid([0, 0, 255, 255])];
    let mut comp = Compositor::new(images, &small_cfg()).unwrap();
    assert_eq!(comp.total_duration(), ms(6_000));

    match comp.tick(ms(100)) {
        TickOutcome::Drawn(sel) => assert_eq!(sel.index, 0),
        other => panic!("unexpected {other:?}"),
    }
    let red = comp.snapshot().pixel(16, 8).unwrap();
    assert!(red[0] > 200 && red[2] < 50, "{red:?}");

    match comp.tick(ms(4_000)) {
        TickOutcome::Drawn(sel) => {
            assert_eq!(sel.index, 1);
            assert_eq!(sel.local, ms(1_000));
        }
        other => panic!("unexpected {other:?}"),
    }
    let blue = comp.snapshot().pixel(16, 8).unwrap();
    assert!(blue[2] > 200 && blue[0] < 50, "{blue:?}");

    assert_eq!(comp.tick(ms(6_000)), TickOutcome::Complete);
    assert!(comp.is_complete());
    // Stays complete even if a stale timestamp arrives.
    assert_eq!(comp.tick(ms(10)), TickOutcome::Complete);
    assert_eq!(comp.draw_count(), 2);
}

#[test]
fn elapsed_is_monotonic() {
    let mut comp = Compositor::new(vec![solid([9, 9, 9, 255])], &small_cfg()).unwrap();
    comp.tick(ms(1_000));
    match comp.tick(ms(500)) {
        TickOutcome::Drawn(sel) => assert_eq!(sel.local, ms(1_000)),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(comp.elapsed(), ms(1_000));
}

#[test]
fn release_drops_images_and_stops_drawing() {
    let mut comp = Compositor::new(vec![solid([1, 2, 3, 255])], &small_cfg()).unwrap();
    comp.release();
    assert_eq!(comp.image_count(), 0);
    assert_eq!(comp.tick(ms(0)), TickOutcome::Complete);
}
