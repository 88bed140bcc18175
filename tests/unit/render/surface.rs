use super::*;

use crate::assets::loader::ImageAsset;
use crate::assets::source::SourceRef;

fn solid_asset(w: u32, h: u32, rgba: [u8; 4]) -> ImageAsset {
    let mut bytes = Vec::with_capacity((w * h * 4) as usize);
    for _ in 0..(w * h) {
        bytes.extend_from_slice(&rgba);
    }
    let pixmap = pixmap_from_premul_bytes(&bytes, w, h).unwrap();
    ImageAsset::from_pixmap(SourceRef::blob("solid", Vec::new()), w, h, pixmap)
}

fn canvas(w: u32, h: u32) -> Canvas {
    Canvas {
        width: w,
        height: h,
    }
}

#[test]
fn cover_transform_fills_wider_canvas() {
    // 100x100 onto 200x100: scale 2, vertical overflow split evenly.
    let tr = cover_transform(100, 100, canvas(200, 100), 1.0);
    let c = tr.as_coeffs();
    assert!((c[0] - 2.0).abs() < 1e-9);
    assert!((c[3] - 2.0).abs() < 1e-9);
    assert!((c[4] - 0.0).abs() < 1e-9);
    assert!((c[5] - -50.0).abs() < 1e-9);
}

#[test]
fn cover_transform_zoom_keeps_centre_fixed() {
    let cv = canvas(640, 360);
    for zoom in [1.0, 1.05, 1.1] {
        let tr = cover_transform(400, 300, cv, zoom);
        // Image centre maps to canvas centre at every zoom level.
        let p = tr * kurbo::Point::new(200.0, 150.0);
        assert!((p.x - 320.0).abs() < 1e-9, "zoom {zoom}: x={}", p.x);
        assert!((p.y - 180.0).abs() < 1e-9, "zoom {zoom}: y={}", p.y);
    }
}

#[test]
fn cover_transform_always_covers_canvas() {
    let cv = canvas(320, 240);
    for (iw, ih) in [(10, 1000), (1000, 10), (320, 240), (1, 1)] {
        let tr = cover_transform(iw, ih, cv, 1.0);
        let tl = tr * kurbo::Point::new(0.0, 0.0);
        let br = tr * kurbo::Point::new(f64::from(iw), f64::from(ih));
        assert!(tl.x <= 1e-9 && tl.y <= 1e-9, "{iw}x{ih}: {tl:?}");
        assert!(br.x >= 320.0 - 1e-9 && br.y >= 240.0 - 1e-9, "{iw}x{ih}: {br:?}");
    }
}

#[test]
fn surface_rejects_odd_canvas() {
    assert!(RenderSurface::new(canvas(31, 32), [0, 0, 0, 255]).is_err());
}

#[test]
fn draw_cover_paints_centre_with_image_colour() {
    let mut surface = RenderSurface::new(canvas(64, 32), [18, 20, 28, 255]).unwrap();
    let asset = solid_asset(8, 8, [200, 10, 10, 255]);
    surface.draw_cover(&asset, 1.0);
    assert_eq!(surface.draw_count(), 1);

    let frame = surface.snapshot();
    assert_eq!((frame.width, frame.height), (64, 32));
    assert_eq!(frame.data.len(), 64 * 32 * 4);
    let px = frame.pixel(32, 16).unwrap();
    assert!(px[0] > 150 && px[1] < 60 && px[2] < 60, "centre pixel {px:?}");
    assert_eq!(px[3], 255);
}

#[test]
fn pixmap_from_premul_bytes_checks_length() {
    assert!(pixmap_from_premul_bytes(&[0u8; 15], 2, 2).is_err());
    assert!(pixmap_from_premul_bytes(&[0u8; 16], 2, 2).is_ok());
}
