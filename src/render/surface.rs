use std::sync::Arc;

use crate::assets::loader::ImageAsset;
use crate::foundation::core::{Affine, Canvas, Vec2};
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::frame::FrameRGBA;

/// The pixel buffer the compositor draws into and the video capture reads from.
pub(crate) struct RenderSurface {
    canvas: Canvas,
    background: [u8; 4],
    ctx: vello_cpu::RenderContext,
    pixmap: vello_cpu::Pixmap,
    draws: u64,
}

impl RenderSurface {
    pub(crate) fn new(canvas: Canvas, background: [u8; 4]) -> ReelResult<Self> {
        canvas.validate()?;
        let (w, h) = canvas_u16(canvas)?;
        Ok(Self {
            canvas,
            background,
            ctx: vello_cpu::RenderContext::new(w, h),
            pixmap: vello_cpu::Pixmap::new(w, h),
            draws: 0,
        })
    }

    pub(crate) fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub(crate) fn draw_count(&self) -> u64 {
        self.draws
    }

    /// Clear, then draw `image` aspect-filled and centred, scaled by `zoom` about the centre.
    ///
    /// Drawing state is reset at the start of every call, so transforms never leak between
    /// frames.
    pub(crate) fn draw_cover(&mut self, image: &ImageAsset, zoom: f64) {
        let cw = f64::from(self.canvas.width);
        let ch = f64::from(self.canvas.height);
        let [r, g, b, a] = self.background;

        let ctx = &mut self.ctx;
        ctx.reset();
        ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);

        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, cw, ch));

        let tr = cover_transform(image.natural_width(), image.natural_height(), self.canvas, zoom);
        ctx.set_transform(affine_to_cpu(tr));
        ctx.set_paint(image.paint());
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(image.natural_width()),
            f64::from(image.natural_height()),
        ));

        ctx.flush();
        ctx.render_to_pixmap(&mut self.pixmap);
        self.draws += 1;
    }

    /// Copy the current pixels out.
    pub(crate) fn snapshot(&self) -> FrameRGBA {
        FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: self.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        }
    }
}

/// Transform that maps an `image_w x image_h` image onto `canvas` so it covers it entirely,
/// centred, with an extra `zoom` scale about the canvas centre.
pub(crate) fn cover_transform(image_w: u32, image_h: u32, canvas: Canvas, zoom: f64) -> Affine {
    let iw = f64::from(image_w.max(1));
    let ih = f64::from(image_h.max(1));
    let cw = f64::from(canvas.width);
    let ch = f64::from(canvas.height);

    let scale = (cw / iw).max(ch / ih) * zoom;
    let tx = (cw - iw * scale) * 0.5;
    let ty = (ch - ih * scale) * 0.5;
    Affine::translate(Vec2::new(tx, ty)) * Affine::scale(scale)
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn canvas_u16(canvas: Canvas) -> ReelResult<(u16, u16)> {
    let w: u16 = canvas
        .width
        .try_into()
        .map_err(|_| ReelError::validation("surface width exceeds u16"))?;
    let h: u16 = canvas
        .height
        .try_into()
        .map_err(|_| ReelError::validation("surface height exceeds u16"))?;
    Ok((w, h))
}

pub(crate) fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> ReelResult<Arc<vello_cpu::Pixmap>> {
    let w: u16 = width
        .try_into()
        .map_err(|_| ReelError::asset_load("bitmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| ReelError::asset_load("bitmap height exceeds u16"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(ReelError::asset_load("bitmap byte len mismatch"));
    }
    // Pixmap stores PremulRgba8; our bytes are already premultiplied.
    let mut pixels = Vec::<vello_cpu::peniko::color::PremulRgba8>::with_capacity(
        (width as usize) * (height as usize),
    );
    for px in bytes.chunks_exact(4) {
        pixels.push(vello_cpu::peniko::color::PremulRgba8::from_u8_array([
            px[0], px[1], px[2], px[3],
        ]));
    }
    let opaque = bytes.chunks_exact(4).all(|px| px[3] == 255);
    Ok(Arc::new(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels, w, h, !opaque,
    )))
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
