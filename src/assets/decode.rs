use image::imageops::FilterType;

use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::premultiply_rgba8_in_place;

/// A decoded photo, premultiplied RGBA8.
#[derive(Clone, Debug)]
pub(crate) struct DecodedImage {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) rgba8_premul: Vec<u8>,
}

/// Decode an encoded image, downscaling so neither side exceeds `max_dimension`.
pub(crate) fn decode_image(bytes: &[u8], max_dimension: u32) -> ReelResult<DecodedImage> {
    let mut dyn_img = image::load_from_memory(bytes)
        .map_err(|e| ReelError::asset_load(format!("decode image: {e}")))?;
    if dyn_img.width() == 0 || dyn_img.height() == 0 {
        return Err(ReelError::asset_load("decoded image has zero size"));
    }
    if dyn_img.width() > max_dimension || dyn_img.height() > max_dimension {
        // `resize` keeps the aspect ratio and fits inside the box.
        dyn_img = dyn_img.resize(max_dimension, max_dimension, FilterType::Triangle);
    }
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(DecodedImage {
        width,
        height,
        rgba8_premul,
    })
}
