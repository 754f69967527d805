use super::PersonalizeError;
use super::font::{BitmapFace, Point26_6};
use image::{
    DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, Rgba, RgbaImage,
    codecs::jpeg::{JpegDecoder, JpegEncoder},
};
use std::io::{BufReader, Write};
use std::path::Path;
use tracing::debug;

pub const TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Rendered width of `text` in pixels.
pub fn text_width(face: &BitmapFace, text: &str) -> i32 {
    let count = i32::try_from(text.chars().count()).unwrap_or(i32::MAX);
    count.saturating_mul(face.advance)
}

/// Baseline origin that centers `text` on a `width` x `height` canvas.
///
/// `x` may be negative when the text is wider than the canvas.
pub fn text_origin(face: &BitmapFace, width: u32, height: u32, text: &str) -> (i32, i32) {
    let width = width as i32;
    let height = height as i32;

    let x = (width - text_width(face, text)) / 2;
    let y = height / 2 + face.height / 2;
    (x, y)
}

/// Draw `text` with its baseline starting at `dot`, returning the pen position
/// after the last character. Pixels outside the canvas are dropped.
pub fn draw_text(
    canvas: &mut RgbaImage,
    face: &BitmapFace,
    mut dot: Point26_6,
    text: &str,
    color: Rgba<u8>,
) -> Point26_6 {
    let (canvas_width, canvas_height) = (canvas.width() as i64, canvas.height() as i64);

    for c in text.chars() {
        if let Some(rows) = face.glyph(c) {
            let left = dot.x.floor() as i64;
            let top = (dot.y.floor() - face.ascent) as i64;

            for (row, bits) in rows.iter().enumerate() {
                let py = top + row as i64;
                if py < 0 || py >= canvas_height {
                    continue;
                }
                for col in 0..8i64 {
                    let px = left + col;
                    if (bits >> col) & 1 == 0 || px < 0 || px >= canvas_width {
                        continue;
                    }
                    canvas.put_pixel(px as u32, py as u32, color);
                }
            }
        }
        dot.x += face.advance_fixed();
    }

    dot
}

/// Copy of `image` with `text` centered on it in solid black.
pub fn overlay_text(image: &DynamicImage, face: &BitmapFace, text: &str) -> RgbaImage {
    let mut canvas = image.to_rgba8();
    let (x, y) = text_origin(face, canvas.width(), canvas.height(), text);

    draw_text(
        &mut canvas,
        face,
        Point26_6::from_int(x, y),
        text,
        TEXT_COLOR,
    );
    canvas
}

/// Encode as baseline JPEG, embedding `icc_profile` when the encoder accepts it.
pub fn encode_jpeg(
    image: RgbaImage,
    quality: u8,
    icc_profile: Option<Vec<u8>>,
) -> Result<Vec<u8>, PersonalizeError> {
    // JPEG has no alpha channel
    let rgb_image = DynamicImage::ImageRgba8(image).into_rgb8();

    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);

    if let Some(profile) = icc_profile {
        let len = profile.len();
        match encoder.set_icc_profile(profile) {
            Ok(()) => debug!("Embedding ICC profile: {} bytes", len),
            Err(e) => debug!("Encoder rejected ICC profile ({}), writing without it", e),
        }
    }

    encoder.write_image(
        rgb_image.as_raw(),
        rgb_image.width(),
        rgb_image.height(),
        ExtendedColorType::Rgb8,
    )?;

    Ok(buffer)
}

/// Stamp `text` onto the JPEG at `path`, overwriting the file.
pub fn annotate_jpeg(path: &Path, text: &str, quality: u8) -> Result<(), PersonalizeError> {
    let file = std::fs::File::open(path)?;
    let mut decoder = JpegDecoder::new(BufReader::new(file))?;
    let icc_profile = decoder.icc_profile().ok().flatten();
    let image = DynamicImage::from_decoder(decoder)?;

    debug!(
        "Annotating {:?} ({}x{}) with {:?}",
        path,
        image.width(),
        image.height(),
        text
    );

    let annotated = overlay_text(&image, &BitmapFace::default(), text);
    let encoded = encode_jpeg(annotated, quality, icc_profile)?;

    let mut output = std::fs::File::create(path)?;
    output.write_all(&encoded)?;
    output.sync_all()?;

    Ok(())
}
