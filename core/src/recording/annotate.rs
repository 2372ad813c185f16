use crate::processing::TrackSnapshot;
use ab_glyph::{FontRef, PxScale};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rand::{rngs::StdRng, Rng, SeedableRng};

const FONT_DATA: &[u8] = include_bytes!("../../assets/fonts/DejaVuSansMono-Bold.ttf");

/// Label glyph height per unit of video scale.
const LABEL_PX_PER_SCALE: f32 = 7.0;
/// Gap between a label and the inner corner of its box.
const LABEL_INSET: i32 = 6;

fn label_font() -> Option<FontRef<'static>> {
    FontRef::try_from_slice(FONT_DATA).ok()
}

/// Stable per-track colour.
pub fn track_color(id: u64) -> Rgb<u8> {
    let mut rng = StdRng::seed_from_u64(id.wrapping_mul(9973).wrapping_add(12345));
    Rgb([
        rng.gen_range(50..=255),
        rng.gen_range(50..=255),
        rng.gen_range(50..=255),
    ])
}

/// Nearest-neighbour upscale of the visual frame into RGB.
pub fn render_plain(visual: &GrayImage, scale: u32) -> RgbImage {
    let scale = scale.max(1);
    let (width, height) = visual.dimensions();
    let scaled = if scale == 1 {
        visual.clone()
    } else {
        imageops::resize(visual, width * scale, height * scale, FilterType::Nearest)
    };
    DynamicImage::ImageLuma8(scaled).to_rgb8()
}

/// Upscaled frame with a box and `ID<n>` label for every track.
pub fn render_tracked(visual: &GrayImage, tracks: &[TrackSnapshot], scale: u32) -> RgbImage {
    let scale = scale.max(1);
    let mut canvas = render_plain(visual, scale);
    if tracks.is_empty() {
        return canvas;
    }

    let font = label_font();
    let text_scale = PxScale::from(LABEL_PX_PER_SCALE * scale as f32);
    for track in tracks {
        let color = track_color(track.id);
        let x = (track.bbox.x * scale) as i32;
        let y = (track.bbox.y * scale) as i32;
        let w = (track.bbox.width * scale).max(1);
        let h = (track.bbox.height * scale).max(1);

        draw_hollow_rect_mut(&mut canvas, Rect::at(x, y).of_size(w, h), color);
        if w > 2 && h > 2 {
            draw_hollow_rect_mut(&mut canvas, Rect::at(x + 1, y + 1).of_size(w - 2, h - 2), color);
        }

        let Some(font) = font.as_ref() else {
            continue;
        };
        let label = format!("ID{}", track.id);
        let (label_w, label_h) = text_size(text_scale, font, &label);
        let lx = x + w as i32 - label_w as i32 - LABEL_INSET;
        let ly = y + h as i32 - label_h as i32 - LABEL_INSET;
        draw_text_mut(&mut canvas, color, lx.max(0), ly.max(0), text_scale, font, &label);
    }
    canvas
}
