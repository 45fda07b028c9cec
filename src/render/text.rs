use crate::error::Result;
use crate::render::canvas::{parse_hex_color, KEY_SIZE};
use crate::render::font::label_font;
use ab_glyph::{Font, FontRef, PxScale, PxScaleFont, ScaleFont};
use tiny_skia::Pixmap;

/// Pick a scale that keeps typical labels inside the key face.
pub fn scale_for(text: &str) -> f32 {
    let longest = text.split('\n').map(str::len).max().unwrap_or(0);
    if longest > 8 {
        18.0
    } else if longest > 5 {
        24.0
    } else {
        32.0
    }
}

/// Rasterize text centered on the canvas. Multi-line with '\n'.
pub fn render_text(canvas: &mut Pixmap, text: &str, color_hex: &str, font_size: f32) -> Result<()> {
    let font = label_font()?;
    let scale = PxScale::from(font_size);
    let scaled_font = font.as_scaled(scale);

    let lines: Vec<&str> = text.split('\n').collect();
    let line_height = scaled_font.height();
    let total_height = line_height * lines.len() as f32;
    let start_y = ((KEY_SIZE as f32 - total_height) / 2.0).max(2.0);

    let color = parse_hex_color(color_hex)?;
    for (line_idx, line) in lines.iter().enumerate() {
        let line_width = measure_line(&scaled_font, line);
        let x = ((KEY_SIZE as f32 - line_width) / 2.0).max(1.0);
        let y_baseline = start_y + line_height * (line_idx as f32 + 0.8);
        draw_line(canvas, &scaled_font, line, x, y_baseline, color);
    }

    Ok(())
}

/// Rasterize text anchored to the bottom edge (for icon+label keys).
pub fn render_text_at_bottom(
    canvas: &mut Pixmap,
    text: &str,
    color_hex: &str,
    font_size: f32,
) -> Result<()> {
    let font = label_font()?;
    let scale = PxScale::from(font_size);
    let scaled_font = font.as_scaled(scale);

    let y_baseline = KEY_SIZE as f32 - 5.0;
    let line_width = measure_line(&scaled_font, text);
    let x = ((KEY_SIZE as f32 - line_width) / 2.0).max(1.0);

    let color = parse_hex_color(color_hex)?;
    draw_line(canvas, &scaled_font, text, x, y_baseline, color);
    Ok(())
}

/// Draw one line of glyphs with kerning, alpha-blending onto the canvas.
fn draw_line(
    canvas: &mut Pixmap,
    font: &PxScaleFont<&FontRef<'static>>,
    line: &str,
    x_offset: f32,
    y_baseline: f32,
    color: tiny_skia::Color,
) {
    let r = (color.red() * 255.0) as u8;
    let g = (color.green() * 255.0) as u8;
    let b = (color.blue() * 255.0) as u8;

    let canvas_w = canvas.width() as i32;
    let canvas_h = canvas.height() as i32;
    let data = canvas.data_mut();

    let mut cursor_x = x_offset;
    let mut prev_glyph_id = None;

    for ch in line.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = prev_glyph_id {
            cursor_x += font.kern(prev, glyph_id);
        }

        if let Some(outlined) = font.outline_glyph(
            glyph_id.with_scale_and_position(font.scale(), ab_glyph::point(cursor_x, y_baseline)),
        ) {
            let bounds = outlined.px_bounds();
            outlined.draw(|px, py, coverage| {
                let x = px as i32 + bounds.min.x as i32;
                let y = py as i32 + bounds.min.y as i32;
                if x >= 0 && x < canvas_w && y >= 0 && y < canvas_h {
                    let idx = (y * canvas_w + x) as usize * 4;
                    let alpha = (coverage * 255.0) as u8;
                    let inv = 255 - alpha;
                    data[idx] =
                        ((u16::from(r) * u16::from(alpha) + u16::from(data[idx]) * u16::from(inv)) / 255) as u8;
                    data[idx + 1] = ((u16::from(g) * u16::from(alpha)
                        + u16::from(data[idx + 1]) * u16::from(inv))
                        / 255) as u8;
                    data[idx + 2] = ((u16::from(b) * u16::from(alpha)
                        + u16::from(data[idx + 2]) * u16::from(inv))
                        / 255) as u8;
                    data[idx + 3] = 255;
                }
            });
        }

        cursor_x += font.h_advance(glyph_id);
        prev_glyph_id = Some(glyph_id);
    }
}

fn measure_line(font: &PxScaleFont<&FontRef>, text: &str) -> f32 {
    let mut width = 0.0f32;
    let mut prev = None;
    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev_id) = prev {
            width += font.kern(prev_id, glyph_id);
        }
        width += font.h_advance(glyph_id);
        prev = Some(glyph_id);
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_shrinks_with_label_length() {
        assert!(scale_for("OBS") > scale_for("Firefox"));
        assert!(scale_for("Firefox") > scale_for("Screenshot!"));
        // Longest line wins for multi-line labels.
        assert_eq!(scale_for("hi\nlong line here"), scale_for("long line here"));
    }
}
