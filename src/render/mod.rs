pub mod canvas;
pub mod font;
pub mod icon;
pub mod text;

use crate::config::schema::ButtonConfig;
use crate::error::Result;
use canvas::create_canvas;
use image::RgbImage;
use std::path::Path;

/// Render a key bitmap from its static config (label + color + icon).
pub fn render_button(button: &ButtonConfig, icons_dir: &Path) -> Result<RgbImage> {
    render_face(button, &button.label, icons_dir)
}

/// Render a key bitmap with the label replaced by live widget text.
pub fn render_widget(button: &ButtonConfig, display: &str, icons_dir: &Path) -> Result<RgbImage> {
    render_face(button, display, icons_dir)
}

fn render_face(button: &ButtonConfig, label: &str, icons_dir: &Path) -> Result<RgbImage> {
    let mut pm = create_canvas(&button.color)?;

    if !button.icon.is_empty() {
        let full_path = if Path::new(&button.icon).is_absolute() {
            std::path::PathBuf::from(&button.icon)
        } else {
            icons_dir.join(&button.icon)
        };

        if full_path.exists() {
            match icon::load_icon(&full_path) {
                Ok(icon_pm) => {
                    let x = icon::center_x(icon_pm.width());
                    let y = icon::icon_y(!label.is_empty());
                    canvas::composite(&mut pm, &icon_pm, x, y);
                }
                Err(e) => {
                    tracing::warn!("failed to load icon {}: {e}", full_path.display());
                }
            }
        } else {
            tracing::warn!("icon not found: {}", full_path.display());
        }
    }

    if !label.is_empty() {
        if button.icon.is_empty() {
            text::render_text(&mut pm, label, "#ffffff", text::scale_for(label))?;
        } else {
            // Icon owns the face; squeeze the label into the bottom strip.
            let size = text::scale_for(label).min(16.0);
            text::render_text_at_bottom(&mut pm, label, "#ffffff", size)?;
        }
    }

    Ok(canvas::to_rgb(&pm))
}
