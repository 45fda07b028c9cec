use crate::error::{DeckError, Result};
use ab_glyph::FontRef;
use std::sync::OnceLock;

/// Common locations of DejaVu Sans across distributions, in probe order.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
];

static FONT_DATA: OnceLock<Option<Vec<u8>>> = OnceLock::new();

/// The label font, loaded once from the first system path that exists.
///
/// # Errors
/// Returns `DeckError::Font` if no candidate font file is readable or the
/// file is not a valid font.
pub fn label_font() -> Result<FontRef<'static>> {
    let data = FONT_DATA
        .get_or_init(|| {
            FONT_CANDIDATES
                .iter()
                .find_map(|path| std::fs::read(path).ok())
        })
        .as_deref()
        .ok_or_else(|| DeckError::Font("no usable system font found".to_string()))?;

    FontRef::try_from_slice(data).map_err(|e| DeckError::Font(e.to_string()))
}
