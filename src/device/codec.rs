//! Pure image codec for key bitmaps.
//!
//! The panel is mounted upside down, so every bitmap is rotated 180 degrees
//! before JPEG encoding. The encoded payload is split into transfer-sized
//! chunks; header framing is the session's job.

use crate::device::protocol::PACKET_SIZE;
use crate::error::Result;
use image::{imageops, DynamicImage, RgbImage};
use std::io::Cursor;

/// Key bitmap edge length in pixels.
pub const KEY_PIXELS: u32 = 100;

/// Encode a key bitmap into protocol-ready payload chunks.
///
/// # Errors
/// Returns `DeckError::ImageEncode` if JPEG encoding fails.
pub fn encode(bitmap: &RgbImage) -> Result<Vec<Vec<u8>>> {
    let rotated = imageops::rotate180(bitmap);

    let mut jpeg = Vec::new();
    DynamicImage::ImageRgb8(rotated)
        .write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)?;

    Ok(chunk(&jpeg))
}

/// Total payload length of encoded chunks (goes into the image header).
pub fn payload_len(chunks: &[Vec<u8>]) -> usize {
    chunks.iter().map(Vec::len).sum()
}

/// Split a payload into chunks of at most one packet each.
fn chunk(payload: &[u8]) -> Vec<Vec<u8>> {
    payload.chunks(PACKET_SIZE).map(<[u8]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient() -> RgbImage {
        RgbImage::from_fn(KEY_PIXELS, KEY_PIXELS, |x, y| {
            Rgb([(x * 2) as u8, (y * 2) as u8, 0x40])
        })
    }

    #[test]
    fn rotate_twice_is_identity() {
        let img = gradient();
        let back = imageops::rotate180(&imageops::rotate180(&img));
        assert_eq!(img.as_raw(), back.as_raw());
    }

    #[test]
    fn chunks_reassemble_to_payload() {
        let payload: Vec<u8> = (0..1500).map(|i| (i % 251) as u8).collect();
        let chunks = chunk(&payload);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= PACKET_SIZE));

        let rejoined: Vec<u8> = chunks.concat();
        assert_eq!(rejoined, payload);
    }

    #[test]
    fn encode_produces_jpeg_chunks() {
        let chunks = encode(&gradient()).unwrap();
        assert!(!chunks.is_empty());
        // JPEG SOI marker at the start of the first chunk.
        assert_eq!(&chunks[0][..2], &[0xFF, 0xD8]);
        assert_eq!(payload_len(&chunks), chunks.concat().len());
    }
}
