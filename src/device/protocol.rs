//! Wire format of the SS-550 vendor protocol.
//!
//! Every control packet starts with the 5-byte `CRT\0\0` prefix and is
//! zero-padded to prefix + 512 bytes. Image payload packets are raw
//! 512-byte chunks without a prefix. A `STP` packet commits pending image
//! data to the panel.

/// Payload bytes per interrupt transfer.
pub const PACKET_SIZE: usize = 512;

const CMD_PREFIX: &[u8; 5] = b"CRT\x00\x00";
const CMD_BRIGHTNESS: &[u8; 5] = b"LIG\x00\x00";
const CMD_CLEAR: &[u8; 6] = b"CLE\x00\x00\x00";
const CMD_WAKE: &[u8; 5] = b"DIS\x00\x00";
const CMD_REFRESH: &[u8; 5] = b"STP\x00\x00";
const CMD_IMAGE: &[u8; 3] = b"BAT";

/// Clear-target byte meaning "all keys".
const CLEAR_ALL: u8 = 0xFF;

/// The panel's native brightness range is 0-64; the config speaks 0-100.
pub fn brightness_level(percent: u8) -> u8 {
    (f32::from(percent.min(100)) * 0.64) as u8
}

/// Frame a command body into a prefixed, padded packet.
fn command_packet(body: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(CMD_PREFIX.len() + PACKET_SIZE);
    packet.extend_from_slice(CMD_PREFIX);
    packet.extend_from_slice(body);
    packet.resize(CMD_PREFIX.len() + PACKET_SIZE, 0x00);
    packet
}

/// Pad a raw image chunk to a full packet.
pub fn raw_packet(chunk: &[u8]) -> Vec<u8> {
    debug_assert!(chunk.len() <= PACKET_SIZE);
    let mut packet = Vec::with_capacity(PACKET_SIZE);
    packet.extend_from_slice(chunk);
    packet.resize(PACKET_SIZE, 0x00);
    packet
}

pub fn brightness_packet(percent: u8) -> Vec<u8> {
    let mut body = CMD_BRIGHTNESS.to_vec();
    body.push(brightness_level(percent));
    command_packet(&body)
}

pub fn clear_packet() -> Vec<u8> {
    let mut body = CMD_CLEAR.to_vec();
    body.push(CLEAR_ALL);
    command_packet(&body)
}

pub fn wake_packet() -> Vec<u8> {
    command_packet(CMD_WAKE)
}

pub fn refresh_packet() -> Vec<u8> {
    command_packet(CMD_REFRESH)
}

/// Header announcing a key image upload: `BAT` + payload length (big
/// endian) + key id. The JPEG payload follows in raw chunks.
pub fn image_header_packet(payload_len: usize, key: u8) -> Vec<u8> {
    let mut body = CMD_IMAGE.to_vec();
    body.extend_from_slice(&(payload_len as u32).to_be_bytes());
    body.push(key);
    command_packet(&body)
}

/// The key matrix reports scrambled positions; map them to logical key ids
/// 1-15, left-to-right, top-to-bottom.
pub fn map_physical_to_logical(physical: u8) -> u8 {
    match physical {
        0x0b..=0x0f => physical - 0x0a, // top row    -> 1..5
        0x06..=0x0a => physical,        // middle row -> 6..10
        0x01..=0x05 => physical + 10,   // bottom row -> 11..15
        other => other,
    }
}

/// Decode a key event report read from the IN endpoint.
/// Returns `(logical key, pressed)` or `None` for runt reports.
pub fn decode_key_report(report: &[u8]) -> Option<(u8, bool)> {
    if report.len() < 11 {
        return None;
    }
    let key = map_physical_to_logical(report[9]);
    Some((key, report[10] == 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brightness_maps_documented_endpoints() {
        assert_eq!(brightness_level(0), 0);
        assert_eq!(brightness_level(100), 64);
        // Over-range input clamps instead of overflowing the native scale.
        assert_eq!(brightness_level(200), 64);
    }

    #[test]
    fn brightness_is_monotonic() {
        let mut prev = 0;
        for percent in 0..=100 {
            let level = brightness_level(percent);
            assert!(level >= prev, "level dropped at {percent}%");
            prev = level;
        }
    }

    #[test]
    fn command_packets_are_prefixed_and_padded() {
        let packet = wake_packet();
        assert_eq!(packet.len(), 5 + PACKET_SIZE);
        assert_eq!(&packet[..5], b"CRT\x00\x00");
        assert_eq!(&packet[5..10], b"DIS\x00\x00");
        assert!(packet[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn image_header_layout() {
        let packet = image_header_packet(0x0001_0203, 7);
        assert_eq!(&packet[5..8], b"BAT");
        assert_eq!(&packet[8..12], &[0x00, 0x01, 0x02, 0x03]);
        assert_eq!(packet[12], 7);
    }

    #[test]
    fn raw_packets_pad_to_full_size() {
        let packet = raw_packet(&[0xAB; 100]);
        assert_eq!(packet.len(), PACKET_SIZE);
        assert_eq!(packet[99], 0xAB);
        assert_eq!(packet[100], 0x00);
    }

    #[test]
    fn key_matrix_mapping() {
        assert_eq!(map_physical_to_logical(0x0b), 1);
        assert_eq!(map_physical_to_logical(0x0f), 5);
        assert_eq!(map_physical_to_logical(0x06), 6);
        assert_eq!(map_physical_to_logical(0x0a), 10);
        assert_eq!(map_physical_to_logical(0x01), 11);
        assert_eq!(map_physical_to_logical(0x05), 15);
    }

    #[test]
    fn decode_key_report_press_and_release() {
        let mut report = [0u8; 512];
        report[9] = 0x0b;
        report[10] = 1;
        assert_eq!(decode_key_report(&report), Some((1, true)));

        report[10] = 0;
        assert_eq!(decode_key_report(&report), Some((1, false)));

        assert_eq!(decode_key_report(&report[..8]), None);
    }
}
