//! Device-level operations composed from the transport and the image codec.

use crate::device::{codec, protocol, transport::UsbTransport};
use crate::error::Result;
use image::RgbImage;
use std::time::Duration;
use tracing::trace;

/// An open deck session. Owned by the device actor; nothing else issues
/// transfers, which keeps the one-transfer-in-flight rule structural.
pub struct DeviceSession {
    transport: UsbTransport,
}

impl DeviceSession {
    pub fn open() -> Result<Self> {
        Ok(Self {
            transport: UsbTransport::open()?,
        })
    }

    pub fn wake(&self) -> Result<()> {
        self.transport.write(&protocol::wake_packet())
    }

    pub fn clear_all(&self) -> Result<()> {
        self.transport.write(&protocol::clear_packet())
    }

    pub fn set_brightness(&self, percent: u8) -> Result<()> {
        self.transport.write(&protocol::brightness_packet(percent))
    }

    /// Encode and upload one key bitmap, then commit it to the panel.
    pub fn set_key_image(&self, key: u8, bitmap: &RgbImage) -> Result<()> {
        let chunks = codec::encode(bitmap)?;
        let total = codec::payload_len(&chunks);
        trace!("key {key}: uploading {total} byte JPEG in {} chunks", chunks.len());

        self.transport
            .write(&protocol::image_header_packet(total, key))?;
        for chunk in &chunks {
            self.transport.write(&protocol::raw_packet(chunk))?;
        }
        self.transport.write(&protocol::refresh_packet())
    }

    /// Block up to `timeout` for one key event. Timeout is `Ok(None)`.
    pub fn poll_key_event(&self, timeout: Duration) -> Result<Option<(u8, bool)>> {
        let mut buf = [0u8; protocol::PACKET_SIZE];
        match self.transport.read(&mut buf, timeout)? {
            Some(len) => Ok(protocol::decode_key_report(&buf[..len])),
            None => Ok(None),
        }
    }

    pub fn close(&mut self) {
        self.transport.close();
    }
}
