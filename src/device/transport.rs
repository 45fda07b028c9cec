//! Raw USB session: discovery, interface claiming, interrupt transfers.

use crate::error::{DeckError, Result};
use rusb::{Context, DeviceHandle, UsbContext};
use std::time::Duration;
use tracing::{debug, warn};

pub const VENDOR_ID: u16 = 0x0200;
pub const PRODUCT_ID: u16 = 0x1000;

const INTERFACE: u8 = 0;
const EP_OUT: u8 = 0x01;
const EP_IN: u8 = 0x82;

const WRITE_TIMEOUT: Duration = Duration::from_millis(1000);

/// An open, claimed handle to the deck. Exactly one of these exists per
/// session; everything device-facing goes through it.
pub struct UsbTransport {
    handle: DeviceHandle<Context>,
    claimed: bool,
}

impl UsbTransport {
    /// Find the deck by VID/PID and claim its interface, detaching a
    /// conflicting kernel driver if one is attached.
    ///
    /// # Errors
    /// `DeckError::DeviceNotFound` when no deck is on the bus,
    /// `DeckError::DeviceBusy` when another process holds the interface.
    pub fn open() -> Result<Self> {
        let context = Context::new()?;

        for device in context.devices()?.iter() {
            let desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(_) => continue,
            };
            if desc.vendor_id() != VENDOR_ID || desc.product_id() != PRODUCT_ID {
                continue;
            }

            debug!(
                "found deck at bus {:03} addr {:03}",
                device.bus_number(),
                device.address()
            );

            let mut handle = device.open().map_err(claim_error)?;

            // Some firmware revisions boot unconfigured.
            if let Err(e) = handle.set_active_configuration(1) {
                debug!("set_active_configuration: {e} (may already be set)");
            }

            #[cfg(target_os = "linux")]
            if handle.kernel_driver_active(INTERFACE).unwrap_or(false) {
                debug!("detaching kernel driver from interface {INTERFACE}");
                if let Err(e) = handle.detach_kernel_driver(INTERFACE) {
                    warn!("failed to detach kernel driver: {e}");
                }
            }

            handle.claim_interface(INTERFACE).map_err(claim_error)?;

            return Ok(Self {
                handle,
                claimed: true,
            });
        }

        Err(DeckError::DeviceNotFound)
    }

    /// Write one packet to the OUT endpoint.
    ///
    /// # Errors
    /// `DeckError::Transfer` for a failed transfer; the session stays open.
    pub fn write(&self, packet: &[u8]) -> Result<()> {
        self.handle
            .write_interrupt(EP_OUT, packet, WRITE_TIMEOUT)
            .map_err(map_transfer_error)?;
        Ok(())
    }

    /// Read one report from the IN endpoint. A timeout is `Ok(None)`.
    ///
    /// # Errors
    /// `DeckError::Transfer` or a disconnect-class `DeckError::Usb`.
    pub fn read(&self, buf: &mut [u8], timeout: Duration) -> Result<Option<usize>> {
        match self.handle.read_interrupt(EP_IN, buf, timeout) {
            Ok(len) => Ok(Some(len)),
            Err(rusb::Error::Timeout) => Ok(None),
            Err(e) => Err(map_transfer_error(e)),
        }
    }

    /// Release the interface. Safe to call more than once.
    pub fn close(&mut self) {
        if self.claimed {
            if let Err(e) = self.handle.release_interface(INTERFACE) {
                debug!("release_interface: {e}");
            }
            self.claimed = false;
        }
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Open/claim failures that mean "another process owns the deck" get their
/// own variant so the caller can surface them as fatal-until-user-action.
fn claim_error(e: rusb::Error) -> DeckError {
    match e {
        rusb::Error::Busy | rusb::Error::Access => DeckError::DeviceBusy,
        other => DeckError::Usb(other),
    }
}

/// Disconnects keep their rusb class (so `is_disconnect` sees them);
/// everything else is a single-transfer failure.
fn map_transfer_error(e: rusb::Error) -> DeckError {
    match e {
        rusb::Error::NoDevice | rusb::Error::Io | rusb::Error::Pipe => DeckError::Usb(e),
        other => DeckError::Transfer(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_and_access_map_to_device_busy() {
        assert!(matches!(
            claim_error(rusb::Error::Busy),
            DeckError::DeviceBusy
        ));
        assert!(matches!(
            claim_error(rusb::Error::Access),
            DeckError::DeviceBusy
        ));
        assert!(matches!(
            claim_error(rusb::Error::NoMem),
            DeckError::Usb(_)
        ));
    }

    #[test]
    fn disconnect_classification() {
        assert!(map_transfer_error(rusb::Error::NoDevice).is_disconnect());
        assert!(!map_transfer_error(rusb::Error::Overflow).is_disconnect());
    }
}
