//! Discovered devices.

use std::fmt;

use rusb::UsbContext;

use crate::catalog::CatalogEntry;
use crate::error::{Error, Result};
use crate::session::BootloaderHandle;

/// One attached USB device matching the catalog, as seen by a single
/// enumeration pass.
///
/// Only the bus coordinates are recorded; no USB handle outlives the
/// enumeration call. [`open`](DiscoveredDevice::open) relocates the device
/// by those coordinates and hands its exclusive handle to a flash session.
#[derive(Debug)]
pub struct DiscoveredDevice {
    /// Vendor id reported by the device descriptor.
    pub vendor_id: u16,

    /// Product id reported by the device descriptor.
    pub product_id: u16,

    /// The catalog entry this device matched.
    pub entry: &'static CatalogEntry,

    /// USB bus the device is connected to.
    pub usb_bus_number: u8,

    /// Device address on that bus.
    pub usb_bus_address: u8,
}

impl DiscoveredDevice {
    /// Whether the device is sitting in its DFU bootloader and will accept
    /// programming commands.
    pub fn in_bootloader_mode(&self) -> bool {
        self.entry.is_bootloader()
    }

    /// Fails unless the device is in bootloader mode. Checked before any
    /// USB traffic so a session against an application-mode keyboard never
    /// starts.
    pub(crate) fn ensure_bootloader(&self) -> Result<()> {
        if self.in_bootloader_mode() {
            Ok(())
        } else {
            Err(Error::DeviceNotInBootloaderMode(self.entry.device))
        }
    }

    /// Opens the device exclusively for flashing.
    pub fn open<T: UsbContext>(&self, context: &T) -> Result<BootloaderHandle<T>> {
        BootloaderHandle::open(context, self)
    }
}

impl fmt::Display for DiscoveredDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:04x}:{:04x})",
            self.entry.device, self.vendor_id, self.product_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    fn discovered(vendor_id: u16, product_id: u16) -> DiscoveredDevice {
        DiscoveredDevice {
            vendor_id,
            product_id,
            entry: catalog::lookup(vendor_id, product_id).unwrap(),
            usb_bus_number: 1,
            usb_bus_address: 4,
        }
    }

    #[test]
    fn application_mode_device_is_rejected_before_any_usb_traffic() {
        let device = discovered(0x3297, 0x6060);
        assert!(!device.in_bootloader_mode());
        match device.ensure_bootloader() {
            Err(Error::DeviceNotInBootloaderMode(name)) => assert_eq!(name, "planck"),
            other => panic!("expected bootloader-mode rejection, got {:?}", other),
        }
    }

    #[test]
    fn bootloader_mode_device_passes_the_precondition() {
        let device = discovered(0x0483, 0xDF11);
        assert!(device.in_bootloader_mode());
        assert!(device.ensure_bootloader().is_ok());
    }
}
