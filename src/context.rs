use rusb::UsbContext;

use crate::catalog;
use crate::device::DiscoveredDevice;
use crate::error::{Error, Result};
use crate::session::BootloaderHandle;

/// Owns a USB host context for the duration of one enumeration pass or one
/// flash operation. Contexts are cheap enough to open per call and holding
/// one across calls would keep handles alive longer than necessary.
pub struct Context {
    usb: rusb::Context,
}

impl Context {
    pub fn new() -> Result<Self> {
        let usb = rusb::Context::new().map_err(Error::Usb)?;
        Ok(Context { usb })
    }

    /// Scans all attached USB devices and returns the catalog matches, in
    /// bus order. Devices not present in the catalog are invisible to the
    /// rest of the tool. Devices whose descriptors cannot be read are
    /// skipped; they cannot be identified as catalog members.
    pub fn enumerate(&self) -> Result<Vec<DiscoveredDevice>> {
        let mut found = Vec::new();

        for device in self.usb.devices().map_err(Error::Enumeration)?.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(descriptor) => descriptor,
                Err(_) => continue,
            };
            if let Some(entry) = catalog::lookup(descriptor.vendor_id(), descriptor.product_id()) {
                found.push(DiscoveredDevice {
                    vendor_id: descriptor.vendor_id(),
                    product_id: descriptor.product_id(),
                    entry,
                    usb_bus_number: device.bus_number(),
                    usb_bus_address: device.address(),
                });
            }
        }

        Ok(found)
    }

    /// Opens a discovered device exclusively for flashing.
    pub fn open(&self, device: &DiscoveredDevice) -> Result<BootloaderHandle<rusb::Context>> {
        device.open(&self.usb)
    }
}
