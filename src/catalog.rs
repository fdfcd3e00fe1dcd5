//! Static table of supported devices.
//!
//! The catalog is the allow-list for enumeration: USB devices whose
//! vendor/product pair is not listed here are invisible to the rest of the
//! tool. It contains the keyboards this tool knows how to reflash (which
//! show up pre-bootloader, running application firmware) and the generic
//! STM32 DFU bootloader identity they re-enumerate as in programming mode.

use std::fmt;

/// Reserved device name of the generic bootloader entry. A discovered
/// device counts as "in bootloader mode" iff its catalog entry carries this
/// name; this is a catalog convention, not a USB-level property.
pub(crate) const BOOTLOADER_DEVICE: &str = "dfu";

/// One supported (vendor id, product id) pair with human-readable metadata.
#[derive(Debug, PartialEq, Eq)]
pub struct CatalogEntry {
    pub vendor_id: u16,
    pub product_id: u16,
    pub device: &'static str,
    pub vendor: &'static str,
}

const SUPPORTED_DEVICES: &[CatalogEntry] = &[
    CatalogEntry {
        vendor_id: 0x3297,
        product_id: 0x6060,
        device: "planck",
        vendor: "zsa",
    },
    CatalogEntry {
        vendor_id: 0x3297,
        product_id: 0x1307,
        device: "ergodox",
        vendor: "zsa",
    },
    CatalogEntry {
        vendor_id: 0x3297,
        product_id: 0x1969,
        device: "moonlander",
        vendor: "zsa",
    },
    CatalogEntry {
        vendor_id: 0x16C0,
        product_id: 0x0478,
        device: "halfkay",
        vendor: "halfkay",
    },
    CatalogEntry {
        vendor_id: 0x0483,
        product_id: 0xDF11,
        device: BOOTLOADER_DEVICE,
        vendor: "dfu",
    },
];

/// Looks up a vendor/product pair in the catalog. Linear scan; the table is
/// small and fixed at build time.
pub fn lookup(vendor_id: u16, product_id: u16) -> Option<&'static CatalogEntry> {
    SUPPORTED_DEVICES
        .iter()
        .find(|entry| entry.vendor_id == vendor_id && entry.product_id == product_id)
}

impl CatalogEntry {
    /// Whether this entry is the generic bootloader identity rather than a
    /// keyboard running application firmware.
    pub fn is_bootloader(&self) -> bool {
        self.device == BOOTLOADER_DEVICE
    }
}

impl fmt::Display for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:04x}:{:04x})",
            self.device, self.vendor_id, self.product_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_known_devices() {
        let entry = lookup(0x3297, 0x1969).unwrap();
        assert_eq!(entry.device, "moonlander");
        assert_eq!(entry.vendor, "zsa");

        let entry = lookup(0x0483, 0xDF11).unwrap();
        assert_eq!(entry.device, "dfu");
    }

    #[test]
    fn lookup_rejects_unknown_devices() {
        assert!(lookup(0x1234, 0x5678).is_none());
        // Known vendor, unknown product
        assert!(lookup(0x3297, 0x0001).is_none());
    }

    #[test]
    fn bootloader_classification_uses_marker_name_only() {
        assert!(lookup(0x0483, 0xDF11).unwrap().is_bootloader());
        assert!(!lookup(0x3297, 0x6060).unwrap().is_bootloader());
        assert!(!lookup(0x16C0, 0x0478).unwrap().is_bootloader());
    }
}
