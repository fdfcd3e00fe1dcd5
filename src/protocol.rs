//! DFU bootloader protocol constants and command encoding.
//!
//! All traffic goes over class-interface control transfers. Commands are
//! sent through the DNLOAD request: wValue 0 carries a command byte
//! (optionally followed by a little-endian 32-bit address), wValue 2
//! carries raw firmware data. The bootloader buffers the pending target
//! address internally, so erase and set-address must each be acknowledged
//! via a status poll before data is written.

use std::time::Duration;

/// Size of one firmware block transferred and committed per program step.
pub const BLOCK_SIZE: usize = 2048;

/// Address of the first byte of application flash on the target.
pub const START_ADDRESS: u32 = 0x0800_0000;

/// Length of the optional DFU metadata suffix at the end of an image.
pub const SUFFIX_LENGTH: usize = 16;

/// Vendor id a valid suffix is expected to carry.
pub const SUFFIX_VENDOR_ID: u16 = 0x0483;

/// Product id a valid suffix is expected to carry.
pub const SUFFIX_PRODUCT_ID: u16 = 0xDF11;

// bRequest values
pub(crate) const REQUEST_DNLOAD: u8 = 0x01;
pub(crate) const REQUEST_GET_STATUS: u8 = 0x03;
pub(crate) const REQUEST_CLEAR_STATUS: u8 = 0x04;

// wValue values for the DNLOAD request
pub(crate) const VALUE_COMMAND: u16 = 0;
pub(crate) const VALUE_DATA: u16 = 2;

// Command bytes carried in the DNLOAD command phase
const CMD_SET_ADDRESS: u8 = 0x21;
const CMD_ERASE: u8 = 0x41;

/// Length of a GETSTATUS response.
pub(crate) const STATUS_RESPONSE_LENGTH: usize = 6;

/// Timeout for a single control transfer.
pub(crate) const CONTROL_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause between the reset request and the final status query, giving the
/// device time to leave the bootloader.
pub(crate) const REBOOT_SETTLE: Duration = Duration::from_millis(1000);

/// Commands sent through the DNLOAD request's command phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadCommand {
    /// Latch the target address for the next data transfer.
    SetAddress(u32),
    /// Erase the flash page containing the given address.
    EraseAddress(u32),
    /// Erase the whole chip.
    MassErase,
}

impl DownloadCommand {
    pub(crate) fn encode(&self) -> Vec<u8> {
        match *self {
            DownloadCommand::SetAddress(address) => encode_address(CMD_SET_ADDRESS, address),
            DownloadCommand::EraseAddress(address) => encode_address(CMD_ERASE, address),
            DownloadCommand::MassErase => vec![CMD_ERASE],
        }
    }
}

fn encode_address(command: u8, address: u32) -> Vec<u8> {
    let mut packet = Vec::with_capacity(5);
    packet.push(command);
    packet.extend_from_slice(&address.to_le_bytes());
    packet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_address_encodes_little_endian() {
        assert_eq!(
            DownloadCommand::SetAddress(0x0800_0800).encode(),
            [0x21, 0x00, 0x08, 0x00, 0x08]
        );
    }

    #[test]
    fn erase_address_encodes_little_endian() {
        assert_eq!(
            DownloadCommand::EraseAddress(START_ADDRESS).encode(),
            [0x41, 0x00, 0x00, 0x00, 0x08]
        );
    }

    #[test]
    fn mass_erase_is_a_single_command_byte() {
        assert_eq!(DownloadCommand::MassErase.encode(), [0x41]);
    }

    #[test]
    fn block_chunking_covers_payload_exactly() {
        // 5000 bytes at 2048 per block: 2048, 2048, 904.
        let payload = vec![0u8; 5000];
        let chunks: Vec<&[u8]> = payload.chunks(BLOCK_SIZE).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 2048);
        assert_eq!(chunks[1].len(), 2048);
        assert_eq!(chunks[2].len(), 904);
        assert_eq!(chunks.iter().map(|c| c.len()).sum::<usize>(), payload.len());
    }

    #[test]
    fn block_addresses_increase_strictly_by_block_size() {
        let payload = vec![0u8; 3 * BLOCK_SIZE + 1];
        let mut previous = None;
        for (index, chunk) in payload.chunks(BLOCK_SIZE).enumerate() {
            let address = START_ADDRESS + (index * BLOCK_SIZE) as u32;
            if let Some(previous) = previous {
                assert_eq!(address - previous, BLOCK_SIZE as u32);
            }
            previous = Some(address);
            assert!(!chunk.is_empty());
        }
        assert_eq!(payload.chunks(BLOCK_SIZE).count(), 4);
    }
}
