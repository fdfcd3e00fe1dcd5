//! Flash sessions: the exclusive device handle and the programming state
//! machine.

use std::thread;

use rusb::{DeviceHandle, Direction, Recipient, RequestType, UsbContext};

use crate::catalog::CatalogEntry;
use crate::device::DiscoveredDevice;
use crate::error::{Error, Result};
use crate::firmware::FirmwareImage;
use crate::operation::Operation;
use crate::protocol::{
    DownloadCommand, BLOCK_SIZE, CONTROL_TIMEOUT, REBOOT_SETTLE, REQUEST_CLEAR_STATUS,
    REQUEST_DNLOAD, START_ADDRESS, STATUS_RESPONSE_LENGTH, VALUE_COMMAND, VALUE_DATA,
};
use crate::status::{self, StatusSnapshot};

/// Exclusive handle to a device in bootloader mode.
///
/// Owns the claimed USB device handle for the session's lifetime and
/// provides the raw protocol operations the state machine is built from.
pub struct BootloaderHandle<T: UsbContext> {
    handle: DeviceHandle<T>,
    entry: &'static CatalogEntry,
    status: StatusSnapshot,
}

impl<T: UsbContext> BootloaderHandle<T> {
    /// Relocates a discovered device by its bus coordinates and opens it.
    ///
    /// The bootloader-mode precondition is checked before any USB traffic.
    /// The vendor/product pair is re-checked against the descriptor so that
    /// a reenumeration between the scan and this call cannot hand us some
    /// entirely different device at the same address.
    pub(crate) fn open(context: &T, device: &DiscoveredDevice) -> Result<Self> {
        device.ensure_bootloader()?;

        for candidate in context.devices()?.iter() {
            if candidate.bus_number() != device.usb_bus_number
                || candidate.address() != device.usb_bus_address
            {
                continue;
            }
            let descriptor = candidate.device_descriptor()?;
            if descriptor.vendor_id() != device.vendor_id
                || descriptor.product_id() != device.product_id
            {
                return Err(Error::DeviceNotFound);
            }

            let mut handle = candidate.open()?;
            match handle.set_auto_detach_kernel_driver(true) {
                Ok(()) | Err(rusb::Error::NotSupported) => {}
                Err(error) => return Err(Error::Usb(error)),
            }
            handle.claim_interface(0)?;
            return Ok(BootloaderHandle {
                handle,
                entry: device.entry,
                status: StatusSnapshot::default(),
            });
        }

        Err(Error::DeviceNotFound)
    }

    /// Name of the device this handle is talking to.
    pub fn device_name(&self) -> &'static str {
        self.entry.device
    }

    /// Latest status snapshot observed on this handle.
    pub fn status(&self) -> StatusSnapshot {
        self.status
    }

    /// Starts a flash session programming the image's payload at the
    /// application base address.
    pub fn flash<'d>(&mut self, image: &'d FirmwareImage) -> FlashSession<'d, '_, T> {
        FlashSession::new(self, image.payload())
    }

    /// Issues the status-clear request.
    pub(crate) fn clear_status(&mut self) -> std::result::Result<(), rusb::Error> {
        self.control_out(REQUEST_CLEAR_STATUS, VALUE_DATA, &[]).map(|_| ())
    }

    /// Sends a bootloader command and polls until it is acknowledged.
    pub(crate) fn command(
        &mut self,
        command: DownloadCommand,
    ) -> std::result::Result<(), rusb::Error> {
        self.control_out(REQUEST_DNLOAD, VALUE_COMMAND, &command.encode())?;
        self.poll().map(|_| ())
    }

    /// Transfers one block of firmware data to the latched address.
    pub(crate) fn write_block(&mut self, chunk: &[u8]) -> std::result::Result<usize, rusb::Error> {
        self.control_out(REQUEST_DNLOAD, VALUE_DATA, chunk)
    }

    /// Bounded status poll; see [`crate::status`].
    pub(crate) fn poll(&mut self) -> std::result::Result<StatusSnapshot, rusb::Error> {
        let Self { handle, status, .. } = self;
        status::poll_with(|response| status::query_status(handle, response), status)
    }

    /// Reboots the device out of the bootloader: poll, reset request, settle
    /// pause, then one final status query to observe the post-reset state.
    pub(crate) fn reboot(&mut self) -> std::result::Result<StatusSnapshot, rusb::Error> {
        self.poll()?;
        self.control_out(REQUEST_DNLOAD, VALUE_DATA, &[])?;
        thread::sleep(REBOOT_SETTLE);

        let Self { handle, status, .. } = self;
        let mut response = [0u8; STATUS_RESPONSE_LENGTH];
        let length = status::query_status(handle, &mut response)?;
        status.update(&response[..length.min(STATUS_RESPONSE_LENGTH)]);
        Ok(*status)
    }

    fn control_out(
        &self,
        request: u8,
        value: u16,
        data: &[u8],
    ) -> std::result::Result<usize, rusb::Error> {
        self.handle.write_control(
            rusb::request_type(Direction::Out, RequestType::Class, Recipient::Interface),
            request,
            value,
            0,
            data,
            CONTROL_TIMEOUT,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    ClearingStatus,
    Erasing,
    WritingBlock { page: usize },
    Rebooting,
    Complete,
}

/// One complete attempt to program exactly one device with exactly one
/// validated firmware image.
///
/// The session is an iterator over protocol steps; each item is the
/// cumulative number of payload bytes sent, so a caller can drive it for
/// progress feedback or drain it with [`Operation::execute`]. The first
/// error fuses the iterator; blocks are never re-sent (retries happen only
/// inside the status poll).
pub struct FlashSession<'d, 'h, T: UsbContext> {
    handle: &'h mut BootloaderHandle<T>,
    payload: &'d [u8],
    phase: Phase,
    step: usize,
    sent: usize,
    done: bool,
}

impl<'d, 'h, T: UsbContext> FlashSession<'d, 'h, T> {
    fn new(handle: &'h mut BootloaderHandle<T>, payload: &'d [u8]) -> Self {
        Self {
            handle,
            payload,
            phase: Phase::ClearingStatus,
            step: 0,
            sent: 0,
            done: false,
        }
    }

    /// Number of protocol steps carried out so far.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Cumulative payload bytes transferred.
    pub fn bytes_sent(&self) -> usize {
        self.sent
    }

    /// True once the device has been programmed and rebooted.
    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    /// Latest bootloader status observed during this session.
    pub fn status(&self) -> StatusSnapshot {
        self.handle.status()
    }

    fn clear_status(&mut self) -> Result<()> {
        self.handle.clear_status().map_err(Error::StatusClearFailed)?;
        self.phase = Phase::Erasing;
        Ok(())
    }

    fn erase(&mut self) -> Result<()> {
        self.handle
            .command(DownloadCommand::MassErase)
            .map_err(Error::EraseFailed)?;
        self.phase = if self.payload.is_empty() {
            Phase::Rebooting
        } else {
            Phase::WritingBlock { page: 0 }
        };
        Ok(())
    }

    /// Erase, latch and write the block starting at payload offset `page`.
    /// The bootloader drops writes to a stale address, so both address
    /// commands must be acknowledged before the data goes out.
    fn write_block(&mut self, page: usize) -> Result<()> {
        let end = usize::min(page + BLOCK_SIZE, self.payload.len());
        let chunk = &self.payload[page..end];
        let address = START_ADDRESS + page as u32;

        self.handle
            .command(DownloadCommand::EraseAddress(address))
            .map_err(|source| Error::BlockWriteFailed { offset: page, source })?;
        self.handle
            .command(DownloadCommand::SetAddress(address))
            .map_err(|source| Error::BlockWriteFailed { offset: page, source })?;
        let written = self
            .handle
            .write_block(chunk)
            .map_err(|source| Error::BlockWriteFailed { offset: page, source })?;

        self.sent += written;
        self.phase = if end == self.payload.len() {
            Phase::Rebooting
        } else {
            Phase::WritingBlock { page: end }
        };
        Ok(())
    }

    fn reboot(&mut self) -> Result<()> {
        self.handle.reboot().map_err(Error::RebootFailed)?;
        self.phase = Phase::Complete;
        Ok(())
    }
}

impl<T: UsbContext> Iterator for FlashSession<'_, '_, T> {
    type Item = Result<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = match self.phase {
            Phase::ClearingStatus => self.clear_status(),
            Phase::Erasing => self.erase(),
            Phase::WritingBlock { page } => self.write_block(page),
            Phase::Rebooting => self.reboot(),
            Phase::Complete => {
                self.done = true;
                return None;
            }
        };

        // Ensure that the iterator is fused after an error occurs
        if result.is_err() {
            self.done = true;
        }
        self.step += 1;
        Some(result.map(|()| self.sent))
    }
}

impl<T: UsbContext> Operation for FlashSession<'_, '_, T> {
    fn total(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use rusb::{Direction, Recipient, RequestType};

    #[test]
    fn control_request_types_match_the_wire_encoding() {
        assert_eq!(
            rusb::request_type(Direction::Out, RequestType::Class, Recipient::Interface),
            0x21
        );
        assert_eq!(
            rusb::request_type(Direction::In, RequestType::Class, Recipient::Interface),
            0xA1
        );
    }
}
