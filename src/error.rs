use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use std::result::Result as StdResult;

/// Errors which can occur during image validation, device discovery and
/// flashing.
#[derive(Debug)]
pub enum Error {
    /// The firmware image carries a valid DFU suffix. Suffixed images are
    /// bootloader binaries, which cannot be programmed by this tool.
    UnsupportedImageType,

    /// The firmware image carries a DFU suffix whose embedded vendor or
    /// product id does not match the expected bootloader identity.
    SuffixIdentityMismatch {
        /// Expected (vendor id, product id) pair.
        expected: (u16, u16),
        /// Pair actually embedded in the suffix.
        found: (u16, u16),
    },

    /// It was attempted to open a flash session against a device that is
    /// still running application firmware.
    DeviceNotInBootloaderMode(&'static str),

    /// The selected device disappeared between enumeration and opening.
    DeviceNotFound,

    /// The USB device scan itself failed at the transport level.
    Enumeration(rusb::Error),

    /// The status-clear request at the start of a session failed.
    StatusClearFailed(rusb::Error),

    /// The whole-chip erase failed.
    EraseFailed(rusb::Error),

    /// A block transfer failed. Carries the payload byte offset of the
    /// block that could not be written.
    BlockWriteFailed { offset: usize, source: rusb::Error },

    /// The device-reset request at the end of a session failed.
    RebootFailed(rusb::Error),

    /// An error occurred during the raw USB communication outside of a
    /// specific protocol stage (context setup, open, claim).
    Usb(rusb::Error),

    /// The firmware image could not be read from disk.
    Io(std::io::Error),

    /// The filesystem watcher failed.
    Watch(notify::Error),
}

impl Display for Error {
    fn fmt(&self, fmt: &mut Formatter) -> StdResult<(), std::fmt::Error> {
        match self {
            Error::UnsupportedImageType => {
                write!(fmt, "unsupported image type (DFU-suffixed binary)")
            }
            Error::SuffixIdentityMismatch { expected, found } => write!(
                fmt,
                "invalid vendor or product id in image suffix, expected {:#06x}:{:#06x} got {:#06x}:{:#06x}",
                expected.0, expected.1, found.0, found.1
            ),
            Error::DeviceNotInBootloaderMode(device) => {
                write!(fmt, "device {} is not in bootloader mode", device)
            }
            Error::DeviceNotFound => write!(fmt, "device disappeared before it could be opened"),
            Error::Enumeration(error) => write!(fmt, "USB device scan failed: {}", error),
            Error::StatusClearFailed(error) => {
                write!(fmt, "failed to clear device status: {}", error)
            }
            Error::EraseFailed(error) => write!(fmt, "failed to erase flash: {}", error),
            Error::BlockWriteFailed { offset, source } => write!(
                fmt,
                "failed to write firmware block at offset {:#x}: {}",
                offset, source
            ),
            Error::RebootFailed(error) => write!(fmt, "failed to reboot device: {}", error),
            Error::Usb(error) => write!(fmt, "USB error: {}", error),
            Error::Io(error) => write!(fmt, "failed to read firmware image: {}", error),
            Error::Watch(error) => write!(fmt, "filesystem watcher error: {}", error),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Enumeration(error)
            | Error::StatusClearFailed(error)
            | Error::EraseFailed(error)
            | Error::BlockWriteFailed { source: error, .. }
            | Error::RebootFailed(error)
            | Error::Usb(error) => Some(error),
            Error::Io(error) => Some(error),
            Error::Watch(error) => Some(error),
            _ => None,
        }
    }
}

impl From<rusb::Error> for Error {
    fn from(error: rusb::Error) -> Self {
        Error::Usb(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io(error)
    }
}

impl From<notify::Error> for Error {
    fn from(error: notify::Error) -> Self {
        Error::Watch(error)
    }
}

/// Shorthand for a Result with the crate's own Error type.
pub type Result<T> = StdResult<T, Error>;
