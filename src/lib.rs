//! This crate reprograms supported keyboards over their USB DFU bootloader
//! and can watch a directory so that new firmware images are flashed the
//! moment they appear.
//!
//! # Example: flashing every attached bootloader-mode device
//! ```rust, no_run
//! use keyflash::{Context, FirmwareImage, Operation};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Read and validate the firmware image
//! let image = FirmwareImage::from_file(Path::new("firmware.bin"))?;
//!
//! // Scan for supported devices
//! let context = Context::new()?;
//! for device in context.enumerate()? {
//!     if !device.in_bootloader_mode() {
//!         continue;
//!     }
//!
//!     // Program the image and reboot the device into its new firmware
//!     let mut handle = context.open(&device)?;
//!     handle.flash(&image).execute()?;
//! }
//!
//! println!("Done!");
//! # Ok(())
//! # }
//! ```
//!
//! A [`FlashSession`] is an iterator over protocol steps, so callers that
//! want progress feedback can drive it step by step instead of calling
//! [`Operation::execute`]. The [`watcher`] module provides the directory
//! watching boundary and [`FlashLock`] enforces that at most one flash
//! operation is in flight system-wide.

pub mod catalog;
mod context;
mod device;
mod error;
mod firmware;
mod lock;
mod operation;
mod protocol;
mod session;
mod status;
pub mod watcher;

pub use catalog::CatalogEntry;
pub use context::Context;
pub use device::DiscoveredDevice;
pub use error::{Error, Result};
pub use firmware::{DfuSuffix, FirmwareImage};
pub use lock::{FlashGuard, FlashLock};
pub use operation::Operation;
pub use protocol::{DownloadCommand, BLOCK_SIZE, START_ADDRESS, SUFFIX_LENGTH};
pub use session::{BootloaderHandle, FlashSession};
pub use status::StatusSnapshot;
pub use watcher::{FirmwareWatcher, ShutdownHandle, WatchMessage};
