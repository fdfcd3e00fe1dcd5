//! Implementations of the CLI subcommands.

use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use indicatif::{ProgressBar, ProgressStyle};
use keyflash::{
    watcher, Context, DiscoveredDevice, Error, FirmwareImage, FirmwareWatcher, FlashGuard,
    FlashLock, Operation, Result, WatchMessage,
};

/// Runs the watcher loop against one directory until shutdown or a watcher
/// failure.
///
/// Image validation and device enumeration happen inline; only a real
/// programming job claims the flash lock and moves to a worker thread.
/// Events arriving while that thread holds the lock are dropped with a
/// notice, never queued.
pub fn run(watch: &str) -> Result<()> {
    let directory = watcher::expand_home(watch);
    log::info!("Watching directory '{}'", directory.display());

    let watcher = FirmwareWatcher::new(&directory)?;
    let lock = FlashLock::new();
    let mut in_flight: Option<JoinHandle<()>> = None;

    loop {
        match watcher.recv() {
            WatchMessage::Firmware(path) => {
                log::info!("Detected firmware event: {}", path.display());
                if lock.is_busy() {
                    log::info!("Ignoring event; flashing already in progress");
                    continue;
                }
                match FlashJob::prepare(&path) {
                    Ok(Some(job)) => {
                        // The loop is the only acquirer and the lock is
                        // free, so this cannot fail.
                        let Some(guard) = lock.try_acquire() else {
                            continue;
                        };
                        // The previous worker released the lock long ago;
                        // this join only reaps it.
                        join_in_flight(in_flight.take());
                        in_flight = Some(thread::spawn(move || job.run(guard)));
                    }
                    Ok(None) => {}
                    Err(error) => {
                        log::error!("Failed to flash {}: {}", path.display(), error)
                    }
                }
            }
            WatchMessage::Error(error) => {
                join_in_flight(in_flight.take());
                return Err(Error::Watch(error));
            }
            WatchMessage::Shutdown => {
                log::info!("Stopping");
                join_in_flight(in_flight.take());
                return Ok(());
            }
        }
    }
}

/// A session already past its preamble runs to completion; shutdown only
/// stops new sessions from starting.
fn join_in_flight(in_flight: Option<JoinHandle<()>>) {
    if let Some(handle) = in_flight {
        let _ = handle.join();
    }
}

/// One ready-to-run programming job: a validated image plus the devices
/// found by a single enumeration pass.
struct FlashJob {
    context: Context,
    devices: Vec<DiscoveredDevice>,
    image: FirmwareImage,
    path: PathBuf,
}

impl FlashJob {
    /// Validates the image and scans for candidate devices. Returns `None`
    /// when there is nothing to program, in which case the flash lock is
    /// never touched.
    fn prepare(path: &Path) -> Result<Option<FlashJob>> {
        let image = FirmwareImage::from_file(path)?;
        let context = Context::new()?;

        let devices = match context.enumerate() {
            Ok(devices) => devices,
            Err(error) => {
                log::warn!("{}", error);
                Vec::new()
            }
        };
        if devices.is_empty() {
            log::info!("No compatible devices found");
            return Ok(None);
        }

        Ok(Some(FlashJob {
            context,
            devices,
            image,
            path: path.to_path_buf(),
        }))
    }

    /// Programs every bootloader-mode candidate in turn, sequentially.
    /// Holds the flash guard for the operation's full duration; dropping it
    /// on any exit path releases the lock.
    fn run(self, _guard: FlashGuard) {
        for device in &self.devices {
            if !device.in_bootloader_mode() {
                log::warn!("Device not in bootloader mode: {}", device);
                continue;
            }
            log::info!("Flashing device {} with {}", device, self.path.display());
            match flash_device(&self.context, device, &self.image) {
                Ok(()) => log::info!("Successfully flashed device {}", device),
                Err(error) => log::error!("Failed to flash device {}: {}", device, error),
            }
        }
    }
}

fn flash_device(
    context: &Context,
    device: &DiscoveredDevice,
    image: &FirmwareImage,
) -> Result<()> {
    let mut handle = context.open(device)?;
    let mut session = handle.flash(image);

    let bar = progress_bar(session.total() as u64);
    for progress in &mut session {
        match progress {
            Ok(sent) => bar.set_position(sent as u64),
            Err(error) => {
                bar.abandon();
                return Err(error);
            }
        }
    }
    bar.finish();
    Ok(())
}

fn progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar
}

/// Lists attached catalog devices.
pub fn devices() -> Result<()> {
    let context = Context::new()?;
    let devices = context.enumerate()?;
    if devices.is_empty() {
        println!("No supported devices attached");
        return Ok(());
    }
    for device in devices {
        let mode = if device.in_bootloader_mode() {
            " [bootloader]"
        } else {
            ""
        };
        println!(
            "{:04x}:{:04x}  {} ({}){}",
            device.vendor_id, device.product_id, device.entry.device, device.entry.vendor, mode
        );
    }
    Ok(())
}
