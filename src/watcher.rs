//! Filesystem boundary: watches one directory for firmware images.
//!
//! Only Create/Modify events for `.hex` and `.bin` files cross this
//! boundary; everything else is filtered out before it can reach the
//! validator. Messages are delivered on a plain channel so the run loop can
//! block on them in arrival order.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::Result;

/// Messages delivered by a [`FirmwareWatcher`].
#[derive(Debug)]
pub enum WatchMessage {
    /// A firmware image appeared or changed at the given path.
    Firmware(PathBuf),
    /// The underlying watcher reported a runtime error.
    Error(notify::Error),
    /// A shutdown was requested; no further messages follow.
    Shutdown,
}

/// Watches a directory and reports firmware-file events.
pub struct FirmwareWatcher {
    rx: Receiver<WatchMessage>,
    tx: Sender<WatchMessage>,
    // Dropping the notify watcher stops event delivery, so it is held for
    // the lifetime of this struct even though nothing calls into it.
    _watcher: RecommendedWatcher,
}

impl FirmwareWatcher {
    /// Starts watching a directory (non-recursively). Construction failure
    /// is unrecoverable for the caller: without a watcher there is nothing
    /// to run.
    pub fn new(directory: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel();

        let event_tx = tx.clone();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for path in firmware_paths(&event) {
                        let _ = event_tx.send(WatchMessage::Firmware(path));
                    }
                }
                Err(error) => {
                    let _ = event_tx.send(WatchMessage::Error(error));
                }
            }
        })?;
        watcher.watch(directory, RecursiveMode::NonRecursive)?;

        Ok(FirmwareWatcher {
            rx,
            tx,
            _watcher: watcher,
        })
    }

    /// Blocks until the next message arrives.
    pub fn recv(&self) -> WatchMessage {
        self.rx.recv().unwrap_or(WatchMessage::Shutdown)
    }

    /// Returns a handle that can request shutdown from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.tx.clone(),
        }
    }
}

/// Requests a [`FirmwareWatcher`]'s run loop to stop.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Sender<WatchMessage>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(WatchMessage::Shutdown);
    }
}

/// Extracts the firmware-file paths out of a notify event, applying the
/// boundary filter: Create/Modify events only, `.hex`/`.bin` files only.
fn firmware_paths(event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => event
            .paths
            .iter()
            .filter(|path| is_firmware_file(path))
            .cloned()
            .collect(),
        _ => Vec::new(),
    }
}

/// Whether a path looks like a firmware image by extension.
pub fn is_firmware_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("hex") | Some("bin")
    )
}

/// Expands a leading `~` or `~/` to the user's home directory. Paths
/// without the shorthand (and `~user` forms) are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(home) = directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()) {
        if path == "~" {
            return home;
        }
        if let Some(rest) = path.strip_prefix("~/") {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use std::time::Duration;

    #[test]
    fn extension_filter_accepts_firmware_files_only() {
        assert!(is_firmware_file(Path::new("/fw/moonlander.bin")));
        assert!(is_firmware_file(Path::new("firmware.hex")));
        assert!(!is_firmware_file(Path::new("notes.txt")));
        assert!(!is_firmware_file(Path::new("bin")));
        assert!(!is_firmware_file(Path::new("/fw/archive.bin.gz")));
    }

    #[test]
    fn only_create_and_modify_events_pass_the_boundary() {
        let create = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/fw/a.bin"));
        assert_eq!(firmware_paths(&create), vec![PathBuf::from("/fw/a.bin")]);

        let modify = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/fw/a.hex"));
        assert_eq!(firmware_paths(&modify), vec![PathBuf::from("/fw/a.hex")]);

        let remove = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/fw/a.bin"));
        assert!(firmware_paths(&remove).is_empty());

        let wrong_extension =
            Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("/fw/a.txt"));
        assert!(firmware_paths(&wrong_extension).is_empty());
    }

    #[test]
    fn home_shorthand_expands() {
        let Some(dirs) = directories::BaseDirs::new() else {
            // No home directory in this environment; nothing to expand.
            return;
        };
        let home = dirs.home_dir().to_path_buf();
        assert_eq!(expand_home("~"), home);
        assert_eq!(expand_home("~/Downloads/fw"), home.join("Downloads/fw"));
        assert_eq!(expand_home("/tmp/fw"), PathBuf::from("/tmp/fw"));
        assert_eq!(expand_home("~user/fw"), PathBuf::from("~user/fw"));
    }

    #[test]
    fn watcher_reports_a_created_firmware_file() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = FirmwareWatcher::new(dir.path()).unwrap();

        std::fs::write(dir.path().join("firmware.bin"), b"\x00\x01\x02\x03").unwrap();

        // The backend may emit several events for one write; accept the
        // first firmware message and ignore the rest.
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        loop {
            let remaining = deadline
                .checked_duration_since(std::time::Instant::now())
                .expect("timed out waiting for watcher event");
            match watcher.rx.recv_timeout(remaining) {
                Ok(WatchMessage::Firmware(path)) => {
                    assert_eq!(path.file_name().unwrap(), "firmware.bin");
                    break;
                }
                Ok(_) => continue,
                Err(error) => panic!("watcher channel failed: {}", error),
            }
        }
    }

    #[test]
    fn shutdown_handle_enqueues_a_shutdown_message() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = FirmwareWatcher::new(dir.path()).unwrap();
        watcher.shutdown_handle().shutdown();
        assert!(matches!(watcher.recv(), WatchMessage::Shutdown));
    }
}
