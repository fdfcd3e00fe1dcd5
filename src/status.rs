//! Bootloader status polling.
//!
//! The poller is deliberately dumb: it reads the status a fixed number of
//! times, honoring the poll interval the device reports, and hands the
//! latest snapshot back. Interpreting the status is the caller's job; only
//! hard transport failures propagate from here.

use std::thread;
use std::time::Duration;

use rusb::{DeviceHandle, Direction, Recipient, RequestType, UsbContext};

use crate::protocol::{CONTROL_TIMEOUT, REQUEST_GET_STATUS, STATUS_RESPONSE_LENGTH};

/// Status-query attempts per poll call. Not configurable at the protocol
/// layer; callers requiring more poll again.
pub(crate) const POLL_ATTEMPTS: usize = 3;

/// The bootloader's reported state as of the last status query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Status code of the last completed request.
    pub status: u8,
    /// Minimum time in milliseconds the host should wait before the next
    /// status query.
    pub poll_timeout: u32,
    /// Bootloader state machine code.
    pub state: u8,
    /// Index of an optional status description string descriptor.
    pub string_index: u8,
}

impl StatusSnapshot {
    /// The device-provided wait before the next status query.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.poll_timeout))
    }

    /// Folds a GETSTATUS response into the snapshot. Short responses mean
    /// "status unchanged" and leave the snapshot untouched.
    pub(crate) fn update(&mut self, response: &[u8]) {
        if response.len() == STATUS_RESPONSE_LENGTH {
            self.status = response[0];
            self.poll_timeout = u32::from_le_bytes([response[1], response[2], response[3], 0]);
            self.state = response[4];
            self.string_index = response[5];
        }
    }
}

/// Polls the status [`POLL_ATTEMPTS`] times through the given query
/// primitive, sleeping the latest snapshot's poll interval after each
/// attempt. A failed read mid-poll leaves the snapshot unchanged and the
/// remaining attempts proceed; only a failure on the final attempt is
/// reported.
pub(crate) fn poll_with<F>(
    mut query: F,
    snapshot: &mut StatusSnapshot,
) -> std::result::Result<StatusSnapshot, rusb::Error>
where
    F: FnMut(&mut [u8]) -> std::result::Result<usize, rusb::Error>,
{
    let mut outcome = Ok(());
    for _ in 0..POLL_ATTEMPTS {
        let mut response = [0u8; STATUS_RESPONSE_LENGTH];
        outcome = match query(&mut response) {
            Ok(length) => {
                snapshot.update(&response[..length.min(STATUS_RESPONSE_LENGTH)]);
                Ok(())
            }
            Err(error) => Err(error),
        };
        thread::sleep(snapshot.poll_interval());
    }
    outcome.map(|_| *snapshot)
}

/// Issues one GETSTATUS control-in request.
pub(crate) fn query_status<T: UsbContext>(
    handle: &DeviceHandle<T>,
    response: &mut [u8],
) -> std::result::Result<usize, rusb::Error> {
    handle.read_control(
        rusb::request_type(Direction::In, RequestType::Class, Recipient::Interface),
        REQUEST_GET_STATUS,
        0,
        0,
        response,
        CONTROL_TIMEOUT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_parses_response_layout() {
        let mut snapshot = StatusSnapshot::default();
        snapshot.update(&[0x00, 0x0A, 0x01, 0x00, 0x04, 0x02]);
        assert_eq!(snapshot.status, 0x00);
        assert_eq!(snapshot.poll_timeout, 0x010A);
        assert_eq!(snapshot.state, 0x04);
        assert_eq!(snapshot.string_index, 0x02);
    }

    #[test]
    fn short_response_means_status_unchanged() {
        let mut snapshot = StatusSnapshot {
            status: 1,
            poll_timeout: 5,
            state: 2,
            string_index: 3,
        };
        let before = snapshot;
        snapshot.update(&[]);
        assert_eq!(snapshot, before);
        snapshot.update(&[0xFF, 0xFF, 0xFF]);
        assert_eq!(snapshot, before);
    }

    #[test]
    fn poller_issues_exactly_three_attempts() {
        let mut attempts = 0;
        let mut snapshot = StatusSnapshot::default();
        let polled = poll_with(
            |response| {
                attempts += 1;
                response.copy_from_slice(&[0, 0, 0, 0, 5, 0]);
                Ok(STATUS_RESPONSE_LENGTH)
            },
            &mut snapshot,
        )
        .unwrap();
        assert_eq!(attempts, POLL_ATTEMPTS);
        assert_eq!(polled.state, 5);
        assert_eq!(polled, snapshot);
    }

    #[test]
    fn failed_reads_are_retried_until_the_final_attempt() {
        let mut attempts = 0;
        let mut snapshot = StatusSnapshot::default();
        let polled = poll_with(
            |response| {
                attempts += 1;
                if attempts < POLL_ATTEMPTS {
                    Err(rusb::Error::Io)
                } else {
                    response.copy_from_slice(&[0, 0, 0, 0, 2, 0]);
                    Ok(STATUS_RESPONSE_LENGTH)
                }
            },
            &mut snapshot,
        )
        .unwrap();
        assert_eq!(attempts, POLL_ATTEMPTS);
        assert_eq!(polled.state, 2);
    }

    #[test]
    fn failure_on_final_attempt_propagates() {
        let mut attempts = 0;
        let mut snapshot = StatusSnapshot::default();
        let result = poll_with(
            |response| {
                attempts += 1;
                if attempts < POLL_ATTEMPTS {
                    response.copy_from_slice(&[0, 0, 0, 0, 2, 0]);
                    Ok(STATUS_RESPONSE_LENGTH)
                } else {
                    Err(rusb::Error::Pipe)
                }
            },
            &mut snapshot,
        );
        assert_eq!(attempts, POLL_ATTEMPTS);
        assert!(matches!(result, Err(rusb::Error::Pipe)));
        // the last successful read is still retained
        assert_eq!(snapshot.state, 2);
    }
}
