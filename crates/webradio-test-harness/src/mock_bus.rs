//! Mock bus for deterministic testing of the tuner driver.
//!
//! [`MockBus`] implements the [`Bus`] trait with pre-loaded request/response
//! pairs. Every command write must match the next expectation byte for byte;
//! the paired 16-byte response is returned by the next full-length read.
//! One-byte reads are status polls and return scripted status bytes, then
//! the idle status (CTS set) once the script runs out.
//!
//! # Example
//!
//! ```
//! use webradio_test_harness::MockBus;
//!
//! let bus = MockBus::new();
//! // SET_PROPERTY RX_VOLUME = 63, answered with a plain CTS status.
//! bus.expect_ok(&[0x12, 0x00, 0x40, 0x00, 0x00, 0x3F]);
//! assert_eq!(bus.remaining_expectations(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use webradio_core::bus::Bus;
use webradio_core::error::{Error, Result};

/// Status byte with only clear-to-send set.
pub const CTS: u8 = 0x80;
/// Length of a response frame.
pub const RESPONSE_LEN: usize = 16;

#[derive(Debug, Clone)]
struct Expectation {
    request: Vec<u8>,
    response: [u8; RESPONSE_LEN],
}

#[derive(Debug)]
struct Inner {
    expectations: VecDeque<Expectation>,
    pending_response: Option<[u8; RESPONSE_LEN]>,
    status_script: VecDeque<u8>,
    idle_status: u8,
    status_reads: usize,
    sent_log: Vec<Vec<u8>>,
    reset_log: Vec<bool>,
}

/// A scripted [`Bus`].
///
/// Clones share state: keep one clone in the test and move the other into
/// the driver.
#[derive(Debug, Clone)]
pub struct MockBus {
    inner: Arc<Mutex<Inner>>,
}

impl MockBus {
    pub fn new() -> Self {
        MockBus {
            inner: Arc::new(Mutex::new(Inner {
                expectations: VecDeque::new(),
                pending_response: None,
                status_script: VecDeque::new(),
                idle_status: CTS,
                status_reads: 0,
                sent_log: Vec::new(),
                reset_log: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add an expected write and the response returned for it.
    ///
    /// `response` is zero-padded to 16 bytes.
    pub fn expect(&self, request: &[u8], response: &[u8]) {
        let mut buf = [0u8; RESPONSE_LEN];
        let n = response.len().min(RESPONSE_LEN);
        buf[..n].copy_from_slice(&response[..n]);
        self.lock().expectations.push_back(Expectation {
            request: request.to_vec(),
            response: buf,
        });
    }

    /// Expect `request` and answer with a bare CTS status.
    pub fn expect_ok(&self, request: &[u8]) {
        self.expect(request, &[CTS]);
    }

    /// Queue status bytes returned by the next one-byte reads.
    pub fn script_status(&self, statuses: &[u8]) {
        self.lock().status_script.extend(statuses.iter().copied());
    }

    /// Status returned by one-byte reads once the script is empty.
    pub fn set_idle_status(&self, status: u8) {
        self.lock().idle_status = status;
    }

    /// Every write, in order.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.lock().sent_log.clone()
    }

    /// Every reset-line transition, in order.
    pub fn reset_transitions(&self) -> Vec<bool> {
        self.lock().reset_log.clone()
    }

    pub fn status_reads(&self) -> usize {
        self.lock().status_reads
    }

    pub fn remaining_expectations(&self) -> usize {
        self.lock().expectations.len()
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bus for MockBus {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        inner.sent_log.push(data.to_vec());

        let Some(expectation) = inner.expectations.pop_front() else {
            return Err(Error::Protocol("no more expectations in mock bus".into()));
        };
        if data != expectation.request.as_slice() {
            return Err(Error::Protocol(format!(
                "unexpected write: expected {:02X?}, got {:02X?}",
                expectation.request, data
            )));
        }
        inner.pending_response = Some(expectation.response);
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut inner = self.lock();
        if buf.len() == 1 {
            inner.status_reads += 1;
            let status = match inner.status_script.pop_front() {
                Some(s) => s,
                None => inner.idle_status,
            };
            buf[0] = status;
            return Ok(());
        }

        let Some(response) = inner.pending_response.take() else {
            return Err(Error::Bus("read with no pending response".into()));
        };
        let n = buf.len().min(RESPONSE_LEN);
        buf[..n].copy_from_slice(&response[..n]);
        Ok(())
    }

    async fn set_reset(&mut self, high: bool) -> Result<()> {
        self.lock().reset_log.push(high);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matched_write_returns_response() {
        let script = MockBus::new();
        script.expect(&[0x13, 0x00, 0x40, 0x00], &[0x80, 0x00, 0x00, 0x3F]);
        let mut bus = script.clone();

        bus.write(&[0x13, 0x00, 0x40, 0x00]).await.unwrap();
        let mut resp = [0u8; 16];
        bus.read(&mut resp).await.unwrap();
        assert_eq!(&resp[..4], &[0x80, 0x00, 0x00, 0x3F]);
        assert_eq!(script.remaining_expectations(), 0);
        assert_eq!(script.sent_data(), vec![vec![0x13, 0x00, 0x40, 0x00]]);
    }

    #[tokio::test]
    async fn mismatched_write_is_protocol_error() {
        let mut bus = MockBus::new();
        bus.expect_ok(&[0x11]);
        let err = bus.write(&[0x12]).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[tokio::test]
    async fn status_script_then_idle() {
        let mut bus = MockBus::new();
        bus.script_status(&[0x00, 0x00]);
        let mut status = [0u8; 1];
        for expected in [0x00, 0x00, CTS, CTS] {
            bus.read(&mut status).await.unwrap();
            assert_eq!(status[0], expected);
        }
        assert_eq!(bus.status_reads(), 4);
    }

    #[tokio::test]
    async fn response_read_without_write_fails() {
        let mut bus = MockBus::new();
        let mut resp = [0u8; 16];
        assert!(matches!(
            bus.read(&mut resp).await,
            Err(Error::Bus(_))
        ));
    }

    #[tokio::test]
    async fn reset_line_is_logged() {
        let mut bus = MockBus::new();
        bus.set_reset(false).await.unwrap();
        bus.set_reset(true).await.unwrap();
        assert_eq!(bus.reset_transitions(), vec![false, true]);
    }
}
