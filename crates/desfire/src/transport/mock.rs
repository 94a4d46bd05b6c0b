//! Scripted transport for unit tests

use std::cell::Cell;
use std::collections::VecDeque;

use bytes::Bytes;

use super::{PcdError, TagTransport, TransportError};
use crate::status::PiccStatus;

/// Mock transport replaying scripted responses and diagnostic registers
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    /// Responses handed out in order
    pub(crate) responses: VecDeque<Result<Bytes, TransportError>>,
    /// Commands that were sent
    pub(crate) commands: Vec<Bytes>,
    /// Result of the next connect calls
    pub(crate) connect_result: Option<TransportError>,
    /// Result of the next disconnect calls
    pub(crate) disconnect_result: Option<TransportError>,
    /// Link error register
    pub(crate) last_error: Option<TransportError>,
    /// Reader error register
    pub(crate) last_pcd_error: Option<PcdError>,
    /// Card error register
    pub(crate) last_picc_error: Option<PiccStatus>,
    /// Number of connect calls
    pub(crate) connects: usize,
    /// Number of disconnect calls
    pub(crate) disconnects: usize,
    /// Number of link register reads
    pub(crate) error_queries: Cell<usize>,
    /// Number of reader register reads
    pub(crate) pcd_queries: Cell<usize>,
    /// Number of card register reads
    pub(crate) picc_queries: Cell<usize>,
}

impl MockTransport {
    /// Create a new mock transport with the given responses
    pub(crate) fn new(responses: Vec<Result<Bytes, TransportError>>) -> Self {
        Self {
            responses: responses.into(),
            ..Default::default()
        }
    }

    /// Create a mock transport whose next exchange fails with an I/O error
    pub(crate) fn failing_io() -> Self {
        Self::new(vec![Err(TransportError::Io)])
    }

    /// Queue a wrapped native response with the given data and PICC status
    pub(crate) fn push_native(&mut self, data: &[u8], status: u8) {
        let mut response = data.to_vec();
        response.extend_from_slice(&[0x91, status]);
        self.responses.push_back(Ok(Bytes::from(response)));
    }
}

impl TagTransport for MockTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        self.connects += 1;
        self.connect_result.clone().map_or(Ok(()), Err)
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.disconnects += 1;
        self.disconnect_result.clone().map_or(Ok(()), Err)
    }

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        self.commands.push(Bytes::copy_from_slice(command));
        self.responses
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::other("No scripted response")))
    }

    fn last_error(&self) -> Option<TransportError> {
        self.error_queries.set(self.error_queries.get() + 1);
        self.last_error.clone()
    }

    fn last_pcd_error(&self) -> Option<PcdError> {
        self.pcd_queries.set(self.pcd_queries.get() + 1);
        self.last_pcd_error
    }

    fn last_picc_error(&self) -> Option<PiccStatus> {
        self.picc_queries.set(self.picc_queries.get() + 1);
        self.last_picc_error
    }
}
