//! Native DESFire commands wrapped in ISO 7816-4 APDUs
//!
//! Every native command travels as `90 INS 00 00 [Lc data] 00` and every
//! response comes back as `data 91 SW2`, where SW2 is the native status.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use crate::{
    Error, Result,
    constants::iso,
    status::PiccStatus,
    transport::TagTransport,
};

/// Native DESFire command
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NativeCommand {
    ins: u8,
    data: Bytes,
}

impl NativeCommand {
    /// Create a command without data
    pub(crate) const fn new(ins: u8) -> Self {
        Self {
            ins,
            data: Bytes::new(),
        }
    }

    /// Create a command carrying data
    pub(crate) fn with_data(ins: u8, data: impl Into<Bytes>) -> Self {
        Self {
            ins,
            data: data.into(),
        }
    }

    /// Native instruction code
    pub(crate) const fn ins(&self) -> u8 {
        self.ins
    }

    /// Instruction code followed by the command data
    pub(crate) fn native_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + self.data.len());
        buf.put_u8(self.ins);
        buf.put_slice(&self.data);
        buf.freeze()
    }

    /// Serialize to a wrapped APDU
    pub(crate) fn to_bytes(&self) -> Bytes {
        debug_assert!(self.data.len() <= u8::MAX as usize);

        let mut buf = BytesMut::with_capacity(6 + self.data.len());
        buf.put_u8(iso::CLA);
        buf.put_u8(self.ins);
        buf.put_u8(0x00);
        buf.put_u8(0x00);
        if !self.data.is_empty() {
            buf.put_u8(self.data.len() as u8);
            buf.put_slice(&self.data);
        }
        buf.put_u8(0x00);
        buf.freeze()
    }
}

/// Native DESFire response
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NativeResponse {
    status: PiccStatus,
    data: Bytes,
}

impl NativeResponse {
    /// Parse a wrapped response
    pub(crate) fn from_bytes(raw: &Bytes) -> Result<Self> {
        if raw.len() < 2 {
            return Err(Error::InvalidResponse("Response shorter than status word"));
        }

        let split = raw.len() - 2;
        let (sw1, sw2) = (raw[split], raw[split + 1]);
        if sw1 != iso::SW1_NATIVE {
            return Err(Error::UnexpectedStatus { sw1, sw2 });
        }

        Ok(Self {
            status: PiccStatus::from_u8(sw2),
            data: raw.slice(..split),
        })
    }

    /// Native status of the response
    pub(crate) const fn status(&self) -> PiccStatus {
        self.status
    }

    /// Response data without the status word
    pub(crate) const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Consume the response, returning its data
    pub(crate) fn into_data(self) -> Bytes {
        self.data
    }
}

/// Send a native command and parse its response
///
/// Card error statuses are returned as [`Error::Picc`]. Both a plain success
/// and a request for an additional frame are handed back to the caller.
pub(crate) fn transceive(
    transport: &mut dyn TagTransport,
    command: &NativeCommand,
) -> Result<NativeResponse> {
    let raw = transport.transmit_raw(&command.to_bytes())?;
    let response = NativeResponse::from_bytes(&raw)?;

    if response.status.is_error() {
        warn!(
            ins = format_args!("{:#04X}", command.ins()),
            status = %response.status,
            "Card rejected command"
        );
        return Err(Error::Picc(response.status));
    }

    debug!(
        ins = format_args!("{:#04X}", command.ins()),
        status = %response.status,
        length = response.data.len(),
        "Native command completed"
    );
    Ok(response)
}
