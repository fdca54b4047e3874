#![allow(clippy::unusual_byte_groupings)]
use crate::HeaderError;

pub const VERSION_LEADING: u8 = 3;
pub const VERSION_CONTINUATION: u8 = 4;
pub const MESSAGE_TYPE_GPDU: u8 = 255; // TS29.281, table 6.1-1
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

const FIXED_TAIL_LEN: usize = 5; // compressed TEID, sequence number, N-PDU number, next extension type

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    /// Version 3.  A standalone packet, or the first sub-packet of a merged datagram.
    Leading { message_type: u8 },
    /// Version 4.  Any later sub-packet of a merged datagram.
    Continuation,
}

/// Variable length header.
///
/// ```text
///  byte 0   | version (3) | PT | E | S | PN | T |
///  byte 1   | length                             |
///  (1 byte)   message type              - version 3 only
///  (4 bytes)  TEID, big endian          - T=1 only
///  1 byte     compressed TEID
///  2 bytes    sequence number, big endian
///  1 byte     N-PDU number
///  1 byte     next extension header type
/// ```
///
/// The encoded size is 7, 8, 11 or 12 bytes depending on the version and T flag.
/// `length` is the size of the payload that follows this header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GtpnHeader {
    pub kind: HeaderKind,
    pub protocol_type: bool,
    pub extension_header_flag: bool,
    pub sequence_number_flag: bool,
    pub n_pdu_number_flag: bool,
    pub length: u8,
    pub teid: Option<u32>,
    pub compressed_teid: u8,
    pub sequence_number: u16,
    pub n_pdu_number: u8,
    pub next_extension_type: u8,
}

impl GtpnHeader {
    /// Header for a standalone packet or the head of a merged datagram.  Always carries the full TEID.
    pub fn leading(teid: u32, compressed_teid: u8, payload_len: usize) -> Result<Self, HeaderError> {
        Ok(GtpnHeader {
            kind: HeaderKind::Leading {
                message_type: MESSAGE_TYPE_GPDU,
            },
            teid: Some(teid),
            ..Self::base(compressed_teid, payload_len)?
        })
    }

    /// Header for a later sub-packet of a merged datagram.  Pass a TEID when the receiver does not yet
    /// know the binding of `compressed_teid`.
    pub fn continuation(
        teid: Option<u32>,
        compressed_teid: u8,
        payload_len: usize,
    ) -> Result<Self, HeaderError> {
        Ok(GtpnHeader {
            kind: HeaderKind::Continuation,
            teid,
            ..Self::base(compressed_teid, payload_len)?
        })
    }

    fn base(compressed_teid: u8, payload_len: usize) -> Result<Self, HeaderError> {
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(HeaderError::PayloadTooLong(payload_len));
        }
        Ok(GtpnHeader {
            kind: HeaderKind::Continuation,
            protocol_type: true,
            extension_header_flag: false,
            sequence_number_flag: true,
            n_pdu_number_flag: true,
            length: payload_len as u8,
            teid: None,
            compressed_teid,
            sequence_number: 0,
            n_pdu_number: 0,
            next_extension_type: 0,
        })
    }

    pub fn version(&self) -> u8 {
        match self.kind {
            HeaderKind::Leading { .. } => VERSION_LEADING,
            HeaderKind::Continuation => VERSION_CONTINUATION,
        }
    }

    pub fn is_leading(&self) -> bool {
        matches!(self.kind, HeaderKind::Leading { .. })
    }

    pub fn serialized_len(&self) -> usize {
        serialized_len(self.is_leading(), self.teid.is_some())
    }

    /// Append the encoded header to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.reserve(self.serialized_len());
        buf.push(
            (self.version() << 5)
                | (self.protocol_type as u8) << 4
                | (self.extension_header_flag as u8) << 3
                | (self.sequence_number_flag as u8) << 2
                | (self.n_pdu_number_flag as u8) << 1
                | self.teid.is_some() as u8,
        );
        buf.push(self.length);
        if let HeaderKind::Leading { message_type } = self.kind {
            buf.push(message_type);
        }
        if let Some(teid) = self.teid {
            buf.extend_from_slice(&teid.to_be_bytes());
        }
        buf.push(self.compressed_teid);
        buf.extend_from_slice(&self.sequence_number.to_be_bytes());
        buf.push(self.n_pdu_number);
        buf.push(self.next_extension_type);
    }

    /// Decode a header from the start of `buf`, returning it along with the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), HeaderError> {
        if buf.len() < 2 {
            return Err(HeaderError::Truncated {
                needed: 2,
                available: buf.len(),
            });
        }
        let first = buf[0];
        let version = first >> 5;
        let leading = match version {
            VERSION_LEADING => true,
            VERSION_CONTINUATION => false,
            x => return Err(HeaderError::UnknownVersion(x)),
        };
        let teid_present = first & 0b1 == 1;
        let needed = serialized_len(leading, teid_present);
        if buf.len() < needed {
            return Err(HeaderError::Truncated {
                needed,
                available: buf.len(),
            });
        }

        let mut offset = 2;
        let kind = if leading {
            offset += 1;
            HeaderKind::Leading {
                message_type: buf[2],
            }
        } else {
            HeaderKind::Continuation
        };
        let teid = if teid_present {
            let teid = u32::from_be_bytes([
                buf[offset],
                buf[offset + 1],
                buf[offset + 2],
                buf[offset + 3],
            ]);
            offset += 4;
            Some(teid)
        } else {
            None
        };

        let header = GtpnHeader {
            kind,
            protocol_type: first & 0b0001_0000 != 0,
            extension_header_flag: first & 0b0000_1000 != 0,
            sequence_number_flag: first & 0b0000_0100 != 0,
            n_pdu_number_flag: first & 0b0000_0010 != 0,
            length: buf[1],
            teid,
            compressed_teid: buf[offset],
            sequence_number: u16::from_be_bytes([buf[offset + 1], buf[offset + 2]]),
            n_pdu_number: buf[offset + 3],
            next_extension_type: buf[offset + 4],
        };
        Ok((header, needed))
    }
}

fn serialized_len(leading: bool, teid_present: bool) -> usize {
    let mut len = 2 + FIXED_TAIL_LEN;
    if leading {
        len += 1;
    }
    if teid_present {
        len += 4;
    }
    len
}

impl std::fmt::Display for GtpnHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{} len={} code={}", self.version(), self.length, self.compressed_teid)?;
        if let Some(teid) = self.teid {
            write!(f, " teid={:x}", teid)?;
        }
        Ok(())
    }
}
