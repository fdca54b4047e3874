use crate::{GtpnHeader, HeaderError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubPacket<'a> {
    pub header: GtpnHeader,
    pub payload: &'a [u8],
}

/// Split a merged datagram into its sub-packets, using each header's length to find the next one.
pub fn split_merged(datagram: &[u8]) -> Result<Vec<SubPacket<'_>>, HeaderError> {
    let mut sub_packets = vec![];
    let mut rest = datagram;
    while !rest.is_empty() {
        let (header, header_len) = GtpnHeader::decode(rest)?;
        if sub_packets.is_empty() && !(header.is_leading() && header.teid.is_some()) {
            return Err(HeaderError::MissingLeadingHeader);
        }
        let end = header_len + header.length as usize;
        if rest.len() < end {
            return Err(HeaderError::Truncated {
                needed: end,
                available: rest.len(),
            });
        }
        sub_packets.push(SubPacket {
            payload: &rest[header_len..end],
            header,
        });
        rest = &rest[end..];
    }
    Ok(sub_packets)
}
