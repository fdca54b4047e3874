use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("Header truncated - need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Unknown header version {0}")]
    UnknownVersion(u8),

    #[error("Payload of {0} bytes does not fit the one byte length field")]
    PayloadTooLong(usize),

    #[error("Merged datagram does not start with a leading header carrying a TEID")]
    MissingLeadingHeader,
}
