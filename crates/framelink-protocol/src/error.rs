//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when working with the framing protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Transmit payload exceeds the configured capacity.
    #[error("payload too large: maximum {max} bytes, got {actual}")]
    PayloadTooLarge {
        /// Maximum allowed payload length.
        max: usize,
        /// Actual payload length.
        actual: usize,
    },

    /// Receive payload overran the configured capacity and the frame was
    /// dropped.
    #[error("receive payload exceeded {max} bytes")]
    PayloadOverflow {
        /// Configured payload capacity.
        max: usize,
    },

    /// A complete frame arrived but its bytes did not sum to zero.
    #[error("checksum mismatch: residual 0x{residual:02X}")]
    ChecksumMismatch {
        /// The nonzero mod-256 sum left over after the checksum byte.
        residual: u8,
    },

    /// The input ended before a complete frame was decoded.
    #[error("incomplete frame")]
    IncompleteFrame,
}
