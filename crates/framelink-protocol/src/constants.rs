//! Protocol constants
//!
//! These constants define the control characters, buffer sizes, and checksum
//! seed used by the framing protocol.

// ============================================================================
// Control Characters
// ============================================================================

/// Start of header character.
pub const CH_SOH: u8 = 0x01;
/// Start of data character.
pub const CH_STX: u8 = 0x02;
/// End of transmission character.
pub const CH_EOT: u8 = 0x04;
/// Acknowledge character (conventional option byte value, no framing role).
pub const CH_ACK: u8 = 0x06;
/// Data link escape character - marks frame boundaries and stuffed bytes.
pub const CH_DLE: u8 = 0x10;
/// Negative acknowledge character (conventional option byte value).
pub const CH_NAK: u8 = 0x15;
/// Special character emitted after a stuffed DLE inside an escaped field.
pub const CH_SPC: u8 = 0xEF;

// ============================================================================
// Sizes
// ============================================================================

/// Default receive payload capacity in bytes.
pub const MAX_PAYLOAD_SIZE: usize = 256;
/// Worst-case encoded frame size for a default-capacity payload: every
/// stuffable byte doubled, plus the fixed header/trailer/checksum overhead.
pub const MAX_FRAME_SIZE: usize = 2 * MAX_PAYLOAD_SIZE + 16;

// ============================================================================
// Checksum
// ============================================================================

/// Receive checksum baseline immediately after a start-of-header is
/// recognized. The preamble pair counts toward the frame checksum exactly
/// once regardless of what arrived before it.
pub const CHECKSUM_SEED: u8 = CH_DLE + CH_SOH;
