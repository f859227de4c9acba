//! DLE-framed serial protocol for addressed command messaging.
//!
//! This crate implements a byte-oriented framing protocol for exchanging
//! small, addressed command messages over unreliable serial-style transports
//! (RS-232, RS-485, and anything else that delivers bytes one at a time).
//! Frames are delimited with DLE control sequences, byte-stuffed so payload
//! data can carry the escape value, and protected by a single-byte additive
//! checksum transmitted as its two's complement.
//!
//! # Protocol Overview
//!
//! ```text
//! DLE SOH [DST SRC] CMD' OPT1' OPT2' [SEQ] [DLE STX DATA'...] DLE EOT CHK
//! ```
//!
//! Every frame carries a command byte and two option bytes. The address pair
//! and the sequence byte are present only when the corresponding mode is
//! enabled at construction; the data section is present only when the
//! payload is non-empty. Fields marked `'` are byte-stuffed: a literal 0x10
//! is sent as `0x10 0xEF`.
//!
//! The receive side is an incremental state machine: hand it bytes as they
//! arrive and it signals frame boundaries and validity as each byte is
//! processed, resynchronizing after noise, partial frames, and transmission
//! errors.
//!
//! # Example
//!
//! ```rust
//! use framelink_protocol::{FeedEvent, Framer, Message};
//!
//! let mut framer = Framer::with_modes(false, false);
//! let msg = Message::new(0x05, 0x00, 0x00).with_payload([0x10, 0x41]);
//! let frame = framer.encode(&msg)?;
//!
//! let mut last = FeedEvent::None;
//! for byte in frame {
//!     last = framer.feed(byte);
//! }
//! assert_eq!(last, FeedEvent::FrameValid);
//! assert_eq!(framer.payload(), [0x10, 0x41]);
//! # Ok::<(), framelink_protocol::ProtocolError>(())
//! ```

mod constants;
mod error;
mod framer;
mod types;

pub use constants::*;
pub use error::*;
pub use framer::*;
pub use types::*;
