//! Frame encoding and the byte-at-a-time decode state machine.
//!
//! The wire format carries one addressed command message per frame
//! (`'` marks fields subject to byte stuffing):
//!
//! ```text
//! DLE SOH [DST SRC] CMD' OPT1' OPT2' [SEQ] [DLE STX DATA'...] DLE EOT CHK
//! ```
//!
//! - `[DST SRC]` is present only in multi-address mode, `[SEQ]` only when
//!   sequencing is enabled, and the `DLE STX` data section only when the
//!   payload is non-empty.
//! - Any literal 0x10 inside a stuffed field is transmitted as `0x10 0xEF`.
//!   Address and sequence bytes are never stuffed.
//! - `CHK` is the two's complement of the mod-256 sum of every other frame
//!   byte, so a clean frame sums to zero including its checksum.

use std::collections::VecDeque;

use bytes::BytesMut;
use log::{debug, trace, warn};

use crate::constants::*;
use crate::error::ProtocolError;
use crate::types::Message;

/// Framer configuration, fixed for the life of the instance.
#[derive(Debug, Clone)]
pub struct FramerConfig {
    /// Carry explicit destination/source address bytes in each frame.
    pub multi_address: bool,
    /// Tag transmitted frames with a free-running sequence byte.
    pub sequencing: bool,
    /// Receive payload capacity in bytes; a frame whose payload runs past
    /// this is dropped with [`FeedEvent::Overflow`].
    pub max_payload: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        FramerConfig {
            multi_address: false,
            sequencing: false,
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }
}

/// Outcome of feeding one received byte to the framer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEvent {
    /// No frame boundary was crossed.
    None,
    /// A start-of-frame marker was recognized.
    FrameStarted,
    /// A complete frame arrived and its checksum is good.
    FrameValid,
    /// A complete frame arrived but failed the checksum; the field accessors
    /// hold whatever the corrupted frame carried.
    FrameInvalid,
    /// The payload overran the configured capacity and the frame was dropped.
    Overflow,
}

/// Receive state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RxState {
    /// Waiting for a frame start marker.
    Idle,
    /// First address byte of the header.
    SrcAddr,
    /// Second address byte of the header.
    DstAddr,
    /// Command byte.
    Command,
    /// First option byte.
    Option1,
    /// Second option byte.
    Option2,
    /// Sequence byte.
    Sequence,
    /// Byte following a DLE.
    Control,
    /// Payload bytes.
    Data,
    /// Checksum byte following the end-of-transmission pair.
    Checksum,
}

/// Owns the transmit and receive state for one end of a serial link.
///
/// The transmit side is touched only by [`Framer::encode`], the receive side
/// only by [`Framer::feed`] and the accessors. The framer itself is
/// single-threaded; if the transport delivers bytes on another thread,
/// serialize them into `feed` through a channel or mutex.
#[derive(Debug)]
pub struct Framer {
    config: FramerConfig,

    /// Transmit checksum accumulator, reset at the start of each encode.
    tx_checksum: u8,
    /// Free-running transmit sequence counter.
    tx_sequence: u8,

    /// Current receive state.
    rx_state: RxState,
    /// Receive checksum accumulator.
    rx_checksum: u8,
    /// Header field state interrupted by the most recent escape, so the
    /// stuffed byte can be routed back to the right slot.
    rx_escaped: RxState,
    rx_command: u8,
    rx_option1: u8,
    rx_option2: u8,
    rx_src_addr: u8,
    rx_dst_addr: u8,
    rx_sequence: u8,
    /// Payload accumulator, cleared on each frame start.
    rx_payload: BytesMut,
}

impl Framer {
    /// Create a framer with the given configuration.
    pub fn new(config: FramerConfig) -> Self {
        let capacity = config.max_payload;
        Framer {
            config,
            tx_checksum: 0,
            tx_sequence: 1,
            rx_state: RxState::Idle,
            rx_checksum: 0,
            rx_escaped: RxState::Data,
            rx_command: 0,
            rx_option1: 0,
            rx_option2: 0,
            rx_src_addr: 0,
            rx_dst_addr: 0,
            rx_sequence: 0,
            rx_payload: BytesMut::with_capacity(capacity),
        }
    }

    /// Create a framer with the given modes and default payload capacity.
    pub fn with_modes(multi_address: bool, sequencing: bool) -> Self {
        Framer::new(FramerConfig {
            multi_address,
            sequencing,
            ..FramerConfig::default()
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    // ========================================================================
    // Transmit side
    // ========================================================================

    /// Encode a message into a wire frame ready for transmission.
    ///
    /// The receive side is untouched. When sequencing is enabled the frame
    /// carries the current sequence counter, which then advances by one and
    /// wraps silently at the byte boundary.
    pub fn encode(&mut self, msg: &Message) -> Result<Vec<u8>, ProtocolError> {
        if msg.payload.len() > self.config.max_payload {
            return Err(ProtocolError::PayloadTooLarge {
                max: self.config.max_payload,
                actual: msg.payload.len(),
            });
        }

        self.tx_checksum = 0;
        // Worst case doubles every stuffable byte on top of the fixed overhead.
        let mut frame = Vec::with_capacity(2 * msg.payload.len() + 16);

        // Header
        self.stuff(&mut frame, CH_DLE, false);
        self.stuff(&mut frame, CH_SOH, false);

        // Addresses ride unstuffed
        if self.config.multi_address {
            self.stuff(&mut frame, msg.destination, false);
            self.stuff(&mut frame, msg.source, false);
        }

        self.stuff(&mut frame, msg.command, true);
        self.stuff(&mut frame, msg.option1, true);
        self.stuff(&mut frame, msg.option2, true);

        if self.config.sequencing {
            self.stuff(&mut frame, self.tx_sequence, false);
            self.tx_sequence = self.tx_sequence.wrapping_add(1);
        }

        // Data section only when there is data
        if !msg.payload.is_empty() {
            self.stuff(&mut frame, CH_DLE, false);
            self.stuff(&mut frame, CH_STX, false);
            for &byte in &msg.payload {
                self.stuff(&mut frame, byte, true);
            }
        }

        // Trailer, then the two's complement of everything sent so far
        self.stuff(&mut frame, CH_DLE, false);
        self.stuff(&mut frame, CH_EOT, false);
        frame.push(self.tx_checksum.wrapping_neg());

        Ok(frame)
    }

    /// Append one byte to the frame, folding it into the running checksum
    /// and stuffing the placeholder after an escapable DLE. Stuffing nests at
    /// most one level, so a single check suffices.
    fn stuff(&mut self, frame: &mut Vec<u8>, byte: u8, escape: bool) {
        self.tx_checksum = self.tx_checksum.wrapping_add(byte);
        frame.push(byte);
        if escape && byte == CH_DLE {
            self.tx_checksum = self.tx_checksum.wrapping_add(CH_SPC);
            frame.push(CH_SPC);
        }
    }

    // ========================================================================
    // Receive side
    // ========================================================================

    /// Process one received byte, advancing the decode state machine.
    ///
    /// Bytes must be fed strictly in arrival order. Every byte is folded into
    /// the running checksum before its state is examined; the accumulator is
    /// re-seeded when a start-of-header is recognized, so noise preceding a
    /// frame cannot poison it.
    pub fn feed(&mut self, byte: u8) -> FeedEvent {
        self.rx_checksum = self.rx_checksum.wrapping_add(byte);

        match self.rx_state {
            RxState::Idle => {
                if byte == CH_DLE {
                    self.rx_payload.clear();
                    self.enter_control(RxState::Data);
                    return FeedEvent::FrameStarted;
                }
                FeedEvent::None
            }

            RxState::SrcAddr => {
                self.rx_src_addr = byte;
                self.rx_state = RxState::DstAddr;
                FeedEvent::None
            }

            RxState::DstAddr => {
                self.rx_dst_addr = byte;
                self.rx_state = RxState::Command;
                FeedEvent::None
            }

            RxState::Command => {
                if byte == CH_DLE {
                    self.enter_control(RxState::Command);
                } else {
                    self.rx_command = byte;
                    self.rx_state = RxState::Option1;
                }
                FeedEvent::None
            }

            RxState::Option1 => {
                if byte == CH_DLE {
                    self.enter_control(RxState::Option1);
                } else {
                    self.rx_option1 = byte;
                    self.rx_state = RxState::Option2;
                }
                FeedEvent::None
            }

            RxState::Option2 => {
                if byte == CH_DLE {
                    self.enter_control(RxState::Option2);
                } else {
                    self.rx_option2 = byte;
                    self.rx_state = self.after_option2();
                }
                FeedEvent::None
            }

            RxState::Sequence => {
                self.rx_sequence = byte;
                self.rx_state = RxState::Data;
                FeedEvent::None
            }

            RxState::Control => match byte {
                CH_SOH => {
                    // The generic add above counted DLE and SOH already; the
                    // re-seed pins the baseline no matter what preceded the
                    // header.
                    self.rx_checksum = CHECKSUM_SEED;
                    self.rx_state = if self.config.multi_address {
                        RxState::SrcAddr
                    } else {
                        RxState::Command
                    };
                    FeedEvent::None
                }
                CH_STX => {
                    self.rx_state = RxState::Data;
                    FeedEvent::None
                }
                CH_EOT => {
                    self.rx_state = RxState::Checksum;
                    FeedEvent::None
                }
                CH_SPC => self.unstuff(),
                _ => {
                    // Malformed control sequence: drop the frame, resync.
                    self.rx_state = RxState::Idle;
                    FeedEvent::None
                }
            },

            RxState::Data => {
                if byte == CH_DLE {
                    self.enter_control(RxState::Data);
                    FeedEvent::None
                } else {
                    self.push_payload(byte)
                }
            }

            RxState::Checksum => {
                self.rx_state = RxState::Idle;
                if self.rx_checksum == 0 {
                    FeedEvent::FrameValid
                } else {
                    FeedEvent::FrameInvalid
                }
            }
        }
    }

    /// Enter the control state, remembering which state the DLE interrupted.
    fn enter_control(&mut self, from: RxState) {
        self.rx_escaped = from;
        self.rx_state = RxState::Control;
    }

    /// Route a stuffed-escape placeholder back to the slot the escape
    /// interrupted: the pair `DLE SPC` reconstructs a literal DLE there.
    fn unstuff(&mut self) -> FeedEvent {
        match self.rx_escaped {
            RxState::Command => {
                self.rx_command = CH_DLE;
                self.rx_state = RxState::Option1;
                FeedEvent::None
            }
            RxState::Option1 => {
                self.rx_option1 = CH_DLE;
                self.rx_state = RxState::Option2;
                FeedEvent::None
            }
            RxState::Option2 => {
                self.rx_option2 = CH_DLE;
                self.rx_state = self.after_option2();
                FeedEvent::None
            }
            _ => {
                self.rx_state = RxState::Data;
                self.push_payload(CH_DLE)
            }
        }
    }

    /// State following the second option byte.
    fn after_option2(&self) -> RxState {
        if self.config.sequencing {
            RxState::Sequence
        } else {
            RxState::Data
        }
    }

    /// Append a decoded payload byte, dropping the frame when the buffer is
    /// at capacity.
    fn push_payload(&mut self, byte: u8) -> FeedEvent {
        if self.rx_payload.len() >= self.config.max_payload {
            self.rx_state = RxState::Idle;
            self.rx_checksum = 0;
            return FeedEvent::Overflow;
        }
        self.rx_payload.extend_from_slice(&[byte]);
        FeedEvent::None
    }

    /// Feed a complete frame and return the decoded message.
    ///
    /// Shares all receive state with [`Framer::feed`]; after an error the
    /// stream position is wherever the failure left it, so call
    /// [`Framer::reset`] before abandoning a byte source.
    pub fn decode(&mut self, frame: &[u8]) -> Result<Message, ProtocolError> {
        for &byte in frame {
            match self.feed(byte) {
                FeedEvent::FrameValid => return Ok(self.message()),
                FeedEvent::FrameInvalid => {
                    return Err(ProtocolError::ChecksumMismatch {
                        residual: self.rx_checksum,
                    })
                }
                FeedEvent::Overflow => {
                    return Err(ProtocolError::PayloadOverflow {
                        max: self.config.max_payload,
                    })
                }
                FeedEvent::None | FeedEvent::FrameStarted => {}
            }
        }
        Err(ProtocolError::IncompleteFrame)
    }

    /// Drop any in-progress receive state and return to idle.
    pub fn reset(&mut self) {
        self.rx_state = RxState::Idle;
        self.rx_checksum = 0;
        self.rx_payload.clear();
    }

    // ========================================================================
    // Receive accessors
    // ========================================================================
    //
    // Meaningful after a FrameValid or FrameInvalid event. A failed or
    // aborted frame leaves the slots holding whatever the last frame wrote;
    // they are overwritten field by field as the next frame advances.

    /// Command byte of the last completed frame.
    pub fn command(&self) -> u8 {
        self.rx_command
    }

    /// First option byte of the last completed frame.
    pub fn option1(&self) -> u8 {
        self.rx_option1
    }

    /// Second option byte of the last completed frame.
    pub fn option2(&self) -> u8 {
        self.rx_option2
    }

    /// Payload of the last completed frame.
    pub fn payload(&self) -> &[u8] {
        &self.rx_payload
    }

    /// Source-address slot. The first address byte of an incoming frame
    /// lands here: the peer encodes destination first, so this slot carries
    /// the address the frame was sent to.
    pub fn source_address(&self) -> u8 {
        self.rx_src_addr
    }

    /// Destination-address slot, filled by the second address byte of an
    /// incoming frame.
    pub fn destination_address(&self) -> u8 {
        self.rx_dst_addr
    }

    /// Sequence byte recorded from the last frame. Informational only; no
    /// ordering is enforced and gaps are not detected.
    pub fn sequence(&self) -> u8 {
        self.rx_sequence
    }

    /// Assemble a [`Message`] from the receive slots.
    pub fn message(&self) -> Message {
        Message {
            command: self.rx_command,
            option1: self.rx_option1,
            option2: self.rx_option2,
            destination: self.rx_dst_addr,
            source: self.rx_src_addr,
            payload: self.rx_payload.to_vec(),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// A simple synchronous interface for exchanging messages over any byte
/// stream (serial port, TCP socket, etc.).
///
/// Wraps a [`Framer`] with a queue of completed messages, so callers that
/// read the transport in chunks can push whole buffers and poll for messages.
#[derive(Debug)]
pub struct ProtocolSession {
    framer: Framer,
    inbox: VecDeque<Message>,
    valid_frames: u64,
    invalid_frames: u64,
    overflows: u64,
}

impl Default for ProtocolSession {
    fn default() -> Self {
        ProtocolSession::new(FramerConfig::default())
    }
}

impl ProtocolSession {
    /// Create a new protocol session.
    pub fn new(config: FramerConfig) -> Self {
        ProtocolSession {
            framer: Framer::new(config),
            inbox: VecDeque::new(),
            valid_frames: 0,
            invalid_frames: 0,
            overflows: 0,
        }
    }

    /// Encode a message for transmission.
    pub fn encode_message(&mut self, msg: &Message) -> Result<Vec<u8>, ProtocolError> {
        self.framer.encode(msg)
    }

    /// Feed received data into the decoder, queueing completed messages.
    pub fn feed(&mut self, data: &[u8]) {
        for &byte in data {
            match self.framer.feed(byte) {
                FeedEvent::FrameStarted => trace!("frame started"),
                FeedEvent::FrameValid => {
                    let msg = self.framer.message();
                    debug!(
                        "decoded frame: command 0x{:02X}, {} payload bytes",
                        msg.command,
                        msg.payload.len()
                    );
                    self.valid_frames += 1;
                    self.inbox.push_back(msg);
                }
                FeedEvent::FrameInvalid => {
                    warn!(
                        "dropping frame with bad checksum (command 0x{:02X})",
                        self.framer.command()
                    );
                    self.invalid_frames += 1;
                }
                FeedEvent::Overflow => {
                    warn!(
                        "dropping frame: payload exceeded {} bytes",
                        self.framer.config().max_payload
                    );
                    self.overflows += 1;
                }
                FeedEvent::None => {}
            }
        }
    }

    /// Pop the next decoded message, if one is ready.
    pub fn try_decode(&mut self) -> Option<Message> {
        self.inbox.pop_front()
    }

    /// Count of frames received with a good checksum.
    pub fn valid_frames(&self) -> u64 {
        self.valid_frames
    }

    /// Count of frames dropped for a bad checksum.
    pub fn invalid_frames(&self) -> u64 {
        self.invalid_frames
    }

    /// Count of frames dropped for payload overflow.
    pub fn overflows(&self) -> u64 {
        self.overflows
    }

    /// Reset the session, dropping queued messages and in-progress state.
    pub fn reset(&mut self) {
        self.framer.reset();
        self.inbox.clear();
    }
}
