//! Common types used in the protocol.

/// An addressed command message.
///
/// The address bytes ride in the frame only when the framer is configured
/// for multi-address mode; the payload section is omitted from the wire
/// entirely when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Command byte.
    pub command: u8,
    /// First option byte.
    pub option1: u8,
    /// Second option byte.
    pub option2: u8,
    /// Destination address (multi-address mode only).
    pub destination: u8,
    /// Source address (multi-address mode only).
    pub source: u8,
    /// Payload bytes, zero or more.
    pub payload: Vec<u8>,
}

impl Message {
    /// Create a message with the given command and option bytes.
    pub fn new(command: u8, option1: u8, option2: u8) -> Self {
        Message {
            command,
            option1,
            option2,
            ..Message::default()
        }
    }

    /// Set the payload.
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Set the destination and source addresses.
    pub fn with_addresses(mut self, destination: u8, source: u8) -> Self {
        self.destination = destination;
        self.source = source;
        self
    }
}
