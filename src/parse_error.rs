use std::fmt;

/// Returned when [`crate::Message::from_midi`] and similar were not successful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CiParseError {
    /// The given input ended before a message could be fully formed.
    UnexpectedEnd,
    /// A byte exceeded 7 bits where a 7-bit value was expected.
    ByteOverflow(u8),
    /// `bytes[0] != 0x7E` or `bytes[2] != 0x0D`: not a MIDI-CI Universal
    /// Non-Realtime SysEx payload.
    NotMidiCi,
    /// Buffer shorter than the 13-byte common header.
    TooShortForCommonHeader(usize),
    /// A declared `header_size` or `chunk_data_size` exceeds the bytes
    /// actually present in the buffer.
    DeclaredLengthExceedsBuffer { declared: usize, available: usize },
    /// Sub-ID 2 did not match any known MIDI-CI message type.
    UnknownSubId2(u8),
    /// A chunked body would require more chunks than fit in an int14.
    TooManyChunks(usize),
    /// The series of bytes was otherwise invalid.
    Invalid(&'static str),
    /// A CRPE header was not valid JSON, or was missing a required field.
    InvalidHeader(String),
}

impl std::error::Error for CiParseError {}

impl fmt::Display for CiParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error parsing MIDI-CI input: ")?;
        match self {
            Self::UnexpectedEnd => write!(f, "input ended before a message could be fully formed"),
            Self::ByteOverflow(b) => write!(f, "byte {:#04x} exceeded 7 bits", b),
            Self::NotMidiCi => write!(f, "not a MIDI-CI Universal Non-Realtime SysEx payload"),
            Self::TooShortForCommonHeader(len) => {
                write!(f, "buffer of {} bytes is too short for the 13-byte common header", len)
            }
            Self::DeclaredLengthExceedsBuffer { declared, available } => write!(
                f,
                "declared length {} exceeds the {} bytes available",
                declared, available
            ),
            Self::UnknownSubId2(b) => write!(f, "unknown sub-ID 2 {:#04x}", b),
            Self::TooManyChunks(n) => write!(f, "body would require {} chunks, exceeding the int14 ceiling", n),
            Self::Invalid(s) => write!(f, "{}", s),
            Self::InvalidHeader(s) => write!(f, "invalid CRPE header: {}", s),
        }
    }
}
