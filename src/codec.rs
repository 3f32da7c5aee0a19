//! Pure (stateless) byte-exact serialize/parse functions shared by every
//! MIDI-CI message: the 13-byte common header (§4.1) and the chunked
//! property-message body layout.

use crate::constants::{
    COMMON_HEADER_SIZE, MAX_CHUNKS, SUB_ID_1_MIDI_CI, UNIVERSAL_NON_REALTIME, VERSION_1_2,
};
use crate::muid::Muid;
use crate::parse_error::CiParseError;
use crate::util::{push_u14, u14_from_midi};

/// The 13-byte header shared by every MIDI-CI message. Does not include the
/// surrounding `0xF0`/`0xF7` SysEx framing bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonHeader {
    pub address: u8,
    pub sub_id_2: u8,
    pub version: u8,
    pub source_muid: Muid,
    pub destination_muid: Muid,
}

impl CommonHeader {
    pub fn new(address: u8, sub_id_2: u8, source_muid: Muid, destination_muid: Muid) -> Self {
        CommonHeader {
            address,
            sub_id_2,
            version: VERSION_1_2,
            source_muid,
            destination_muid,
        }
    }

    pub fn extend_midi(&self, v: &mut Vec<u8>) {
        v.push(UNIVERSAL_NON_REALTIME);
        v.push(self.address);
        v.push(SUB_ID_1_MIDI_CI);
        v.push(self.sub_id_2);
        v.push(self.version);
        self.source_muid.extend_midi(v);
        self.destination_muid.extend_midi(v);
    }

    /// Parses the header, returning it along with the number of bytes
    /// consumed (always [`COMMON_HEADER_SIZE`] on success).
    pub fn from_midi(m: &[u8]) -> Result<(Self, usize), CiParseError> {
        if m.len() < COMMON_HEADER_SIZE {
            return Err(CiParseError::TooShortForCommonHeader(m.len()));
        }
        if m[0] != UNIVERSAL_NON_REALTIME || m[2] != SUB_ID_1_MIDI_CI {
            return Err(CiParseError::NotMidiCi);
        }
        let address = m[1];
        let sub_id_2 = m[3];
        let version = m[4];
        let source_muid = Muid::from_midi(&m[5..9])?;
        let destination_muid = Muid::from_midi(&m[9..13])?;
        Ok((
            CommonHeader {
                address,
                sub_id_2,
                version,
                source_muid,
                destination_muid,
            },
            COMMON_HEADER_SIZE,
        ))
    }
}

/// One packet's worth of a chunked property-message body, as it appears
/// after the common header:
/// `request_id(1) header_size(int14) header(..) num_chunks(int14)
/// chunk_index(int14) chunk_data_size(int14) chunk_data(..)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPacket {
    pub request_id: u8,
    pub header: Vec<u8>,
    pub num_chunks: u16,
    pub chunk_index: u16,
    pub chunk_data: Vec<u8>,
}

impl ChunkPacket {
    pub fn extend_midi(&self, v: &mut Vec<u8>) {
        v.push(self.request_id);
        push_u14(self.header.len() as u16, v);
        v.extend_from_slice(&self.header);
        push_u14(self.num_chunks, v);
        push_u14(self.chunk_index, v);
        push_u14(self.chunk_data.len() as u16, v);
        v.extend_from_slice(&self.chunk_data);
    }

    pub fn from_midi(m: &[u8]) -> Result<Self, CiParseError> {
        if m.is_empty() {
            return Err(CiParseError::UnexpectedEnd);
        }
        let request_id = m[0];
        let mut off = 1;
        let header_size = u14_from_midi(&m[off..]).map_err(|_| CiParseError::UnexpectedEnd)? as usize;
        off += 2;
        if off + header_size > m.len() {
            return Err(CiParseError::DeclaredLengthExceedsBuffer {
                declared: header_size,
                available: m.len().saturating_sub(off),
            });
        }
        let header = m[off..off + header_size].to_vec();
        off += header_size;
        let num_chunks = u14_from_midi(&m[off..]).map_err(|_| CiParseError::UnexpectedEnd)?;
        off += 2;
        let chunk_index = u14_from_midi(&m[off..]).map_err(|_| CiParseError::UnexpectedEnd)?;
        off += 2;
        let chunk_data_size =
            u14_from_midi(&m[off..]).map_err(|_| CiParseError::UnexpectedEnd)? as usize;
        off += 2;
        if off + chunk_data_size > m.len() {
            return Err(CiParseError::DeclaredLengthExceedsBuffer {
                declared: chunk_data_size,
                available: m.len().saturating_sub(off),
            });
        }
        let chunk_data = m[off..off + chunk_data_size].to_vec();
        Ok(ChunkPacket {
            request_id,
            header,
            num_chunks,
            chunk_index,
            chunk_data,
        })
    }
}

/// Splits `header`+`data` into one or more [`ChunkPacket`]s of at most
/// `max_chunk_size` bytes of `chunk_data` each. Every packet carries the
/// full `header`, `num_chunks`, and a 1-based `chunk_index`. An empty
/// `data` still yields exactly one packet (`num_chunks = 1, chunk_index =
/// 1, chunk_data_size = 0`).
pub fn split_into_chunks(
    request_id: u8,
    header: &[u8],
    data: &[u8],
    max_chunk_size: usize,
) -> Result<Vec<ChunkPacket>, CiParseError> {
    let max_chunk_size = max_chunk_size.max(1);
    let num_chunks = if data.is_empty() {
        1
    } else {
        data.len().div_ceil(max_chunk_size)
    };
    if num_chunks > MAX_CHUNKS {
        return Err(CiParseError::TooManyChunks(num_chunks));
    }
    let mut packets = Vec::with_capacity(num_chunks);
    if data.is_empty() {
        packets.push(ChunkPacket {
            request_id,
            header: header.to_vec(),
            num_chunks: 1,
            chunk_index: 1,
            chunk_data: Vec::new(),
        });
    } else {
        for (i, chunk) in data.chunks(max_chunk_size).enumerate() {
            packets.push(ChunkPacket {
                request_id,
                header: header.to_vec(),
                num_chunks: num_chunks as u16,
                chunk_index: (i + 1) as u16,
                chunk_data: chunk.to_vec(),
            });
        }
    }
    Ok(packets)
}
