//! Wire constants from §6 of the specification.

/// Universal Non-Realtime SysEx ID, byte 0 of every MIDI-CI payload.
pub const UNIVERSAL_NON_REALTIME: u8 = 0x7E;
/// MIDI-CI sub-ID 1, byte 2 of every MIDI-CI payload.
pub const SUB_ID_1_MIDI_CI: u8 = 0x0D;
/// MIDI-CI version byte for v1.2, byte 4 of every MIDI-CI payload.
pub const VERSION_1_2: u8 = 0x02;

/// Address byte meaning "the whole Function Block".
pub const ADDRESS_FUNCTION_BLOCK: u8 = 0x7F;
/// Address byte meaning "the whole Group".
pub const ADDRESS_GROUP: u8 = 0x7E;

/// Broadcast MUID, 28-bit value.
pub const BROADCAST_MUID_32: u32 = 0x0FFF_FFFF;

/// Size of the common header shared by every MIDI-CI message, in bytes.
pub const COMMON_HEADER_SIZE: usize = 13;

/// Largest chunk count representable in an int14 field.
pub const MAX_CHUNKS: usize = 0x3FFF;

pub const DEFAULT_RECEIVABLE_MAX_SYSEX_SIZE: u32 = 4096;
pub const DEFAULT_MAX_PROPERTY_CHUNK_SIZE: usize = 512;
pub const DEFAULT_MAX_SIMULTANEOUS_PROPERTY_REQUESTS: u8 = 8;

/// Sub-ID 2 values identifying each MIDI-CI message type.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
pub enum SubId2 {
    #[strum(serialize = "ProfileInquiry")]
    ProfileInquiry = 0x20,
    ProfileInquiryReply = 0x21,
    SetProfileOn = 0x22,
    SetProfileOff = 0x23,
    ProfileEnabledReport = 0x24,
    ProfileDisabledReport = 0x25,
    ProfileAddedReport = 0x26,
    ProfileRemovedReport = 0x27,
    ProfileDetailsInquiry = 0x28,
    ProfileDetailsReply = 0x29,
    ProfileSpecificData = 0x2F,
    PropertyGetCapabilities = 0x30,
    PropertyGetCapabilitiesReply = 0x31,
    GetPropertyData = 0x34,
    GetPropertyDataReply = 0x35,
    SetPropertyData = 0x36,
    SetPropertyDataReply = 0x37,
    SubscribeProperty = 0x38,
    SubscribePropertyReply = 0x39,
    PropertyNotify = 0x3F,
    ProcessInquiryCapabilities = 0x40,
    ProcessInquiryCapabilitiesReply = 0x41,
    MidiMessageReportInquiry = 0x42,
    MidiMessageReportReply = 0x43,
    EndOfMidiMessageReport = 0x44,
    DiscoveryInquiry = 0x70,
    DiscoveryReply = 0x71,
    EndpointInquiry = 0x72,
    EndpointReply = 0x73,
    Ack = 0x7D,
    InvalidateMuid = 0x7E,
    Nak = 0x7F,
}

impl SubId2 {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(b: u8) -> Option<Self> {
        use SubId2::*;
        Some(match b {
            0x20 => ProfileInquiry,
            0x21 => ProfileInquiryReply,
            0x22 => SetProfileOn,
            0x23 => SetProfileOff,
            0x24 => ProfileEnabledReport,
            0x25 => ProfileDisabledReport,
            0x26 => ProfileAddedReport,
            0x27 => ProfileRemovedReport,
            0x28 => ProfileDetailsInquiry,
            0x29 => ProfileDetailsReply,
            0x2F => ProfileSpecificData,
            0x30 => PropertyGetCapabilities,
            0x31 => PropertyGetCapabilitiesReply,
            0x34 => GetPropertyData,
            0x35 => GetPropertyDataReply,
            0x36 => SetPropertyData,
            0x37 => SetPropertyDataReply,
            0x38 => SubscribeProperty,
            0x39 => SubscribePropertyReply,
            0x3F => PropertyNotify,
            0x40 => ProcessInquiryCapabilities,
            0x41 => ProcessInquiryCapabilitiesReply,
            0x42 => MidiMessageReportInquiry,
            0x43 => MidiMessageReportReply,
            0x44 => EndOfMidiMessageReport,
            0x70 => DiscoveryInquiry,
            0x71 => DiscoveryReply,
            0x72 => EndpointInquiry,
            0x73 => EndpointReply,
            0x7D => Ack,
            0x7E => InvalidateMuid,
            0x7F => Nak,
            _ => return None,
        })
    }
}
