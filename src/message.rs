//! The closed set of MIDI-CI message variants (§4.2), their wire layouts,
//! and packet-level parsing.
//!
//! Chunked property messages are parsed one packet at a time: a [`Message`]
//! is only produced once a [`crate::messenger::Messenger`] has reassembled
//! every chunk of a request. [`parse_packet`] returns either a complete
//! [`Message`] (single-packet variants) or a [`RawChunk`] awaiting
//! reassembly.

use crate::address::Address;
use crate::codec::{ChunkPacket, CommonHeader};
use crate::constants::SubId2;
use crate::device_info::DeviceDetails;
use crate::muid::Muid;
use crate::parse_error::CiParseError;
use crate::profile_id::ProfileId;
use crate::util::{push_u14, push_u28, u14_from_midi, u28_from_midi};

/// Header fields shared by every message, outside the wire bytes: the
/// transport group is carried alongside a MIDI-CI payload, never inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Common {
    pub source_muid: Muid,
    pub destination_muid: Muid,
    pub address: Address,
    pub group: u8,
}

impl Common {
    pub fn new(source_muid: Muid, destination_muid: Muid, address: Address, group: u8) -> Self {
        Common {
            source_muid,
            destination_muid,
            address,
            group,
        }
    }

    fn header(&self, sub_id_2: SubId2) -> CommonHeader {
        CommonHeader::new(
            self.address.to_byte(),
            sub_id_2.to_u8(),
            self.source_muid,
            self.destination_muid,
        )
    }
}

fn read_ascii(m: &[u8], len: usize) -> Result<String, CiParseError> {
    if m.len() < len {
        return Err(CiParseError::UnexpectedEnd);
    }
    for &b in &m[..len] {
        if b > 0x7F {
            return Err(CiParseError::ByteOverflow(b));
        }
    }
    Ok(String::from_utf8_lossy(&m[..len]).into_owned())
}

/// ACK/NAK body, shared by [`Message::Ack`] and [`Message::Nak`] (§6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckNakBody {
    pub original_sub_id: u8,
    pub status_code: u8,
    pub status_data: u8,
    pub details: [u8; 5],
    pub message: String,
}

impl AckNakBody {
    fn extend_midi(&self, v: &mut Vec<u8>) {
        v.push(self.original_sub_id);
        v.push(self.status_code);
        v.push(self.status_data);
        v.extend_from_slice(&self.details);
        let text = self.message.as_bytes();
        push_u14(text.len() as u16, v);
        v.extend_from_slice(text);
    }

    fn from_midi(m: &[u8]) -> Result<Self, CiParseError> {
        if m.len() < 8 {
            return Err(CiParseError::UnexpectedEnd);
        }
        let original_sub_id = m[0];
        let status_code = m[1];
        let status_data = m[2];
        let mut details = [0u8; 5];
        details.copy_from_slice(&m[3..8]);
        let message_length = u14_from_midi(&m[8..10])? as usize;
        let message = read_ascii(&m[10..], message_length)?;
        Ok(AckNakBody {
            original_sub_id,
            status_code,
            status_data,
            details,
            message,
        })
    }
}

/// A single-packet message, fully reassembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    DiscoveryInquiry {
        common: Common,
        device_details: DeviceDetails,
        supported_categories: u8,
        max_sysex_size: u32,
        output_path_id: u8,
    },
    DiscoveryReply {
        common: Common,
        device_details: DeviceDetails,
        supported_categories: u8,
        max_sysex_size: u32,
        output_path_id: u8,
        function_block: u8,
    },
    EndpointInquiry {
        common: Common,
        status: u8,
    },
    EndpointReply {
        common: Common,
        status: u8,
        data: Vec<u8>,
    },
    InvalidateMuid {
        common: Common,
        target_muid: Muid,
    },
    Ack {
        common: Common,
        body: AckNakBody,
    },
    Nak {
        common: Common,
        body: AckNakBody,
    },

    ProfileInquiry {
        common: Common,
    },
    ProfileReply {
        common: Common,
        enabled: Vec<ProfileId>,
        disabled: Vec<ProfileId>,
    },
    SetProfileOn {
        common: Common,
        profile: ProfileId,
        num_channels: u16,
    },
    SetProfileOff {
        common: Common,
        profile: ProfileId,
    },
    ProfileEnabledReport {
        common: Common,
        profile: ProfileId,
        num_channels: u16,
    },
    ProfileDisabledReport {
        common: Common,
        profile: ProfileId,
        num_channels: u16,
    },
    ProfileAddedReport {
        common: Common,
        profile: ProfileId,
    },
    ProfileRemovedReport {
        common: Common,
        profile: ProfileId,
    },
    ProfileDetailsInquiry {
        common: Common,
        profile: ProfileId,
        target: u8,
    },
    ProfileDetailsReply {
        common: Common,
        profile: ProfileId,
        target: u8,
        data: Vec<u8>,
    },
    ProfileSpecificData {
        common: Common,
        profile: ProfileId,
        data: Vec<u8>,
    },

    PropertyGetCapabilities {
        common: Common,
        max_simultaneous_requests: u8,
    },
    PropertyGetCapabilitiesReply {
        common: Common,
        max_simultaneous_requests: u8,
    },
    GetPropertyData {
        common: Common,
        request_id: u8,
        header: Vec<u8>,
    },
    GetPropertyDataReply {
        common: Common,
        request_id: u8,
        header: Vec<u8>,
        body: Vec<u8>,
    },
    SetPropertyData {
        common: Common,
        request_id: u8,
        header: Vec<u8>,
        body: Vec<u8>,
    },
    SetPropertyDataReply {
        common: Common,
        request_id: u8,
        header: Vec<u8>,
    },
    SubscribeProperty {
        common: Common,
        request_id: u8,
        header: Vec<u8>,
        body: Vec<u8>,
    },
    SubscribePropertyReply {
        common: Common,
        request_id: u8,
        header: Vec<u8>,
        body: Vec<u8>,
    },
    PropertyNotify {
        common: Common,
        request_id: u8,
        header: Vec<u8>,
        body: Vec<u8>,
    },

    ProcessInquiryCapabilities {
        common: Common,
    },
    ProcessInquiryCapabilitiesReply {
        common: Common,
        features: u8,
    },
    MidiMessageReportInquiry {
        common: Common,
        message_data_control: u8,
        system_messages: u8,
        channel_controller_messages: u8,
        note_data_messages: u8,
    },
    MidiMessageReportReply {
        common: Common,
        system_messages: u8,
        channel_controller_messages: u8,
        note_data_messages: u8,
    },
    MidiMessageReportNotifyEnd {
        common: Common,
    },
}

/// One unreassembled packet of a chunked (multi-packet) message, as
/// produced by [`parse_packet`] and consumed by the Messenger's
/// reassembly buffers (§4.5.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    pub common: Common,
    pub sub_id_2: SubId2,
    pub packet: ChunkPacket,
}

/// Result of parsing one inbound packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedPacket {
    Complete(Message),
    Chunk(RawChunk),
}

impl Message {
    pub fn common(&self) -> &Common {
        match self {
            Message::DiscoveryInquiry { common, .. }
            | Message::DiscoveryReply { common, .. }
            | Message::EndpointInquiry { common, .. }
            | Message::EndpointReply { common, .. }
            | Message::InvalidateMuid { common, .. }
            | Message::Ack { common, .. }
            | Message::Nak { common, .. }
            | Message::ProfileInquiry { common }
            | Message::ProfileReply { common, .. }
            | Message::SetProfileOn { common, .. }
            | Message::SetProfileOff { common, .. }
            | Message::ProfileEnabledReport { common, .. }
            | Message::ProfileDisabledReport { common, .. }
            | Message::ProfileAddedReport { common, .. }
            | Message::ProfileRemovedReport { common, .. }
            | Message::ProfileDetailsInquiry { common, .. }
            | Message::ProfileDetailsReply { common, .. }
            | Message::ProfileSpecificData { common, .. }
            | Message::PropertyGetCapabilities { common, .. }
            | Message::PropertyGetCapabilitiesReply { common, .. }
            | Message::GetPropertyData { common, .. }
            | Message::GetPropertyDataReply { common, .. }
            | Message::SetPropertyData { common, .. }
            | Message::SetPropertyDataReply { common, .. }
            | Message::SubscribeProperty { common, .. }
            | Message::SubscribePropertyReply { common, .. }
            | Message::PropertyNotify { common, .. }
            | Message::ProcessInquiryCapabilities { common }
            | Message::ProcessInquiryCapabilitiesReply { common, .. }
            | Message::MidiMessageReportInquiry { common, .. }
            | Message::MidiMessageReportReply { common, .. }
            | Message::MidiMessageReportNotifyEnd { common } => common,
        }
    }

    pub fn sub_id_2(&self) -> SubId2 {
        use SubId2::*;
        match self {
            Message::DiscoveryInquiry { .. } => DiscoveryInquiry,
            Message::DiscoveryReply { .. } => DiscoveryReply,
            Message::EndpointInquiry { .. } => EndpointInquiry,
            Message::EndpointReply { .. } => EndpointReply,
            Message::InvalidateMuid { .. } => InvalidateMuid,
            Message::Ack { .. } => Ack,
            Message::Nak { .. } => Nak,
            Message::ProfileInquiry { .. } => ProfileInquiry,
            Message::ProfileReply { .. } => ProfileInquiryReply,
            Message::SetProfileOn { .. } => SetProfileOn,
            Message::SetProfileOff { .. } => SetProfileOff,
            Message::ProfileEnabledReport { .. } => ProfileEnabledReport,
            Message::ProfileDisabledReport { .. } => ProfileDisabledReport,
            Message::ProfileAddedReport { .. } => ProfileAddedReport,
            Message::ProfileRemovedReport { .. } => ProfileRemovedReport,
            Message::ProfileDetailsInquiry { .. } => ProfileDetailsInquiry,
            Message::ProfileDetailsReply { .. } => ProfileDetailsReply,
            Message::ProfileSpecificData { .. } => ProfileSpecificData,
            Message::PropertyGetCapabilities { .. } => PropertyGetCapabilities,
            Message::PropertyGetCapabilitiesReply { .. } => PropertyGetCapabilitiesReply,
            Message::GetPropertyData { .. } => GetPropertyData,
            Message::GetPropertyDataReply { .. } => GetPropertyDataReply,
            Message::SetPropertyData { .. } => SetPropertyData,
            Message::SetPropertyDataReply { .. } => SetPropertyDataReply,
            Message::SubscribeProperty { .. } => SubscribeProperty,
            Message::SubscribePropertyReply { .. } => SubscribePropertyReply,
            Message::PropertyNotify { .. } => PropertyNotify,
            Message::ProcessInquiryCapabilities { .. } => ProcessInquiryCapabilities,
            Message::ProcessInquiryCapabilitiesReply { .. } => ProcessInquiryCapabilitiesReply,
            Message::MidiMessageReportInquiry { .. } => MidiMessageReportInquiry,
            Message::MidiMessageReportReply { .. } => MidiMessageReportReply,
            Message::MidiMessageReportNotifyEnd { .. } => EndOfMidiMessageReport,
        }
    }

    pub fn label(&self) -> &'static str {
        self.sub_id_2().into()
    }

    /// One or more on-wire packets for this message, given the chunking
    /// threshold to use for the multi-packet variants.
    pub fn serialize_multi(&self, request_id: u8, max_chunk_size: usize) -> Result<Vec<Vec<u8>>, CiParseError> {
        let common = self.common();
        let header_bytes = common.header(self.sub_id_2());
        let chunked = |header: &[u8], body: &[u8]| -> Result<Vec<Vec<u8>>, CiParseError> {
            let packets = crate::codec::split_into_chunks(request_id, header, body, max_chunk_size)?;
            Ok(packets
                .into_iter()
                .map(|p| {
                    let mut v = vec![];
                    header_bytes.extend_midi(&mut v);
                    p.extend_midi(&mut v);
                    v
                })
                .collect())
        };
        match self {
            Message::GetPropertyData { header, .. } => chunked(header, &[]),
            Message::GetPropertyDataReply { header, body, .. } => chunked(header, body),
            Message::SetPropertyData { header, body, .. } => chunked(header, body),
            Message::SetPropertyDataReply { header, .. } => chunked(header, &[]),
            Message::SubscribeProperty { header, body, .. } => chunked(header, body),
            Message::SubscribePropertyReply { header, body, .. } => chunked(header, body),
            Message::PropertyNotify { header, body, .. } => chunked(header, body),
            other => Ok(vec![other.serialize_single()]),
        }
    }

    /// Serializes a single-packet message. Must not be called on a
    /// multi-packet variant; use [`Message::serialize_multi`] for those.
    pub fn serialize_single(&self) -> Vec<u8> {
        let common = self.common();
        let mut v = vec![];
        common.header(self.sub_id_2()).extend_midi(&mut v);
        match self {
            Message::DiscoveryInquiry {
                device_details,
                supported_categories,
                max_sysex_size,
                output_path_id,
                ..
            } => {
                device_details.extend_midi(&mut v);
                v.push(*supported_categories);
                push_u28(*max_sysex_size, &mut v);
                v.push(*output_path_id);
            }
            Message::DiscoveryReply {
                device_details,
                supported_categories,
                max_sysex_size,
                output_path_id,
                function_block,
                ..
            } => {
                device_details.extend_midi(&mut v);
                v.push(*supported_categories);
                push_u28(*max_sysex_size, &mut v);
                v.push(*output_path_id);
                v.push(*function_block);
            }
            Message::EndpointInquiry { status, .. } => v.push(*status),
            Message::EndpointReply { status, data, .. } => {
                v.push(*status);
                push_u14(data.len() as u16, &mut v);
                v.extend_from_slice(data);
            }
            Message::InvalidateMuid { target_muid, .. } => target_muid.extend_midi(&mut v),
            Message::Ack { body, .. } | Message::Nak { body, .. } => body.extend_midi(&mut v),
            Message::ProfileInquiry { .. } => {}
            Message::ProfileReply {
                enabled, disabled, ..
            } => {
                push_u14(enabled.len() as u16, &mut v);
                for p in enabled {
                    p.extend_midi(&mut v);
                }
                push_u14(disabled.len() as u16, &mut v);
                for p in disabled {
                    p.extend_midi(&mut v);
                }
            }
            Message::SetProfileOn {
                profile,
                num_channels,
                ..
            }
            | Message::ProfileEnabledReport {
                profile,
                num_channels,
                ..
            }
            | Message::ProfileDisabledReport {
                profile,
                num_channels,
                ..
            } => {
                profile.extend_midi(&mut v);
                push_u14(*num_channels, &mut v);
            }
            Message::SetProfileOff { profile, .. }
            | Message::ProfileAddedReport { profile, .. }
            | Message::ProfileRemovedReport { profile, .. } => profile.extend_midi(&mut v),
            Message::ProfileDetailsInquiry {
                profile, target, ..
            } => {
                profile.extend_midi(&mut v);
                v.push(*target);
            }
            Message::ProfileDetailsReply {
                profile,
                target,
                data,
                ..
            } => {
                profile.extend_midi(&mut v);
                v.push(*target);
                push_u14(data.len() as u16, &mut v);
                v.extend_from_slice(data);
            }
            Message::ProfileSpecificData { profile, data, .. } => {
                profile.extend_midi(&mut v);
                push_u14(data.len() as u16, &mut v);
                v.extend_from_slice(data);
            }
            Message::PropertyGetCapabilities {
                max_simultaneous_requests,
                ..
            }
            | Message::PropertyGetCapabilitiesReply {
                max_simultaneous_requests,
                ..
            } => v.push(*max_simultaneous_requests),
            Message::ProcessInquiryCapabilities { .. } => {}
            Message::ProcessInquiryCapabilitiesReply { features, .. } => v.push(*features),
            Message::MidiMessageReportInquiry {
                message_data_control,
                system_messages,
                channel_controller_messages,
                note_data_messages,
                ..
            } => {
                v.push(*message_data_control);
                v.push(*system_messages);
                v.push(*channel_controller_messages);
                v.push(*note_data_messages);
            }
            Message::MidiMessageReportReply {
                system_messages,
                channel_controller_messages,
                note_data_messages,
                ..
            } => {
                v.push(*system_messages);
                v.push(*channel_controller_messages);
                v.push(*note_data_messages);
            }
            Message::MidiMessageReportNotifyEnd { .. } => {}
            Message::GetPropertyData { .. }
            | Message::GetPropertyDataReply { .. }
            | Message::SetPropertyData { .. }
            | Message::SetPropertyDataReply { .. }
            | Message::SubscribeProperty { .. }
            | Message::SubscribePropertyReply { .. }
            | Message::PropertyNotify { .. } => {
                debug_assert!(false, "chunked variant must use serialize_multi");
            }
        }
        v
    }

    pub fn body_string(&self) -> String {
        match self {
            Message::DiscoveryInquiry { device_details, .. }
            | Message::DiscoveryReply { device_details, .. } => {
                format!("device={:?}", device_details)
            }
            Message::EndpointInquiry { status, .. } => format!("status={}", status),
            Message::EndpointReply { status, data, .. } => {
                format!("status={} data_len={}", status, data.len())
            }
            Message::InvalidateMuid { target_muid, .. } => format!("target={}", target_muid),
            Message::Ack { body, .. } | Message::Nak { body, .. } => format!(
                "original_sub_id={:#04x} status={:#04x} msg={:?}",
                body.original_sub_id, body.status_code, body.message
            ),
            Message::SetProfileOn {
                profile,
                num_channels,
                ..
            } => format!("profile={} channels={}", profile, num_channels),
            Message::SetProfileOff { profile, .. } => format!("profile={}", profile),
            Message::GetPropertyData { request_id, header } => {
                format!("request_id={} header={}", request_id, String::from_utf8_lossy(header))
            }
            Message::GetPropertyDataReply {
                request_id,
                header,
                body,
            } => format!(
                "request_id={} header={} body_len={}",
                request_id,
                String::from_utf8_lossy(header),
                body.len()
            ),
            other => format!("{:?}", other),
        }
    }
}

/// Parses one inbound packet: the common header plus whatever sub-ID 2
/// demands. Drops with [`CiParseError::UnknownSubId2`] on an unrecognized
/// sub-ID 2, matching the Messenger's NAK-inability policy (§4.3).
pub fn parse_packet(bytes: &[u8], group: u8) -> Result<ParsedPacket, CiParseError> {
    let (header, consumed) = CommonHeader::from_midi(bytes)?;
    let body = &bytes[consumed..];
    let sub_id_2 = SubId2::from_u8(header.sub_id_2).ok_or(CiParseError::UnknownSubId2(header.sub_id_2))?;
    let common = Common::new(
        header.source_muid,
        header.destination_muid,
        Address::from_byte(header.address),
        group,
    );

    use SubId2::*;
    let complete = |m: Message| Ok(ParsedPacket::Complete(m));

    match sub_id_2 {
        DiscoveryInquiry => {
            if body.len() < DeviceDetails::WIRE_SIZE + 1 + 4 + 1 {
                return Err(CiParseError::UnexpectedEnd);
            }
            let device_details = DeviceDetails::from_midi(body)?;
            let mut off = DeviceDetails::WIRE_SIZE;
            let supported_categories = body[off];
            off += 1;
            let max_sysex_size = u28_from_midi(&body[off..])?;
            off += 4;
            let output_path_id = body[off];
            complete(Message::DiscoveryInquiry {
                common,
                device_details,
                supported_categories,
                max_sysex_size,
                output_path_id,
            })
        }
        DiscoveryReply => {
            if body.len() < DeviceDetails::WIRE_SIZE + 1 + 4 + 2 {
                return Err(CiParseError::UnexpectedEnd);
            }
            let device_details = DeviceDetails::from_midi(body)?;
            let mut off = DeviceDetails::WIRE_SIZE;
            let supported_categories = body[off];
            off += 1;
            let max_sysex_size = u28_from_midi(&body[off..])?;
            off += 4;
            let output_path_id = body[off];
            off += 1;
            let function_block = body[off];
            complete(Message::DiscoveryReply {
                common,
                device_details,
                supported_categories,
                max_sysex_size,
                output_path_id,
                function_block,
            })
        }
        EndpointInquiry => {
            let status = *body.first().ok_or(CiParseError::UnexpectedEnd)?;
            complete(Message::EndpointInquiry { common, status })
        }
        EndpointReply => {
            if body.is_empty() {
                return Err(CiParseError::UnexpectedEnd);
            }
            let status = body[0];
            let len = u14_from_midi(&body[1..])? as usize;
            if 3 + len > body.len() {
                return Err(CiParseError::DeclaredLengthExceedsBuffer {
                    declared: len,
                    available: body.len().saturating_sub(3),
                });
            }
            let data = body[3..3 + len].to_vec();
            complete(Message::EndpointReply {
                common,
                status,
                data,
            })
        }
        InvalidateMuid => {
            let target_muid = Muid::from_midi(body)?;
            complete(Message::InvalidateMuid {
                common,
                target_muid,
            })
        }
        Ack => complete(Message::Ack {
            common,
            body: AckNakBody::from_midi(body)?,
        }),
        Nak => complete(Message::Nak {
            common,
            body: AckNakBody::from_midi(body)?,
        }),
        ProfileInquiry => complete(Message::ProfileInquiry { common }),
        ProfileInquiryReply => {
            let mut off = 0;
            let enabled_count = u14_from_midi(&body[off..])? as usize;
            off += 2;
            let mut enabled = Vec::with_capacity(enabled_count);
            for _ in 0..enabled_count {
                let (id, len) = ProfileId::from_midi(&body[off..])?;
                enabled.push(id);
                off += len;
            }
            let disabled_count = u14_from_midi(&body[off..])? as usize;
            off += 2;
            let mut disabled = Vec::with_capacity(disabled_count);
            for _ in 0..disabled_count {
                let (id, len) = ProfileId::from_midi(&body[off..])?;
                disabled.push(id);
                off += len;
            }
            complete(Message::ProfileReply {
                common,
                enabled,
                disabled,
            })
        }
        SetProfileOn => {
            let (profile, len) = ProfileId::from_midi(body)?;
            let num_channels = u14_from_midi(&body[len..])?;
            complete(Message::SetProfileOn {
                common,
                profile,
                num_channels,
            })
        }
        SetProfileOff => {
            let (profile, _) = ProfileId::from_midi(body)?;
            complete(Message::SetProfileOff { common, profile })
        }
        ProfileEnabledReport => {
            let (profile, len) = ProfileId::from_midi(body)?;
            let num_channels = u14_from_midi(&body[len..])?;
            complete(Message::ProfileEnabledReport {
                common,
                profile,
                num_channels,
            })
        }
        ProfileDisabledReport => {
            let (profile, len) = ProfileId::from_midi(body)?;
            let num_channels = u14_from_midi(&body[len..])?;
            complete(Message::ProfileDisabledReport {
                common,
                profile,
                num_channels,
            })
        }
        ProfileAddedReport => {
            let (profile, _) = ProfileId::from_midi(body)?;
            complete(Message::ProfileAddedReport { common, profile })
        }
        ProfileRemovedReport => {
            let (profile, _) = ProfileId::from_midi(body)?;
            complete(Message::ProfileRemovedReport { common, profile })
        }
        ProfileDetailsInquiry => {
            let (profile, len) = ProfileId::from_midi(body)?;
            let target = *body.get(len).ok_or(CiParseError::UnexpectedEnd)?;
            complete(Message::ProfileDetailsInquiry {
                common,
                profile,
                target,
            })
        }
        ProfileDetailsReply => {
            let (profile, len) = ProfileId::from_midi(body)?;
            let target = *body.get(len).ok_or(CiParseError::UnexpectedEnd)?;
            let mut off = len + 1;
            let data_len = u14_from_midi(&body[off..])? as usize;
            off += 2;
            if off + data_len > body.len() {
                return Err(CiParseError::DeclaredLengthExceedsBuffer {
                    declared: data_len,
                    available: body.len().saturating_sub(off),
                });
            }
            let data = body[off..off + data_len].to_vec();
            complete(Message::ProfileDetailsReply {
                common,
                profile,
                target,
                data,
            })
        }
        ProfileSpecificData => {
            let (profile, len) = ProfileId::from_midi(body)?;
            let mut off = len;
            let data_len = u14_from_midi(&body[off..])? as usize;
            off += 2;
            if off + data_len > body.len() {
                return Err(CiParseError::DeclaredLengthExceedsBuffer {
                    declared: data_len,
                    available: body.len().saturating_sub(off),
                });
            }
            let data = body[off..off + data_len].to_vec();
            complete(Message::ProfileSpecificData {
                common,
                profile,
                data,
            })
        }
        PropertyGetCapabilities => {
            let max_simultaneous_requests = *body.first().ok_or(CiParseError::UnexpectedEnd)?;
            complete(Message::PropertyGetCapabilities {
                common,
                max_simultaneous_requests,
            })
        }
        PropertyGetCapabilitiesReply => {
            let max_simultaneous_requests = *body.first().ok_or(CiParseError::UnexpectedEnd)?;
            complete(Message::PropertyGetCapabilitiesReply {
                common,
                max_simultaneous_requests,
            })
        }
        GetPropertyData | GetPropertyDataReply | SetPropertyData | SetPropertyDataReply
        | SubscribeProperty | SubscribePropertyReply | PropertyNotify => {
            let packet = ChunkPacket::from_midi(body)?;
            Ok(ParsedPacket::Chunk(RawChunk {
                common,
                sub_id_2,
                packet,
            }))
        }
        ProcessInquiryCapabilities => complete(Message::ProcessInquiryCapabilities { common }),
        ProcessInquiryCapabilitiesReply => {
            let features = *body.first().ok_or(CiParseError::UnexpectedEnd)?;
            complete(Message::ProcessInquiryCapabilitiesReply { common, features })
        }
        MidiMessageReportInquiry => {
            if body.len() < 4 {
                return Err(CiParseError::UnexpectedEnd);
            }
            complete(Message::MidiMessageReportInquiry {
                common,
                message_data_control: body[0],
                system_messages: body[1],
                channel_controller_messages: body[2],
                note_data_messages: body[3],
            })
        }
        MidiMessageReportReply => {
            if body.len() < 3 {
                return Err(CiParseError::UnexpectedEnd);
            }
            complete(Message::MidiMessageReportReply {
                common,
                system_messages: body[0],
                channel_controller_messages: body[1],
                note_data_messages: body[2],
            })
        }
        EndOfMidiMessageReport => complete(Message::MidiMessageReportNotifyEnd { common }),
    }
}

/// Builds the logical [`Message`] for a chunk sub-ID once reassembly has
/// concatenated every chunk's data into `body` (§4.5.5).
pub fn build_reassembled(
    common: Common,
    sub_id_2: SubId2,
    request_id: u8,
    header: Vec<u8>,
    body: Vec<u8>,
) -> Message {
    use SubId2::*;
    match sub_id_2 {
        GetPropertyData => Message::GetPropertyData {
            common,
            request_id,
            header,
        },
        GetPropertyDataReply => Message::GetPropertyDataReply {
            common,
            request_id,
            header,
            body,
        },
        SetPropertyData => Message::SetPropertyData {
            common,
            request_id,
            header,
            body,
        },
        SetPropertyDataReply => Message::SetPropertyDataReply {
            common,
            request_id,
            header,
        },
        SubscribeProperty => Message::SubscribeProperty {
            common,
            request_id,
            header,
            body,
        },
        SubscribePropertyReply => Message::SubscribePropertyReply {
            common,
            request_id,
            header,
            body,
        },
        PropertyNotify => Message::PropertyNotify {
            common,
            request_id,
            header,
            body,
        },
        other => unreachable!("build_reassembled called with non-chunked sub-ID {:?}", other),
    }
}

impl From<SubId2> for &'static str {
    fn from(s: SubId2) -> Self {
        match s {
            SubId2::DiscoveryInquiry => "DiscoveryInquiry",
            SubId2::DiscoveryReply => "DiscoveryReply",
            SubId2::EndpointInquiry => "EndpointInquiry",
            SubId2::EndpointReply => "EndpointReply",
            SubId2::InvalidateMuid => "InvalidateMUID",
            SubId2::Ack => "ACK",
            SubId2::Nak => "NAK",
            SubId2::ProfileInquiry => "ProfileInquiry",
            SubId2::ProfileInquiryReply => "ProfileReply",
            SubId2::SetProfileOn => "SetProfileOn",
            SubId2::SetProfileOff => "SetProfileOff",
            SubId2::ProfileEnabledReport => "ProfileEnabledReport",
            SubId2::ProfileDisabledReport => "ProfileDisabledReport",
            SubId2::ProfileAddedReport => "ProfileAddedReport",
            SubId2::ProfileRemovedReport => "ProfileRemovedReport",
            SubId2::ProfileDetailsInquiry => "ProfileDetailsInquiry",
            SubId2::ProfileDetailsReply => "ProfileDetailsReply",
            SubId2::ProfileSpecificData => "ProfileSpecificData",
            SubId2::PropertyGetCapabilities => "PropertyGetCapabilities",
            SubId2::PropertyGetCapabilitiesReply => "PropertyGetCapabilitiesReply",
            SubId2::GetPropertyData => "GetPropertyData",
            SubId2::GetPropertyDataReply => "GetPropertyDataReply",
            SubId2::SetPropertyData => "SetPropertyData",
            SubId2::SetPropertyDataReply => "SetPropertyDataReply",
            SubId2::SubscribeProperty => "SubscribeProperty",
            SubId2::SubscribePropertyReply => "SubscribePropertyReply",
            SubId2::PropertyNotify => "PropertyNotify",
            SubId2::ProcessInquiryCapabilities => "ProcessInquiryCapabilities",
            SubId2::ProcessInquiryCapabilitiesReply => "ProcessInquiryCapabilitiesReply",
            SubId2::MidiMessageReportInquiry => "MidiMessageReportInquiry",
            SubId2::MidiMessageReportReply => "MidiMessageReportReply",
            SubId2::EndOfMidiMessageReport => "EndOfMidiMessageReport",
        }
    }
}
