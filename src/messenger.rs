//! The Messenger (§4.3, §4.5.5): packet-level send/receive, request-ID
//! allocation, and chunk reassembly. Holds no business logic of its own —
//! [`crate::device::Device`] owns profile/property state and reacts to the
//! [`Message`]s this module hands back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use log::warn;

use crate::constants::SubId2;
use crate::message::{self, Common, Message, ParsedPacket};
use crate::muid::Muid;
use crate::parse_error::CiParseError;

/// A reassembly buffer is dropped if idle this long (§4.5.5).
pub const REASSEMBLY_TIMEOUT: Duration = Duration::from_secs(10);

struct Reassembly {
    common: Common,
    header: Vec<u8>,
    body: Vec<u8>,
    next_chunk: u16,
    num_chunks: u16,
    last_activity: Instant,
}

/// Key for one in-flight chunked request: the sender and its request_id are
/// only unique together with the sub-ID (a peer may run a Get and a Set
/// with the same request_id concurrently).
type ReassemblyKey = (Muid, u8, SubId2);

/// Invoked with the request_id and sub-ID 2 of an outstanding request when a
/// NAK arrives whose `original_sub_id` matches it (§4.3's NAK round trip).
pub type NakCallback = Box<dyn FnMut(u8, SubId2) + Send>;

pub struct Messenger {
    request_counter: AtomicU8,
    reassembly: HashMap<ReassemblyKey, Reassembly>,
    outstanding: HashMap<u8, SubId2>,
    nak_callback: Option<NakCallback>,
}

impl Default for Messenger {
    fn default() -> Self {
        Messenger {
            request_counter: AtomicU8::new(1),
            reassembly: HashMap::new(),
            outstanding: HashMap::new(),
            nak_callback: None,
        }
    }
}

impl Messenger {
    /// Allocates the next request_id, wrapping mod 256. Request IDs are not
    /// required to be nonzero by the wire format, but callers reserve 0 as
    /// "no request in flight" by convention.
    pub fn next_request_id(&self) -> u8 {
        let id = self.request_counter.fetch_add(1, Ordering::Relaxed);
        if id == 0 {
            self.request_counter.fetch_add(1, Ordering::Relaxed)
        } else {
            id
        }
    }

    /// Registers a callback for NAKs whose `original_sub_id` matches a
    /// request this Messenger has sent but not yet seen a reply to.
    pub fn set_nak_callback(&mut self, callback: NakCallback) {
        self.nak_callback = Some(callback);
    }

    /// Serializes `message` into one or more on-wire packets, chunking
    /// property bodies larger than `max_chunk_size`. Requests that carry a
    /// nonzero request_id are tracked as outstanding until a reply, or a
    /// matching NAK, is observed through [`Self::process_input`].
    pub fn serialize(&mut self, message: &Message, max_chunk_size: usize) -> Result<Vec<Vec<u8>>, CiParseError> {
        let request_id = message_request_id(message);
        if request_id != 0 {
            self.outstanding.insert(request_id, message.sub_id_2());
        }
        message.serialize_multi(request_id, max_chunk_size)
    }

    /// Feeds one inbound packet through parsing and, for chunked sub-IDs,
    /// reassembly. Returns `Ok(None)` while a chunked message is still
    /// incomplete. `group` is the UMP transport group the packet arrived
    /// on, carried out-of-band from the wire bytes themselves.
    pub fn process_input(&mut self, bytes: &[u8], group: u8, now: Instant) -> Result<Option<Message>, CiParseError> {
        let result = match message::parse_packet(bytes, group)? {
            ParsedPacket::Complete(msg) => Some(msg),
            ParsedPacket::Chunk(raw) => self.reassemble(raw, now),
        };
        if let Some(Message::Nak { body, .. }) = &result {
            self.handle_nak_round_trip(body.original_sub_id);
        }
        if let Some(msg) = &result {
            let request_id = message_request_id(msg);
            if request_id != 0 && !matches!(msg, Message::Nak { .. }) {
                self.outstanding.remove(&request_id);
            }
        }
        Ok(result)
    }

    /// Logs and notifies the registered [`NakCallback`] for every
    /// outstanding request whose sub-ID 2 matches `original_sub_id`.
    fn handle_nak_round_trip(&mut self, original_sub_id: u8) {
        let Some(nak_sub_id) = SubId2::from_u8(original_sub_id) else {
            return;
        };
        let matching: Vec<u8> = self
            .outstanding
            .iter()
            .filter(|(_, sub_id)| **sub_id == nak_sub_id)
            .map(|(request_id, _)| *request_id)
            .collect();
        for request_id in matching {
            self.outstanding.remove(&request_id);
            warn!("NAK received for outstanding request_id={} ({})", request_id, nak_sub_id);
            if let Some(callback) = &mut self.nak_callback {
                callback(request_id, nak_sub_id);
            }
        }
    }

    fn reassemble(&mut self, raw: crate::message::RawChunk, now: Instant) -> Option<Message> {
        let key: ReassemblyKey = (raw.common.source_muid, raw.packet.request_id, raw.sub_id_2);
        if raw.packet.chunk_index == 1 {
            self.reassembly.insert(
                key,
                Reassembly {
                    common: raw.common,
                    header: raw.packet.header.clone(),
                    body: raw.packet.chunk_data.clone(),
                    next_chunk: 2,
                    num_chunks: raw.packet.num_chunks,
                    last_activity: now,
                },
            );
        } else {
            let Some(buf) = self.reassembly.get_mut(&key) else {
                return None;
            };
            if raw.packet.chunk_index != buf.next_chunk {
                self.reassembly.remove(&key);
                return None;
            }
            buf.body.extend_from_slice(&raw.packet.chunk_data);
            buf.next_chunk += 1;
            buf.last_activity = now;
        }
        let complete = self
            .reassembly
            .get(&key)
            .map(|buf| buf.next_chunk > buf.num_chunks)
            .unwrap_or(false);
        if !complete {
            return None;
        }
        let buf = self.reassembly.remove(&key)?;
        Some(message::build_reassembled(
            buf.common,
            raw.sub_id_2,
            raw.packet.request_id,
            buf.header,
            buf.body,
        ))
    }

    /// Drops every reassembly buffer idle longer than [`REASSEMBLY_TIMEOUT`].
    pub fn prune_stale(&mut self, now: Instant) {
        self.reassembly
            .retain(|_, buf| now.duration_since(buf.last_activity) < REASSEMBLY_TIMEOUT);
    }

    /// Drops every reassembly buffer for `muid`, on InvalidateMUID (§4.5.5).
    pub fn discard_for_muid(&mut self, muid: Muid) {
        self.reassembly.retain(|(source, ..), _| *source != muid);
    }
}

fn message_request_id(message: &Message) -> u8 {
    match message {
        Message::GetPropertyData { request_id, .. }
        | Message::GetPropertyDataReply { request_id, .. }
        | Message::SetPropertyData { request_id, .. }
        | Message::SetPropertyDataReply { request_id, .. }
        | Message::SubscribeProperty { request_id, .. }
        | Message::SubscribePropertyReply { request_id, .. }
        | Message::PropertyNotify { request_id, .. } => *request_id,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::message::{AckNakBody, Common};

    fn common(source: u32, dest: u32) -> Common {
        Common::new(Muid(source), Muid(dest), Address::FunctionBlock, 0)
    }

    #[test]
    fn request_id_never_zero() {
        let messenger = Messenger::default();
        for _ in 0..300 {
            assert_ne!(messenger.next_request_id(), 0);
        }
    }

    #[test]
    fn reassembles_multi_chunk_message() {
        let mut messenger = Messenger::default();
        let msg = Message::GetPropertyDataReply {
            common: common(1, 2),
            request_id: 5,
            header: br#"{"resource":"DeviceInfo"}"#.to_vec(),
            body: vec![9u8; 2000],
        };
        let packets = messenger.serialize(&msg, 256).unwrap();
        assert!(packets.len() > 1);
        let mut result = None;
        let now = Instant::now();
        for p in &packets {
            result = messenger.process_input(p, 0, now).unwrap();
        }
        assert_eq!(result, Some(msg));
        assert!(messenger.reassembly.is_empty());
    }

    #[test]
    fn out_of_order_chunk_is_dropped() {
        let mut messenger = Messenger::default();
        let msg = Message::GetPropertyDataReply {
            common: common(1, 2),
            request_id: 5,
            header: b"{}".to_vec(),
            body: vec![1u8; 2000],
        };
        let packets = messenger.serialize(&msg, 256).unwrap();
        let now = Instant::now();
        assert!(messenger.process_input(&packets[0], 0, now).unwrap().is_none());
        assert!(!messenger.reassembly.is_empty());
        // Skip packet[1], feed packet[2] out of order: the whole in-progress
        // buffer is discarded, not just the gapped packet.
        assert!(messenger.process_input(&packets[2], 0, now).unwrap().is_none());
        assert!(messenger.reassembly.is_empty());
        // The correct continuation packet no longer has a buffer to complete.
        assert!(messenger.process_input(&packets[1], 0, now).unwrap().is_none());
        assert!(messenger.reassembly.is_empty());
    }

    #[test]
    fn nak_for_outstanding_request_invokes_callback() {
        let mut messenger = Messenger::default();
        let request = Message::GetPropertyData {
            common: common(1, 2),
            request_id: 5,
            header: b"{}".to_vec(),
        };
        messenger.serialize(&request, 256).unwrap();
        assert_eq!(messenger.outstanding.get(&5), Some(&SubId2::GetPropertyData));

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        messenger.set_nak_callback(Box::new(move |request_id, sub_id| {
            seen_clone.lock().unwrap().push((request_id, sub_id));
        }));

        let nak = Message::Nak {
            common: common(2, 1),
            body: AckNakBody {
                original_sub_id: SubId2::GetPropertyData.to_u8(),
                status_code: 1,
                status_data: 0,
                details: [0; 5],
                message: String::new(),
            },
        };
        let now = Instant::now();
        for packet in &messenger.serialize(&nak, 256).unwrap() {
            messenger.process_input(packet, 0, now).unwrap();
        }

        assert!(messenger.outstanding.is_empty());
        assert_eq!(*seen.lock().unwrap(), vec![(5, SubId2::GetPropertyData)]);
    }

    #[test]
    fn discard_for_muid_drops_buffer() {
        let mut messenger = Messenger::default();
        let msg = Message::GetPropertyDataReply {
            common: common(1, 2),
            request_id: 5,
            header: b"{}".to_vec(),
            body: vec![1u8; 2000],
        };
        let packets = messenger.serialize(&msg, 256).unwrap();
        let now = Instant::now();
        messenger.process_input(&packets[0], 0, now).unwrap();
        assert!(!messenger.reassembly.is_empty());
        messenger.discard_for_muid(Muid(1));
        assert!(messenger.reassembly.is_empty());
    }
}
