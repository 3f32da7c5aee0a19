//! `Device` (§2, §5): the top-level object wiring the messenger, profile
//! and property host facades, and the connection registry behind one
//! reentrant lock, per the engine's single-writer concurrency model.

use std::collections::HashSet;
use std::time::Instant;

use log::{debug, info, warn};
use parking_lot::ReentrantMutex;
use std::cell::RefCell;

use crate::address::Address;
use crate::config::DeviceConfiguration;
use crate::connection::{Connection, ConnectionRegistry};
use crate::constants::SubId2;
use crate::message::{AckNakBody, Common, Message};
use crate::messenger::Messenger;
use crate::muid::Muid;
use crate::parse_error::CiParseError;
use crate::profile::host::ProfileHostFacade;
use crate::profile_id::ProfileId;
use crate::property::host::PropertyHostFacade;
use crate::property::metadata::RESOURCE_LIST;

/// A non-blocking outbound sink: `(group, bytes) -> success`. Supplied by
/// the embedding application; this engine never touches a MIDI port
/// directly (§1).
pub type TransportSink = Box<dyn FnMut(u8, Vec<u8>) -> bool + Send>;

struct DeviceState {
    messenger: Messenger,
    profiles_host: ProfileHostFacade,
    properties_host: PropertyHostFacade,
    connections: ConnectionRegistry,
    transport: TransportSink,
}

pub struct Device {
    pub muid: Muid,
    config: DeviceConfiguration,
    state: ReentrantMutex<RefCell<DeviceState>>,
}

impl Device {
    pub fn new(config: DeviceConfiguration, transport: TransportSink) -> Self {
        Device {
            muid: Muid::random(),
            config,
            state: ReentrantMutex::new(RefCell::new(DeviceState {
                messenger: Messenger::default(),
                profiles_host: ProfileHostFacade::default(),
                properties_host: PropertyHostFacade::default(),
                connections: ConnectionRegistry::default(),
                transport,
            })),
        }
    }

    pub fn config(&self) -> &DeviceConfiguration {
        &self.config
    }

    pub fn with_profiles<R>(&self, f: impl FnOnce(&mut ProfileHostFacade) -> R) -> R {
        let guard = self.state.lock();
        f(&mut guard.borrow_mut().profiles_host)
    }

    pub fn with_properties<R>(&self, f: impl FnOnce(&mut PropertyHostFacade) -> R) -> R {
        let guard = self.state.lock();
        f(&mut guard.borrow_mut().properties_host)
    }

    pub fn with_connections<R>(&self, f: impl FnOnce(&mut ConnectionRegistry) -> R) -> R {
        let guard = self.state.lock();
        f(&mut guard.borrow_mut().connections)
    }

    fn common_to(&self, destination_muid: Muid, address: Address) -> Common {
        Common::new(self.muid, destination_muid, address, self.config.group)
    }

    /// Serializes and hands `message` to the transport sink, one packet per
    /// chunk, back-to-back (§5's ordering guarantee).
    fn send(&self, state: &mut DeviceState, message: &Message) -> Result<bool, CiParseError> {
        let packets = state.messenger.serialize(message, self.config.max_property_chunk_size)?;
        let group = message.common().group;
        let mut ok = true;
        for packet in packets {
            debug!("-> {} ({} bytes) group={}", message.label(), packet.len(), group);
            ok &= (state.transport)(group, packet);
        }
        Ok(ok)
    }

    /// Begins discovery by broadcasting `DiscoveryInquiry`.
    pub fn start_discovery(&self) -> Result<bool, CiParseError> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let msg = Message::DiscoveryInquiry {
            common: self.common_to(Muid::BROADCAST, Address::FunctionBlock),
            device_details: self.config.device_details,
            supported_categories: self.config.supported_categories.0,
            max_sysex_size: self.config.receivable_max_sysex_size,
            output_path_id: self.config.output_path_id,
        };
        self.send(&mut state, &msg)
    }

    /// Feeds one inbound packet, received on UMP transport `group`, through
    /// parsing/reassembly and dispatch. Returns `Ok(())` for a dropped,
    /// incomplete-chunk, or successfully-handled packet; only malformed
    /// common headers produce `Err`.
    pub fn process_input(&self, group: u8, bytes: &[u8]) -> Result<(), CiParseError> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        let now = Instant::now();
        state.messenger.prune_stale(now);
        let message = match state.messenger.process_input(bytes, group, now) {
            Ok(Some(m)) => m,
            Ok(None) => return Ok(()),
            Err(CiParseError::UnknownSubId2(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        let common = *message.common();
        if !common.destination_muid.is_broadcast() && common.destination_muid != self.muid {
            return Ok(());
        }
        self.dispatch(&mut state, message);
        Ok(())
    }

    fn dispatch(&self, state: &mut DeviceState, message: Message) {
        debug!("<- {}", message.label());
        match message {
            Message::DiscoveryInquiry { common, .. } => self.handle_discovery_inquiry(state, common),
            Message::DiscoveryReply {
                common,
                device_details,
                supported_categories,
                max_sysex_size,
                ..
            } => self.handle_discovery_reply(state, common, device_details, supported_categories, max_sysex_size),
            Message::EndpointInquiry { common, status } => self.handle_endpoint_inquiry(state, common, status),
            Message::EndpointReply { common, data, .. } => {
                if let Some(conn) = state.connections.get_mut(common.source_muid) {
                    conn.product_instance_id = Some(String::from_utf8_lossy(&data).into_owned());
                }
            }
            Message::InvalidateMuid { common, target_muid } => {
                state.connections.remove(target_muid);
                state.messenger.discard_for_muid(target_muid);
                let _ = common;
            }
            Message::Ack { body, .. } => info!("received ACK for sub-ID {:#04x}: {}", body.original_sub_id, body.message),
            Message::Nak { body, .. } => warn!("received NAK for sub-ID {:#04x}: {}", body.original_sub_id, body.message),

            Message::ProfileInquiry { common } => self.handle_profile_inquiry(state, common),
            Message::ProfileReply { common, enabled, disabled } => {
                if let Some(conn) = state.connections.get_mut(common.source_muid) {
                    conn.profiles.process_profile_reply(common.address, &enabled, &disabled);
                }
            }
            Message::SetProfileOn { common, profile, num_channels } => {
                self.handle_set_profile(state, common, profile, num_channels, true)
            }
            Message::SetProfileOff { common, profile, .. } => self.handle_set_profile(state, common, profile, 0, false),
            Message::ProfileEnabledReport { common, profile, num_channels } => {
                if let Some(conn) = state.connections.get_mut(common.source_muid) {
                    conn.profiles.process_enabled_report(profile, common.address, num_channels);
                }
            }
            Message::ProfileDisabledReport { common, profile, num_channels } => {
                if let Some(conn) = state.connections.get_mut(common.source_muid) {
                    conn.profiles.process_disabled_report(profile, common.address, num_channels);
                }
            }
            Message::ProfileAddedReport { common, profile } => {
                if let Some(conn) = state.connections.get_mut(common.source_muid) {
                    conn.profiles.process_added_report(profile, common.address);
                }
            }
            Message::ProfileRemovedReport { common, profile } => {
                if let Some(conn) = state.connections.get_mut(common.source_muid) {
                    conn.profiles.process_removed_report(profile, common.address);
                }
            }
            Message::ProfileDetailsInquiry { .. } | Message::ProfileDetailsReply { .. } | Message::ProfileSpecificData { .. } => {
                // Pass-through: no engine-owned state tracks per-profile detail blobs.
            }

            Message::PropertyGetCapabilities { common, max_simultaneous_requests } => {
                let granted = max_simultaneous_requests.min(self.config.max_simultaneous_property_requests);
                let reply = Message::PropertyGetCapabilitiesReply {
                    common: self.common_to(common.source_muid, common.address),
                    max_simultaneous_requests: granted,
                };
                let _ = self.send(state, &reply);
            }
            Message::PropertyGetCapabilitiesReply { common, .. } => {
                if self.config.auto_send_get_resource_list {
                    self.send_get_property_data(state, common.source_muid, common.address, RESOURCE_LIST, None, None, None, None);
                }
            }
            Message::GetPropertyData { common, request_id, header } => {
                let result = state.properties_host.process_get_property_data(&header);
                let reply = Message::GetPropertyDataReply {
                    common: self.common_to(common.source_muid, common.address),
                    request_id,
                    header: result.header,
                    body: result.body,
                };
                let _ = self.send(state, &reply);
            }
            Message::SetPropertyData { common, request_id, header, body } => {
                let result = state.properties_host.process_set_property_data(&header, &body);
                if let Some((id, bytes)) = result.applied {
                    let pushes = state.properties_host.update_property(&id, bytes);
                    self.send_pending_pushes(state, pushes);
                }
                let reply = Message::SetPropertyDataReply {
                    common: self.common_to(common.source_muid, common.address),
                    request_id,
                    header: result.header,
                };
                let _ = self.send(state, &reply);
            }
            Message::SubscribeProperty { common, request_id, header, .. } => {
                let result = state.properties_host.process_subscribe_property(common.source_muid, &header);
                let reply = Message::SubscribePropertyReply {
                    common: self.common_to(common.source_muid, common.address),
                    request_id,
                    header: result.header,
                    body: Vec::new(),
                };
                let _ = self.send(state, &reply);
            }
            Message::GetPropertyDataReply { common, request_id, header, body } => {
                if let Some(conn) = state.connections.get_mut(common.source_muid) {
                    conn.properties.process_get_data_reply(request_id, &header, &body);
                }
            }
            Message::SetPropertyDataReply { common, request_id, header } => {
                if let Some(conn) = state.connections.get_mut(common.source_muid) {
                    conn.properties.process_set_data_reply(request_id, &header);
                }
            }
            Message::SubscribePropertyReply { common, request_id, header, .. } => {
                if let Some(conn) = state.connections.get_mut(common.source_muid) {
                    conn.properties.process_subscribe_property_reply(request_id, &header);
                }
            }
            Message::PropertyNotify { common, header, body, .. } => {
                if let Some(conn) = state.connections.get_mut(common.source_muid) {
                    conn.properties.process_subscribe_property(&header, &body);
                }
            }

            Message::ProcessInquiryCapabilities { common } => {
                let reply = Message::ProcessInquiryCapabilitiesReply {
                    common: self.common_to(common.source_muid, common.address),
                    features: self.config.process_inquiry_supported_features,
                };
                let _ = self.send(state, &reply);
            }
            Message::ProcessInquiryCapabilitiesReply { .. }
            | Message::MidiMessageReportInquiry { .. }
            | Message::MidiMessageReportReply { .. }
            | Message::MidiMessageReportNotifyEnd { .. } => {
                // Passed through to the application; this engine keeps no
                // process-inquiry state of its own.
            }
        }
    }

    fn handle_discovery_inquiry(&self, state: &mut DeviceState, common: Common) {
        let reply = Message::DiscoveryReply {
            common: self.common_to(common.source_muid, Address::FunctionBlock),
            device_details: self.config.device_details,
            supported_categories: self.config.supported_categories.0,
            max_sysex_size: self.config.receivable_max_sysex_size,
            output_path_id: self.config.output_path_id,
            function_block: self.config.function_block,
        };
        let _ = self.send(state, &reply);
    }

    fn handle_discovery_reply(
        &self,
        state: &mut DeviceState,
        common: Common,
        device_details: crate::device_info::DeviceDetails,
        supported_categories: u8,
        max_sysex_size: u32,
    ) {
        let conn = Connection::new(common.source_muid, device_details, supported_categories, max_sysex_size);
        state.connections.upsert(conn);

        if self.config.auto_send_endpoint_inquiry {
            let msg = Message::EndpointInquiry {
                common: self.common_to(common.source_muid, Address::FunctionBlock),
                status: 0x01,
            };
            let _ = self.send(state, &msg);
        }
        if self.config.auto_send_profile_inquiry {
            let msg = Message::ProfileInquiry {
                common: self.common_to(common.source_muid, Address::FunctionBlock),
            };
            let _ = self.send(state, &msg);
        }
        if self.config.auto_send_property_exchange_capabilities_inquiry {
            let msg = Message::PropertyGetCapabilities {
                common: self.common_to(common.source_muid, Address::FunctionBlock),
                max_simultaneous_requests: self.config.max_simultaneous_property_requests,
            };
            let _ = self.send(state, &msg);
        }
        if self.config.auto_send_process_inquiry {
            let msg = Message::ProcessInquiryCapabilities {
                common: self.common_to(common.source_muid, Address::FunctionBlock),
            };
            let _ = self.send(state, &msg);
        }
    }

    fn handle_endpoint_inquiry(&self, state: &mut DeviceState, common: Common, status: u8) {
        let data = if status == 0x00 {
            self.config.product_instance_id.as_bytes().to_vec()
        } else {
            Vec::new()
        };
        let reply = Message::EndpointReply {
            common: self.common_to(common.source_muid, common.address),
            status,
            data,
        };
        let _ = self.send(state, &reply);
    }

    fn handle_profile_inquiry(&self, state: &mut DeviceState, common: Common) {
        if common.address != Address::FunctionBlock {
            let enabled = state.profiles_host.get_matching(common.address, true);
            let disabled = state.profiles_host.get_matching(common.address, false);
            let reply = Message::ProfileReply {
                common: self.common_to(common.source_muid, common.address),
                enabled,
                disabled,
            };
            let _ = self.send(state, &reply);
            return;
        }
        let addresses: HashSet<Address> = state.profiles_host.profiles().iter().map(|p| p.address).collect();
        for address in addresses {
            let enabled = state.profiles_host.get_matching(address, true);
            let disabled = state.profiles_host.get_matching(address, false);
            let reply = Message::ProfileReply {
                common: self.common_to(common.source_muid, address),
                enabled,
                disabled,
            };
            let _ = self.send(state, &reply);
        }
    }

    fn handle_set_profile(&self, state: &mut DeviceState, common: Common, profile: ProfileId, num_channels: u16, enable: bool) {
        let group = self.config.group;
        let changed = if enable {
            state.profiles_host.enable_profile(group, common.address, profile, num_channels)
        } else {
            state.profiles_host.disable_profile(group, common.address, profile)
        };
        let Some(updated) = changed else { return };
        let (address, num_channels) = (updated.address, updated.num_channels_requested);
        let report = if enable {
            Message::ProfileEnabledReport {
                common: self.common_to(Muid::BROADCAST, address),
                profile,
                num_channels,
            }
        } else {
            Message::ProfileDisabledReport {
                common: self.common_to(Muid::BROADCAST, address),
                profile,
                num_channels,
            }
        };
        let _ = self.send(state, &report);
    }

    #[allow(clippy::too_many_arguments)]
    fn send_get_property_data(
        &self,
        state: &mut DeviceState,
        destination_muid: Muid,
        address: Address,
        resource: &str,
        res_id: Option<String>,
        encoding: Option<String>,
        offset: Option<u32>,
        limit: Option<u32>,
    ) {
        let request_id = state.messenger.next_request_id();
        let Some(conn) = state.connections.get_mut(destination_muid) else { return };
        let outgoing = conn.properties.send_get_property_data(request_id, resource, res_id, encoding, offset, limit);
        let msg = Message::GetPropertyData {
            common: self.common_to(destination_muid, address),
            request_id,
            header: outgoing.header,
        };
        let _ = self.send(state, &msg);
    }

    fn send_pending_pushes(&self, state: &mut DeviceState, pushes: Vec<crate::property::host::PendingPush>) {
        for push in pushes {
            let request_id = state.messenger.next_request_id();
            let msg = Message::SubscribeProperty {
                common: self.common_to(push.subscriber_muid, Address::FunctionBlock),
                request_id,
                header: push.header,
                body: push.body,
            };
            let _ = self.send(state, &msg);
        }
    }
}

/// Builds an ACK/NAK reply message for `original` with a human-readable
/// `message` (§6, §7's NAK-inability policy for unknown sub-ID 2).
pub fn nak_for(common: Common, original_sub_id: u8, status_code: u8, message: impl Into<String>) -> Message {
    Message::Nak {
        common,
        body: AckNakBody {
            original_sub_id,
            status_code,
            status_data: 0,
            details: [0; 5],
            message: message.into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_info::DeviceDetails;
    use std::sync::{Arc, Mutex};

    fn config() -> DeviceConfiguration {
        DeviceConfiguration {
            device_details: DeviceDetails {
                manufacturer: 1,
                family: 2,
                model: 3,
                version: 4,
            },
            ..Default::default()
        }
    }

    /// A device whose transport sink appends to a shared outbox instead of
    /// touching real hardware, for wiring two `Device`s together in tests.
    fn device_with_outbox(cfg: DeviceConfiguration) -> (Device, Arc<Mutex<Vec<(u8, Vec<u8>)>>>) {
        let outbox: Arc<Mutex<Vec<(u8, Vec<u8>)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = outbox.clone();
        let device = Device::new(
            cfg,
            Box::new(move |g, b| {
                sink.lock().unwrap().push((g, b));
                true
            }),
        );
        (device, outbox)
    }

    fn drain(outbox: &Arc<Mutex<Vec<(u8, Vec<u8>)>>>) -> Vec<(u8, Vec<u8>)> {
        std::mem::take(&mut *outbox.lock().unwrap())
    }

    #[test]
    fn discovery_handshake_creates_connections_on_both_sides() {
        let (device_a, outbox_a) = device_with_outbox(config());
        let (device_b, outbox_b) = device_with_outbox(config());

        device_a.start_discovery().unwrap();
        for (group, bytes) in drain(&outbox_a) {
            device_b.process_input(group, &bytes).unwrap();
        }
        // Device B replied with a single DiscoveryReply packet.
        let from_b = drain(&outbox_b);
        assert!(!from_b.is_empty());
        for (group, bytes) in from_b {
            device_a.process_input(group, &bytes).unwrap();
        }

        assert!(device_a.with_connections(|c| c.get(device_b.muid).is_some()));
    }

    #[test]
    fn unknown_destination_is_dropped() {
        let (device_b, _outbox) = device_with_outbox(config());
        let msg = Message::DiscoveryInquiry {
            common: Common::new(Muid(0x999), Muid(0x111), Address::FunctionBlock, 0),
            device_details: DeviceDetails {
                manufacturer: 0,
                family: 0,
                model: 0,
                version: 0,
            },
            supported_categories: 0,
            max_sysex_size: 512,
            output_path_id: 0,
        };
        let bytes = msg.serialize_single();
        device_b.process_input(0, &bytes).unwrap();
        assert_eq!(device_b.with_connections(|c| c.iter().count()), 0);
    }

    #[test]
    fn profile_set_on_broadcasts_enabled_report() {
        let (device_b, outbox_b) = device_with_outbox(config());
        device_b.with_profiles(|profiles| {
            profiles
                .add_profile(crate::profile_id::Profile {
                    id: ProfileId([1, 0, 0, 0, 0]),
                    group: 0,
                    address: Address::Channel(0),
                    enabled: false,
                    num_channels_requested: 1,
                })
                .unwrap();
        });
        let msg = Message::SetProfileOn {
            common: Common::new(Muid(0x42), device_b.muid, Address::Channel(0), 0),
            profile: ProfileId([1, 0, 0, 0, 0]),
            num_channels: 1,
        };
        device_b.process_input(0, &msg.serialize_single()).unwrap();
        let sent = drain(&outbox_b);
        assert_eq!(sent.len(), 1);
    }
}
