//! End-to-end scenarios driving whole `Device`s through a loopback transport,
//! instead of unit-testing individual facades in isolation.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use midi_ci::config::DeviceConfiguration;
use midi_ci::property::metadata::{CanSet, PropertyMetadata};
use midi_ci::property::rules::{self, RequestFields};
use midi_ci::{Address, Common, Device, DeviceDetails, Message, Messenger, Muid, Profile, ProfileId};

type Outbox = Arc<Mutex<Vec<(u8, Vec<u8>)>>>;

fn config(manufacturer: u32) -> DeviceConfiguration {
    DeviceConfiguration {
        device_details: DeviceDetails {
            manufacturer,
            family: 1,
            model: 1,
            version: 1,
        },
        ..Default::default()
    }
}

fn device_with_outbox(cfg: DeviceConfiguration) -> (Device, Outbox) {
    let outbox: Outbox = Arc::new(Mutex::new(Vec::new()));
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

fn drain(outbox: &Outbox) -> Vec<(u8, Vec<u8>)> {
    std::mem::take(&mut *outbox.lock().unwrap())
}

/// Bounces packets between two devices until neither has anything left to
/// send, letting a cascade of auto-sent inquiries settle.
fn settle(a: &Device, a_box: &Outbox, b: &Device, b_box: &Outbox) {
    for _ in 0..16 {
        let from_a = drain(a_box);
        let from_b = drain(b_box);
        if from_a.is_empty() && from_b.is_empty() {
            return;
        }
        for (g, bytes) in from_a {
            b.process_input(g, &bytes).unwrap();
        }
        for (g, bytes) in from_b {
            a.process_input(g, &bytes).unwrap();
        }
    }
    panic!("settle did not converge within 16 rounds");
}

/// Feeds every packet through a fresh `Messenger` and returns every message
/// that completed, in order. Each packet's destination is irrelevant here;
/// this is purely a test-side reassembly aid.
fn reassemble_all(packets: &[(u8, Vec<u8>)]) -> Vec<Message> {
    let mut messenger = Messenger::default();
    let now = Instant::now();
    packets
        .iter()
        .filter_map(|(g, bytes)| messenger.process_input(bytes, *g, now).unwrap())
        .collect()
}

#[test]
fn discovery_handshake_exchanges_capabilities_and_endpoint_info() {
    let (device_a, box_a) = device_with_outbox(config(0x1001));
    let (device_b, box_b) = device_with_outbox(config(0x2002));

    device_a.start_discovery().unwrap();
    device_b.start_discovery().unwrap();
    settle(&device_a, &box_a, &device_b, &box_b);

    let a_sees_b = device_a.with_connections(|c| {
        let conn = c.get(device_b.muid).expect("device_a should have discovered device_b");
        conn.device_details
    });
    assert_eq!(a_sees_b.manufacturer, 0x2002);

    let b_sees_a = device_b.with_connections(|c| c.get(device_a.muid).map(|conn| conn.device_details));
    assert_eq!(b_sees_a.unwrap().manufacturer, 0x1001);

    // The auto-sent EndpointInquiry(0x01) carries no product_instance_id payload;
    // only an explicit status 0x00 inquiry does.
    let inquiry = Message::EndpointInquiry {
        common: Common::new(device_a.muid, device_b.muid, Address::FunctionBlock, 0),
        status: 0x00,
    };
    device_b.process_input(0, &inquiry.serialize_single()).unwrap();
    let replies = reassemble_all(&drain(&box_b));
    let product_instance_id = replies.into_iter().find_map(|m| match m {
        Message::EndpointReply { data, status: 0, .. } => Some(String::from_utf8(data).unwrap()),
        _ => None,
    });
    assert_eq!(product_instance_id.as_deref(), Some("midi-ci-rs"));
}

#[test]
fn profile_enable_disable_round_trip_broadcasts_reports() {
    let (host, host_box) = device_with_outbox(config(0x3003));
    let profile_id = ProfileId([9, 0, 0, 0, 0]);
    host.with_profiles(|profiles| {
        profiles
            .add_profile(Profile {
                id: profile_id,
                group: 0,
                address: Address::Channel(0),
                enabled: false,
                num_channels_requested: 1,
            })
            .unwrap();
    });

    let controller = Muid(0xAAAA);
    let on = Message::SetProfileOn {
        common: Common::new(controller, host.muid, Address::Channel(0), 0),
        profile: profile_id,
        num_channels: 1,
    };
    host.process_input(0, &on.serialize_single()).unwrap();
    let sent = reassemble_all(&drain(&host_box));
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Message::ProfileEnabledReport { common, profile, .. } => {
            assert!(common.destination_muid.is_broadcast());
            assert_eq!(*profile, profile_id);
        }
        other => panic!("expected ProfileEnabledReport, got {:?}", other),
    }
    assert_eq!(host.with_profiles(|p| p.get_matching(Address::Channel(0), true)), vec![profile_id]);

    let off = Message::SetProfileOff {
        common: Common::new(controller, host.muid, Address::Channel(0), 0),
        profile: profile_id,
    };
    host.process_input(0, &off.serialize_single()).unwrap();
    let sent = reassemble_all(&drain(&host_box));
    assert_eq!(sent.len(), 1);
    assert!(matches!(sent[0], Message::ProfileDisabledReport { .. }));
    assert!(host.with_profiles(|p| p.get_matching(Address::Channel(0), true)).is_empty());
}

#[test]
fn get_property_data_returns_value_with_200_status() {
    let (host, host_box) = device_with_outbox(config(0x4004));
    host.with_properties(|properties| {
        let mut meta = PropertyMetadata::new("DeviceInfo");
        meta.can_get = true;
        properties.add_property(meta);
        properties.set_property_value("DeviceInfo", br#"{"manufacturer":"Acme"}"#.to_vec());
    });

    let requester = Muid(0xB0B0);
    let request_id = 7;
    let request = Message::GetPropertyData {
        common: Common::new(requester, host.muid, Address::FunctionBlock, 0),
        request_id,
        header: rules::create_data_request_header("DeviceInfo", &RequestFields::default()),
    };
    for packet in request.serialize_multi(request_id, 512).unwrap() {
        host.process_input(0, &packet).unwrap();
    }

    let replies = reassemble_all(&drain(&host_box));
    assert_eq!(replies.len(), 1);
    match &replies[0] {
        Message::GetPropertyDataReply { header, body, request_id: rid, .. } => {
            assert_eq!(*rid, request_id);
            assert_eq!(rules::get_header_field_integer(header, "status").unwrap(), Some(200));
            assert_eq!(body, br#"{"manufacturer":"Acme"}"#);
        }
        other => panic!("expected GetPropertyDataReply, got {:?}", other),
    }
}

#[test]
fn set_property_data_notifies_subscriber() {
    let (host, host_box) = device_with_outbox(config(0x5005));
    host.with_properties(|properties| {
        let mut meta = PropertyMetadata::new("DeviceInfo");
        meta.can_get = true;
        meta.can_set = CanSet::Full;
        meta.can_subscribe = true;
        properties.add_property(meta);
        properties.set_property_value("DeviceInfo", br#"{"name":"old"}"#.to_vec());
    });

    let subscriber = Muid(0xC0C0);
    let subscribe = Message::SubscribeProperty {
        common: Common::new(subscriber, host.muid, Address::FunctionBlock, 0),
        request_id: 1,
        header: rules::create_subscription_header("DeviceInfo", "start", None, None),
        body: Vec::new(),
    };
    for packet in subscribe.serialize_multi(1, 512).unwrap() {
        host.process_input(0, &packet).unwrap();
    }
    let subscribe_replies = reassemble_all(&drain(&host_box));
    assert_eq!(subscribe_replies.len(), 1);
    assert!(matches!(&subscribe_replies[0], Message::SubscribePropertyReply { header, .. }
        if rules::get_header_field_integer(header, "status").unwrap() == Some(200)));

    let setter = Muid(0xD0D0);
    let set = Message::SetPropertyData {
        common: Common::new(setter, host.muid, Address::FunctionBlock, 0),
        request_id: 2,
        header: rules::create_data_request_header("DeviceInfo", &RequestFields::default()),
        body: br#"{"name":"new"}"#.to_vec(),
    };
    for packet in set.serialize_multi(2, 512).unwrap() {
        host.process_input(0, &packet).unwrap();
    }

    let outgoing = reassemble_all(&drain(&host_box));
    assert_eq!(outgoing.len(), 2);
    let reply_to_setter = outgoing
        .iter()
        .find(|m| matches!(m, Message::SetPropertyDataReply { .. }))
        .expect("setter should get a SetPropertyDataReply");
    assert_eq!(reply_to_setter.common().destination_muid, setter);

    let push_to_subscriber = outgoing
        .iter()
        .find(|m| matches!(m, Message::SubscribeProperty { .. }))
        .expect("subscriber should get a full-value push");
    assert_eq!(push_to_subscriber.common().destination_muid, subscriber);
    match push_to_subscriber {
        Message::SubscribeProperty { header, body, .. } => {
            assert_eq!(rules::get_header_field_string(header, "command").unwrap().as_deref(), Some("full"));
            assert_eq!(body, br#"{"name":"new"}"#);
        }
        _ => unreachable!(),
    }

    assert_eq!(host.with_properties(|p| p.value("DeviceInfo").unwrap().to_vec()), br#"{"name":"new"}"#);
}

#[test]
fn partial_patch_set_updates_nested_field() {
    let (host, host_box) = device_with_outbox(config(0x6006));
    host.with_properties(|properties| {
        let mut meta = PropertyMetadata::new("ChannelList");
        meta.can_set = CanSet::Partial;
        properties.add_property(meta);
        properties.set_property_value("ChannelList", br#"{"channels":[{"name":"a"}]}"#.to_vec());
    });

    let setter = Muid(0xE0E0);
    let fields = RequestFields {
        res_id: Some("/channels/0/name".to_string()),
        set_partial: Some(true),
        ..Default::default()
    };
    let set = Message::SetPropertyData {
        common: Common::new(setter, host.muid, Address::FunctionBlock, 0),
        request_id: 3,
        header: rules::create_data_request_header("ChannelList", &fields),
        body: br#""b""#.to_vec(),
    };
    for packet in set.serialize_multi(3, 512).unwrap() {
        host.process_input(0, &packet).unwrap();
    }
    let replies = reassemble_all(&drain(&host_box));
    assert_eq!(replies.len(), 1);
    assert!(matches!(&replies[0], Message::SetPropertyDataReply { header, .. }
        if rules::get_header_field_integer(header, "status").unwrap() == Some(200)));

    let value = host.with_properties(|p| p.value("ChannelList").unwrap().to_vec());
    assert_eq!(value, br#"{"channels":[{"name":"b"}]}"#);
}

#[test]
fn invalidate_muid_drops_connection_and_pending_reassembly() {
    let (device_a, box_a) = device_with_outbox(config(0x7007));
    let (device_b, box_b) = device_with_outbox(config(0x8008));
    device_a.start_discovery().unwrap();
    device_b.start_discovery().unwrap();
    settle(&device_a, &box_a, &device_b, &box_b);
    assert!(device_b.with_connections(|c| c.get(device_a.muid).is_some()));

    device_b.with_properties(|properties| {
        let mut meta = PropertyMetadata::new("DeviceInfo");
        meta.can_set = CanSet::Full;
        properties.add_property(meta);
    });

    let set = Message::SetPropertyData {
        common: Common::new(device_a.muid, device_b.muid, Address::FunctionBlock, 0),
        request_id: 4,
        header: rules::create_data_request_header("DeviceInfo", &RequestFields::default()),
        body: br#"{"big":"value"}"#.to_vec(),
    };
    let packets = set.serialize_multi(4, 4).unwrap();
    assert!(packets.len() > 1, "body should need more than one chunk at this chunk size");

    // Feed only the first chunk; the reassembly buffer is now pending for device_a's MUID.
    device_b.process_input(0, &packets[0]).unwrap();
    drain(&box_b);

    let invalidate = Message::InvalidateMuid {
        common: Common::new(device_a.muid, device_b.muid, Address::FunctionBlock, 0),
        target_muid: device_a.muid,
    };
    device_b.process_input(0, &invalidate.serialize_single()).unwrap();
    assert!(device_b.with_connections(|c| c.get(device_a.muid).is_none()));

    // Feeding the remaining chunks now completes a reassembly that was
    // discarded on InvalidateMUID, so it never reaches the property host.
    for packet in &packets[1..] {
        device_b.process_input(0, packet).unwrap();
    }
    assert!(drain(&box_b).is_empty(), "no SetPropertyDataReply should be produced for a discarded reassembly");
}
