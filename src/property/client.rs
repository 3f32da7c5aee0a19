//! `PropertyClientFacade` (§4.5.3): one per [`crate::connection::Connection`],
//! driving outgoing Get/Set/Subscribe requests and consuming replies and
//! inbound subscription pushes from the remote host.

use std::collections::HashMap;

use crate::property::metadata::{
    CanSet, ClientSubscription, PropertyMetadata, SubscriptionState, CHANNEL_LIST, DEVICE_INFO, JSON_SCHEMA, RESOURCE_LIST,
};
use crate::property::rules::{self, RequestFields};

/// A request this facade is still waiting on a reply for, keyed by
/// request_id.
struct OpenRequest {
    resource: String,
    kind: RequestKind,
}

enum RequestKind {
    Get,
    Set,
    Subscribe { command: String },
}

/// A header/body pair ready to be wrapped in the matching `Message` variant
/// and sent, with the request_id the caller allocated.
pub struct OutgoingRequest {
    pub header: Vec<u8>,
    pub body: Vec<u8>,
}

/// What the caller (Messenger/Device) should do in response to processing a
/// reply or inbound push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// `resource`'s cached value changed; `bytes` is the new decoded value.
    PropertyUpdated { resource: String, bytes: Vec<u8> },
    /// `ResourceList` was received and `property_catalog` now reflects it.
    /// If auto-send is enabled the caller should now request the
    /// foundational properties named in [`PropertyClientFacade::auto_request_resources`].
    CatalogUpdated,
    /// A `notify` push arrived; the caller should issue a fresh
    /// GetPropertyData for `resource` (a new request_id is the caller's to
    /// allocate).
    NeedsRefetch { resource: String },
    /// A subscription for `resource` was terminated, locally or remotely.
    SubscriptionEnded { resource: String },
    /// The request or reply could not be correlated or parsed; dropped.
    Dropped,
}

#[derive(Default)]
pub struct PropertyClientFacade {
    open_requests: HashMap<u8, OpenRequest>,
    cached_properties: HashMap<String, Vec<u8>>,
    subscriptions: Vec<ClientSubscription>,
    property_catalog: Vec<PropertyMetadata>,
}

impl PropertyClientFacade {
    pub fn cached(&self, resource: &str) -> Option<&[u8]> {
        self.cached_properties.get(resource).map(|v| v.as_slice())
    }

    pub fn catalog(&self) -> &[PropertyMetadata] {
        &self.property_catalog
    }

    pub fn subscriptions(&self) -> &[ClientSubscription] {
        &self.subscriptions
    }

    /// The foundational properties to auto-request once `ResourceList`
    /// arrives (§4.5.4).
    pub fn auto_request_resources() -> [&'static str; 3] {
        [DEVICE_INFO, CHANNEL_LIST, JSON_SCHEMA]
    }

    pub fn send_get_property_data(
        &mut self,
        request_id: u8,
        resource: &str,
        res_id: Option<String>,
        encoding: Option<String>,
        offset: Option<u32>,
        limit: Option<u32>,
    ) -> OutgoingRequest {
        let fields = RequestFields {
            res_id,
            mutual_encoding: encoding,
            set_partial: None,
            offset,
            limit,
        };
        let header = rules::create_data_request_header(resource, &fields);
        self.open_requests.insert(
            request_id,
            OpenRequest {
                resource: resource.to_string(),
                kind: RequestKind::Get,
            },
        );
        OutgoingRequest { header, body: Vec::new() }
    }

    pub fn send_set_property_data(
        &mut self,
        request_id: u8,
        resource: &str,
        res_id: Option<String>,
        bytes: &[u8],
        encoding: Option<String>,
        is_partial: bool,
    ) -> Result<OutgoingRequest, crate::parse_error::CiParseError> {
        let enc = encoding.clone().unwrap_or_default();
        let body = rules::encode_body(bytes, &enc)?;
        let fields = RequestFields {
            res_id,
            mutual_encoding: encoding,
            set_partial: if is_partial { Some(true) } else { None },
            offset: None,
            limit: None,
        };
        let header = rules::create_data_request_header(resource, &fields);
        self.open_requests.insert(
            request_id,
            OpenRequest {
                resource: resource.to_string(),
                kind: RequestKind::Set,
            },
        );
        Ok(OutgoingRequest { header, body })
    }

    pub fn send_subscribe_property(&mut self, request_id: u8, resource: &str, encoding: Option<&str>) -> OutgoingRequest {
        let header = rules::create_subscription_header(resource, "start", encoding, None);
        self.subscriptions.retain(|s| s.property_id != resource);
        self.subscriptions.push(ClientSubscription {
            property_id: resource.to_string(),
            subscribe_id: None,
            state: SubscriptionState::Subscribing,
        });
        self.open_requests.insert(
            request_id,
            OpenRequest {
                resource: resource.to_string(),
                kind: RequestKind::Subscribe { command: "start".to_string() },
            },
        );
        OutgoingRequest { header, body: Vec::new() }
    }

    pub fn send_unsubscribe_property(&mut self, request_id: u8, property_id: &str) -> OutgoingRequest {
        let subscribe_id = self
            .subscriptions
            .iter()
            .find(|s| s.property_id == property_id)
            .and_then(|s| s.subscribe_id.clone());
        let header = rules::create_subscription_header(property_id, "end", None, subscribe_id.as_deref());
        if let Some(sub) = self.subscriptions.iter_mut().find(|s| s.property_id == property_id) {
            sub.state = SubscriptionState::Unsubscribing;
        }
        self.open_requests.insert(
            request_id,
            OpenRequest {
                resource: property_id.to_string(),
                kind: RequestKind::Subscribe { command: "end".to_string() },
            },
        );
        OutgoingRequest { header, body: Vec::new() }
    }

    fn install_catalog(&mut self, body: &[u8]) {
        let Ok(serde_json::Value::Array(entries)) = serde_json::from_slice::<serde_json::Value>(body) else {
            return;
        };
        self.property_catalog = entries
            .into_iter()
            .filter_map(|entry| {
                let resource = entry.get("resource")?.as_str()?.to_string();
                let mut meta = PropertyMetadata::new(resource);
                meta.can_set = entry
                    .get("canSet")
                    .and_then(|v| v.as_str())
                    .map(CanSet::from_str)
                    .unwrap_or(CanSet::None);
                meta.can_subscribe = entry.get("canSubscribe").and_then(|v| v.as_bool()).unwrap_or(false);
                meta.can_paginate = entry.get("canPaginate").and_then(|v| v.as_bool()).unwrap_or(false);
                if let Some(encodings) = entry.get("encodings").and_then(|v| v.as_array()) {
                    meta.encodings = encodings.iter().filter_map(|e| e.as_str().map(str::to_string)).collect();
                }
                if let Some(media_types) = entry.get("mediaType").and_then(|v| v.as_array()) {
                    meta.media_types = media_types.iter().filter_map(|e| e.as_str().map(str::to_string)).collect();
                }
                Some(meta)
            })
            .collect();
    }

    pub fn process_get_data_reply(&mut self, request_id: u8, header: &[u8], body: &[u8]) -> ClientEvent {
        let Some(request) = self.open_requests.remove(&request_id) else {
            return ClientEvent::Dropped;
        };
        let status = rules::get_header_field_integer(header, "status").ok().flatten().unwrap_or(0);
        if status != 200 {
            return ClientEvent::Dropped;
        }
        let decoded = match rules::decode_body(header, body) {
            Ok(bytes) => bytes,
            Err(_) => return ClientEvent::Dropped,
        };
        self.cached_properties.insert(request.resource.clone(), decoded.clone());
        if request.resource == RESOURCE_LIST {
            self.install_catalog(&decoded);
            return ClientEvent::CatalogUpdated;
        }
        ClientEvent::PropertyUpdated {
            resource: request.resource,
            bytes: decoded,
        }
    }

    pub fn process_set_data_reply(&mut self, request_id: u8, header: &[u8]) -> ClientEvent {
        let Some(request) = self.open_requests.remove(&request_id) else {
            return ClientEvent::Dropped;
        };
        let status = rules::get_header_field_integer(header, "status").ok().flatten().unwrap_or(0);
        if status != 200 {
            return ClientEvent::Dropped;
        }
        ClientEvent::PropertyUpdated {
            resource: request.resource,
            bytes: Vec::new(),
        }
    }

    pub fn process_subscribe_property_reply(&mut self, request_id: u8, header: &[u8]) -> ClientEvent {
        let Some(request) = self.open_requests.remove(&request_id) else {
            return ClientEvent::Dropped;
        };
        let RequestKind::Subscribe { command } = request.kind else {
            return ClientEvent::Dropped;
        };
        let status = rules::get_header_field_integer(header, "status").ok().flatten().unwrap_or(0);
        if status != 200 {
            return ClientEvent::Dropped;
        }
        let subscribe_id = rules::get_header_field_string(header, "subscribeId").ok().flatten();
        match self.subscriptions.iter_mut().find(|s| s.property_id == request.resource) {
            Some(sub) if command == "start" => {
                sub.subscribe_id = subscribe_id;
                sub.state = SubscriptionState::Subscribed;
            }
            Some(sub) => {
                sub.state = SubscriptionState::Unsubscribed;
            }
            None => {}
        }
        if command == "end" {
            self.subscriptions.retain(|s| s.property_id != request.resource);
            ClientEvent::SubscriptionEnded { resource: request.resource }
        } else {
            ClientEvent::PropertyUpdated {
                resource: request.resource,
                bytes: Vec::new(),
            }
        }
    }

    /// Handles an inbound push from the remote host (§4.5.3).
    pub fn process_subscribe_property(&mut self, header: &[u8], body: &[u8]) -> ClientEvent {
        let Ok(resource) = rules::get_property_id_for_header(header) else {
            return ClientEvent::Dropped;
        };
        let command = rules::get_header_field_string(header, "command").ok().flatten().unwrap_or_default();
        match command.as_str() {
            "notify" => ClientEvent::NeedsRefetch { resource },
            "full" => match rules::decode_body(header, body) {
                Ok(bytes) => {
                    self.cached_properties.insert(resource.clone(), bytes.clone());
                    ClientEvent::PropertyUpdated { resource, bytes }
                }
                Err(_) => ClientEvent::Dropped,
            },
            "partial" => {
                let Some(pointer) = rules::get_header_field_string(header, "resId").ok().flatten() else {
                    return ClientEvent::Dropped;
                };
                let current = self
                    .cached_properties
                    .get(&resource)
                    .and_then(|v| serde_json::from_slice::<serde_json::Value>(v).ok())
                    .unwrap_or(serde_json::Value::Null);
                let Ok(patch) = serde_json::from_slice::<serde_json::Value>(body) else {
                    return ClientEvent::Dropped;
                };
                match rules::apply_partial_patch(&current, &pointer, patch) {
                    Ok(merged) => {
                        let Ok(bytes) = serde_json::to_vec(&merged) else {
                            return ClientEvent::Dropped;
                        };
                        self.cached_properties.insert(resource.clone(), bytes.clone());
                        ClientEvent::PropertyUpdated { resource, bytes }
                    }
                    Err(_) => ClientEvent::Dropped,
                }
            }
            "end" => {
                self.subscriptions.retain(|s| s.property_id != resource);
                ClientEvent::SubscriptionEnded { resource }
            }
            _ => ClientEvent::Dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_reply_caches_value_by_resource() {
        let mut client = PropertyClientFacade::default();
        let req = client.send_get_property_data(1, DEVICE_INFO, None, None, None, None);
        assert_eq!(rules::get_property_id_for_header(&req.header).unwrap(), DEVICE_INFO);
        let reply_header = rules::create_status_header(200);
        let event = client.process_get_data_reply(1, &reply_header, br#"{"ok":true}"#);
        assert_eq!(
            event,
            ClientEvent::PropertyUpdated {
                resource: DEVICE_INFO.to_string(),
                bytes: br#"{"ok":true}"#.to_vec()
            }
        );
        assert_eq!(client.cached(DEVICE_INFO).unwrap(), br#"{"ok":true}"#);
    }

    #[test]
    fn unknown_request_id_reply_is_dropped() {
        let mut client = PropertyClientFacade::default();
        let reply_header = rules::create_status_header(200);
        assert_eq!(client.process_get_data_reply(9, &reply_header, b""), ClientEvent::Dropped);
    }

    #[test]
    fn resource_list_reply_installs_catalog() {
        let mut client = PropertyClientFacade::default();
        client.send_get_property_data(1, RESOURCE_LIST, None, None, None, None);
        let reply_header = rules::create_status_header(200);
        let body = serde_json::to_vec(&serde_json::json!([
            {"resource": "DeviceInfo", "canSet": "none"},
            {"resource": "ChannelList", "canSet": "full"},
        ]))
        .unwrap();
        let event = client.process_get_data_reply(1, &reply_header, &body);
        assert_eq!(event, ClientEvent::CatalogUpdated);
        assert_eq!(client.catalog().len(), 2);
    }

    #[test]
    fn subscribe_lifecycle() {
        let mut client = PropertyClientFacade::default();
        client.send_subscribe_property(1, DEVICE_INFO, None);
        assert_eq!(client.subscriptions()[0].state, SubscriptionState::Subscribing);

        let started_header = rules::create_subscription_header(DEVICE_INFO, "start", None, Some("abc"));
        client.process_subscribe_property_reply(1, &started_header);
        assert_eq!(client.subscriptions()[0].state, SubscriptionState::Subscribed);
        assert_eq!(client.subscriptions()[0].subscribe_id.as_deref(), Some("abc"));

        client.send_unsubscribe_property(2, DEVICE_INFO);
        let ended_header = rules::create_status_header(200);
        let event = client.process_subscribe_property_reply(2, &ended_header);
        assert_eq!(event, ClientEvent::SubscriptionEnded { resource: DEVICE_INFO.to_string() });
        assert!(client.subscriptions().is_empty());
    }

    #[test]
    fn inbound_full_push_updates_cache() {
        let mut client = PropertyClientFacade::default();
        let header = rules::create_subscription_header(DEVICE_INFO, "full", None, None);
        let event = client.process_subscribe_property(&header, br#"{"v":1}"#);
        assert_eq!(
            event,
            ClientEvent::PropertyUpdated {
                resource: DEVICE_INFO.to_string(),
                bytes: br#"{"v":1}"#.to_vec()
            }
        );
    }

    #[test]
    fn inbound_notify_push_requests_refetch() {
        let mut client = PropertyClientFacade::default();
        let header = rules::create_subscription_header(DEVICE_INFO, "notify", None, None);
        let event = client.process_subscribe_property(&header, b"");
        assert_eq!(event, ClientEvent::NeedsRefetch { resource: DEVICE_INFO.to_string() });
    }
}
