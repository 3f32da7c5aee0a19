//! `PropertyHostFacade` (§4.5.2): the local catalog of properties a Device
//! serves to remote peers, plus the Common Rules rules engine driving
//! get/set/subscribe dispatch.

use std::collections::HashMap;

use crate::muid::Muid;
use crate::property::metadata::{CanSet, PropertyMetadata, Subscription};
use crate::property::rules;

pub struct GetPropertyDataResult {
    pub header: Vec<u8>,
    pub body: Vec<u8>,
}

pub struct SetPropertyDataResult {
    pub header: Vec<u8>,
    /// Set on a 200 status: the property id and new value the caller
    /// should push through [`PropertyHostFacade::update_property`] to
    /// notify subscribers.
    pub applied: Option<(String, Vec<u8>)>,
}

pub struct SubscribePropertyResult {
    pub header: Vec<u8>,
}

/// One subscriber push produced by [`PropertyHostFacade::update_property`]:
/// the caller wraps this into a `SubscribeProperty` message with a fresh
/// request_id and sends it to `subscriber_muid`.
pub struct PendingPush {
    pub subscriber_muid: Muid,
    pub header: Vec<u8>,
    pub body: Vec<u8>,
}

#[derive(Default)]
pub struct PropertyHostFacade {
    metadata: Vec<PropertyMetadata>,
    values: HashMap<String, Vec<u8>>,
    subscriptions: Vec<Subscription>,
}

impl PropertyHostFacade {
    pub fn add_property(&mut self, metadata: PropertyMetadata) {
        self.values.entry(metadata.resource.clone()).or_default();
        self.metadata.retain(|m| m.resource != metadata.resource);
        self.metadata.push(metadata);
    }

    pub fn remove_property(&mut self, id: &str) {
        self.metadata.retain(|m| m.resource != id);
        self.values.remove(id);
        self.subscriptions.retain(|s| s.property_id != id);
    }

    /// Low-level write; does not notify subscribers. Use [`Self::update_property`]
    /// when subscribers should be pushed the new value.
    pub fn set_property_value(&mut self, id: &str, bytes: Vec<u8>) {
        self.values.insert(id.to_string(), bytes);
    }

    pub fn metadata(&self) -> &[PropertyMetadata] {
        &self.metadata
    }

    pub fn find_metadata(&self, id: &str) -> Option<&PropertyMetadata> {
        self.metadata.iter().find(|m| m.resource == id)
    }

    pub fn value(&self, id: &str) -> Option<&[u8]> {
        self.values.get(id).map(|v| v.as_slice())
    }

    /// Writes the new value and builds the subscriber pushes described in
    /// §4.5.2: one `SubscribeProperty{command: "full"}` per subscriber of
    /// `id`.
    pub fn update_property(&mut self, id: &str, bytes: Vec<u8>) -> Vec<PendingPush> {
        self.values.insert(id.to_string(), bytes.clone());
        self.subscriptions
            .iter()
            .filter(|s| s.property_id == id)
            .map(|s| PendingPush {
                subscriber_muid: s.subscriber_muid,
                header: rules::create_update_notification_header(id, "full"),
                body: bytes.clone(),
            })
            .collect()
    }

    /// Host-side GetPropertyData handler (§4.5.1): 200 on success, 404 if
    /// the property is unknown, 400 on a malformed request header.
    pub fn process_get_property_data(&self, header: &[u8]) -> GetPropertyDataResult {
        let id = match rules::get_property_id_for_header(header) {
            Ok(id) => id,
            Err(_) => {
                return GetPropertyDataResult {
                    header: rules::create_status_header(400),
                    body: Vec::new(),
                }
            }
        };
        let Some(value) = self.values.get(&id) else {
            return GetPropertyDataResult {
                header: rules::create_status_header(404),
                body: Vec::new(),
            };
        };
        let offset = rules::get_header_field_integer(header, "offset").ok().flatten().map(|n| n as u32);
        let limit = rules::get_header_field_integer(header, "limit").ok().flatten().map(|n| n as u32);
        let can_paginate = self.find_metadata(&id).map(|m| m.can_paginate).unwrap_or(false);
        let body = if can_paginate && (offset.is_some() || limit.is_some()) {
            match serde_json::from_slice::<serde_json::Value>(value) {
                Ok(parsed) => serde_json::to_vec(&rules::paginate(parsed, offset, limit)).unwrap_or_else(|_| value.clone()),
                Err(_) => value.clone(),
            }
        } else {
            value.clone()
        };
        GetPropertyDataResult {
            header: rules::create_status_header(200),
            body,
        }
    }

    /// Host-side SetPropertyData handler (§4.5.1). On `setPartial=true`,
    /// applies `body` as an RFC6901 JSON pointer within the property header
    /// (the pointer is carried in the header's `resId` field, matching the
    /// reference engine's convention for addressing a sub-resource).
    pub fn process_set_property_data(&mut self, header: &[u8], body: &[u8]) -> SetPropertyDataResult {
        let bad = |status: i32| SetPropertyDataResult {
            header: rules::create_status_header(status),
            applied: None,
        };
        let id = match rules::get_property_id_for_header(header) {
            Ok(id) => id,
            Err(_) => return bad(400),
        };
        let Some(can_set) = self.find_metadata(&id).map(|m| m.can_set) else {
            return bad(404);
        };
        let is_partial = rules::get_header_field_integer(header, "setPartial")
            .ok()
            .flatten()
            .map(|n| n != 0)
            .unwrap_or(false);
        if !can_set.allows(is_partial) {
            return bad(400);
        }
        let new_value = if is_partial {
            let Ok(Some(pointer)) = rules::get_header_field_string(header, "resId") else {
                return bad(400);
            };
            let current = self
                .values
                .get(&id)
                .and_then(|v| serde_json::from_slice::<serde_json::Value>(v).ok())
                .unwrap_or(serde_json::Value::Null);
            let Ok(patch) = serde_json::from_slice::<serde_json::Value>(body) else {
                return bad(400);
            };
            let Ok(merged) = rules::apply_partial_patch(&current, &pointer, patch) else {
                return bad(400);
            };
            let Ok(bytes) = serde_json::to_vec(&merged) else {
                return bad(400);
            };
            bytes
        } else {
            body.to_vec()
        };
        SetPropertyDataResult {
            header: rules::create_status_header(200),
            applied: Some((id, new_value)),
        }
    }

    /// Host-side SubscribeProperty handler (§4.5.1). `start` allocates a
    /// subscription id; `end` removes the entry.
    pub fn process_subscribe_property(&mut self, subscriber_muid: Muid, header: &[u8]) -> SubscribePropertyResult {
        let id = match rules::get_property_id_for_header(header) {
            Ok(id) => id,
            Err(_) => {
                return SubscribePropertyResult {
                    header: rules::create_status_header(400),
                }
            }
        };
        let command = rules::get_header_field_string(header, "command").ok().flatten().unwrap_or_default();
        match command.as_str() {
            "start" => {
                let subscribe_id = format!("{:08x}", rand::random::<u32>());
                self.subscriptions.push(Subscription {
                    subscriber_muid,
                    property_id: id.clone(),
                    subscribe_id: subscribe_id.clone(),
                });
                SubscribePropertyResult {
                    header: rules::create_subscription_header(&id, "start", None, Some(&subscribe_id)),
                }
            }
            "end" => {
                self.subscriptions
                    .retain(|s| !(s.subscriber_muid == subscriber_muid && s.property_id == id));
                SubscribePropertyResult {
                    header: rules::create_status_header(200),
                }
            }
            _ => SubscribePropertyResult {
                header: rules::create_status_header(400),
            },
        }
    }

    /// Builds a `SubscribeProperty{command: "end"}` push and drops the local
    /// entry, for a host-initiated shutdown of one subscriber.
    pub fn shutdown_subscription(&mut self, destination_muid: Muid, property_id: &str) -> PendingPush {
        self.subscriptions
            .retain(|s| !(s.subscriber_muid == destination_muid && s.property_id == property_id));
        PendingPush {
            subscriber_muid: destination_muid,
            header: rules::create_shutdown_subscription_header(property_id),
            body: Vec::new(),
        }
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_with_device_info() -> PropertyHostFacade {
        let mut host = PropertyHostFacade::default();
        let mut meta = PropertyMetadata::new("DeviceInfo");
        meta.can_set = CanSet::Full;
        host.add_property(meta);
        host.set_property_value("DeviceInfo", br#"{"name":"x"}"#.to_vec());
        host
    }

    #[test]
    fn get_unknown_property_is_404() {
        let host = PropertyHostFacade::default();
        let header = rules::create_data_request_header("Nope", &rules::RequestFields::default());
        let result = host.process_get_property_data(&header);
        assert_eq!(
            rules::get_header_field_integer(&result.header, "status").unwrap(),
            Some(404)
        );
    }

    #[test]
    fn get_known_property_is_200() {
        let host = host_with_device_info();
        let header = rules::create_data_request_header("DeviceInfo", &rules::RequestFields::default());
        let result = host.process_get_property_data(&header);
        assert_eq!(
            rules::get_header_field_integer(&result.header, "status").unwrap(),
            Some(200)
        );
        assert_eq!(result.body, br#"{"name":"x"}"#);
    }

    #[test]
    fn set_full_replace() {
        let mut host = host_with_device_info();
        let header = rules::create_data_request_header("DeviceInfo", &rules::RequestFields::default());
        let result = host.process_set_property_data(&header, br#"{"name":"y"}"#);
        assert_eq!(
            rules::get_header_field_integer(&result.header, "status").unwrap(),
            Some(200)
        );
        let (id, bytes) = result.applied.unwrap();
        host.update_property(&id, bytes);
        assert_eq!(host.value("DeviceInfo").unwrap(), br#"{"name":"y"}"#);
    }

    #[test]
    fn set_partial_rejected_for_full_only_property() {
        let mut host = host_with_device_info();
        let fields = rules::RequestFields {
            set_partial: Some(true),
            res_id: Some("/name".to_string()),
            ..Default::default()
        };
        let header = rules::create_data_request_header("DeviceInfo", &fields);
        let result = host.process_set_property_data(&header, br#""y""#);
        assert_eq!(
            rules::get_header_field_integer(&result.header, "status").unwrap(),
            Some(400)
        );
        assert!(result.applied.is_none());
    }

    #[test]
    fn set_full_rejected_for_partial_only_property() {
        let mut host = PropertyHostFacade::default();
        let mut meta = PropertyMetadata::new("DeviceInfo");
        meta.can_set = CanSet::Partial;
        host.add_property(meta);
        host.set_property_value("DeviceInfo", br#"{"name":"x"}"#.to_vec());

        let header = rules::create_data_request_header("DeviceInfo", &rules::RequestFields::default());
        let result = host.process_set_property_data(&header, br#"{"name":"y"}"#);
        assert_eq!(
            rules::get_header_field_integer(&result.header, "status").unwrap(),
            Some(400)
        );
        assert!(result.applied.is_none());
    }

    #[test]
    fn subscribe_start_then_end() {
        let mut host = host_with_device_info();
        let subscriber = Muid(1);
        let start_header = rules::create_subscription_header("DeviceInfo", "start", None, None);
        let started = host.process_subscribe_property(subscriber, &start_header);
        assert!(rules::get_header_field_string(&started.header, "subscribeId").unwrap().is_some());
        assert_eq!(host.subscriptions().len(), 1);

        let end_header = rules::create_subscription_header("DeviceInfo", "end", None, None);
        let ended = host.process_subscribe_property(subscriber, &end_header);
        assert_eq!(
            rules::get_header_field_integer(&ended.header, "status").unwrap(),
            Some(200)
        );
        assert!(host.subscriptions().is_empty());
    }

    #[test]
    fn update_property_pushes_to_subscribers() {
        let mut host = host_with_device_info();
        let subscriber = Muid(7);
        let start_header = rules::create_subscription_header("DeviceInfo", "start", None, None);
        host.process_subscribe_property(subscriber, &start_header);
        let pushes = host.update_property("DeviceInfo", br#"{"name":"z"}"#.to_vec());
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].subscriber_muid, subscriber);
        assert_eq!(pushes[0].body, br#"{"name":"z"}"#);
    }
}
