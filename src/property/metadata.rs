//! Property metadata, subscription bookkeeping, and the foundational
//! property IDs defined by Common Rules for Property Exchange (§4.5.4).

use crate::muid::Muid;

pub const RESOURCE_LIST: &str = "ResourceList";
pub const DEVICE_INFO: &str = "DeviceInfo";
pub const CHANNEL_LIST: &str = "ChannelList";
pub const JSON_SCHEMA: &str = "JSONSchema";

/// A property's set capability, per CRPE's `canSet` header field: a
/// property may reject a full replace, a partial patch, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanSet {
    None,
    Full,
    Partial,
}

impl CanSet {
    pub fn as_str(self) -> &'static str {
        match self {
            CanSet::None => "none",
            CanSet::Full => "full",
            CanSet::Partial => "partial",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "full" => CanSet::Full,
            "partial" => CanSet::Partial,
            _ => CanSet::None,
        }
    }

    pub fn allows(self, is_partial: bool) -> bool {
        match self {
            CanSet::None => false,
            CanSet::Full => !is_partial,
            CanSet::Partial => is_partial,
        }
    }
}

/// Describes one property a host exposes, driving ResourceList entries and
/// the host's own get/set/subscribe dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMetadata {
    pub resource: String,
    pub can_get: bool,
    pub can_set: CanSet,
    pub can_subscribe: bool,
    pub can_paginate: bool,
    pub encodings: Vec<String>,
    pub media_types: Vec<String>,
}

impl PropertyMetadata {
    pub fn new(resource: impl Into<String>) -> Self {
        PropertyMetadata {
            resource: resource.into(),
            can_get: true,
            can_set: CanSet::None,
            can_subscribe: false,
            can_paginate: false,
            encodings: vec!["".to_string()],
            media_types: vec!["application/json".to_string()],
        }
    }
}

/// A host-side subscriber entry (§4.5.2): one remote MUID watching one
/// property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub subscriber_muid: Muid,
    pub property_id: String,
    pub subscribe_id: String,
}

/// Lifecycle of a client-side subscription request (§4.5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Subscribing,
    Subscribed,
    Unsubscribing,
    Unsubscribed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSubscription {
    pub property_id: String,
    pub subscribe_id: Option<String>,
    pub state: SubscriptionState,
}
