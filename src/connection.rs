//! Connection registry (§4.6): one entry per discovered remote MUID.

use std::collections::HashMap;

use crate::device_info::{DeviceDetails, DeviceInfo};
use crate::muid::Muid;
use crate::profile::client::ProfileClientFacade;
use crate::property::client::PropertyClientFacade;

/// Everything the engine knows about one remote endpoint, created on
/// `DiscoveryReply` and torn down on `InvalidateMUID` (§4.6).
pub struct Connection {
    pub target_muid: Muid,
    pub device_details: DeviceDetails,
    pub supported_categories: u8,
    pub max_sysex_size: u32,
    pub product_instance_id: Option<String>,
    pub device_info: Option<DeviceInfo>,
    pub profiles: ProfileClientFacade,
    pub properties: PropertyClientFacade,
}

impl Connection {
    pub fn new(
        target_muid: Muid,
        device_details: DeviceDetails,
        supported_categories: u8,
        max_sysex_size: u32,
    ) -> Self {
        Connection {
            target_muid,
            device_details,
            supported_categories,
            max_sysex_size,
            product_instance_id: None,
            device_info: None,
            profiles: ProfileClientFacade::default(),
            properties: PropertyClientFacade::default(),
        }
    }
}

/// `Map<MUID, Connection>` owned by the Device, plus the change listeners
/// fired on every mutation.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<Muid, Connection>,
    listeners: Vec<Box<dyn FnMut(&HashMap<Muid, Connection>) + Send>>,
}

impl ConnectionRegistry {
    pub fn get(&self, muid: Muid) -> Option<&Connection> {
        self.connections.get(&muid)
    }

    pub fn get_mut(&mut self, muid: Muid) -> Option<&mut Connection> {
        self.connections.get_mut(&muid)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Muid, &Connection)> {
        self.connections.iter()
    }

    pub fn add_listener(&mut self, listener: Box<dyn FnMut(&HashMap<Muid, Connection>) + Send>) {
        self.listeners.push(listener);
    }

    /// Creates a fresh Connection for `muid`, discarding any prior one
    /// (a second DiscoveryReply from the same MUID starts over, §4.6).
    pub fn upsert(&mut self, conn: Connection) {
        self.connections.insert(conn.target_muid, conn);
        self.fire_changed();
    }

    /// Removes the Connection for `muid`, on InvalidateMUID or shutdown.
    pub fn remove(&mut self, muid: Muid) -> Option<Connection> {
        let removed = self.connections.remove(&muid);
        if removed.is_some() {
            self.fire_changed();
        }
        removed
    }

    fn fire_changed(&mut self) {
        for listener in &mut self.listeners {
            listener(&self.connections);
        }
    }
}
