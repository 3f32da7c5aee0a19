//! `ProfileClientFacade` (§4.4): one per [`crate::connection::Connection`],
//! caching the remote peer's reported profile catalog.

use crate::address::Address;
use crate::profile_id::ProfileId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProfile {
    pub id: ProfileId,
    pub address: Address,
    pub enabled: bool,
    pub num_channels: u16,
}

#[derive(Default)]
pub struct ProfileClientFacade {
    profiles: Vec<RemoteProfile>,
}

impl ProfileClientFacade {
    /// Replaces the cached set for `address` wholesale, per a ProfileReply.
    pub fn process_profile_reply(&mut self, address: Address, enabled: &[ProfileId], disabled: &[ProfileId]) {
        self.profiles.retain(|p| p.address != address);
        for &id in enabled {
            self.profiles.push(RemoteProfile {
                id,
                address,
                enabled: true,
                num_channels: 0,
            });
        }
        for &id in disabled {
            self.profiles.push(RemoteProfile {
                id,
                address,
                enabled: false,
                num_channels: 0,
            });
        }
    }

    fn upsert(&mut self, id: ProfileId, address: Address, enabled: bool, num_channels: u16) {
        match self.profiles.iter_mut().find(|p| p.id == id && p.address == address) {
            Some(existing) => {
                existing.enabled = enabled;
                existing.num_channels = num_channels;
            }
            None => self.profiles.push(RemoteProfile {
                id,
                address,
                enabled,
                num_channels,
            }),
        }
    }

    pub fn process_enabled_report(&mut self, id: ProfileId, address: Address, num_channels: u16) {
        self.upsert(id, address, true, num_channels);
    }

    pub fn process_disabled_report(&mut self, id: ProfileId, address: Address, num_channels: u16) {
        self.upsert(id, address, false, num_channels);
    }

    pub fn process_added_report(&mut self, id: ProfileId, address: Address) {
        self.upsert(id, address, false, 0);
    }

    pub fn process_removed_report(&mut self, id: ProfileId, address: Address) {
        self.profiles.retain(|p| !(p.id == id && p.address == address));
    }

    pub fn profiles(&self) -> &[RemoteProfile] {
        &self.profiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_profile_reply_replaces_address_set() {
        let mut client = ProfileClientFacade::default();
        let id = ProfileId([1, 0, 0, 0, 0]);
        client.process_profile_reply(Address::Channel(0), &[id], &[]);
        assert_eq!(client.profiles().len(), 1);
        client.process_profile_reply(Address::Channel(0), &[], &[]);
        assert!(client.profiles().is_empty());
    }

    #[test]
    fn enabled_then_removed() {
        let mut client = ProfileClientFacade::default();
        let id = ProfileId([2, 0, 0, 0, 0]);
        client.process_added_report(id, Address::Group);
        client.process_enabled_report(id, Address::Group, 0);
        assert!(client.profiles()[0].enabled);
        client.process_removed_report(id, Address::Group);
        assert!(client.profiles().is_empty());
    }
}
