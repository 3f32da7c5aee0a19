//! `ProfileHostFacade` (§4.4): the local catalog of profiles this Device
//! implements, exposed to remote peers via ProfileInquiry/Reply.

use crate::address::Address;
use crate::profile::ProfileChange;
use crate::profile_id::{Profile, ProfileId};

#[derive(Default)]
pub struct ProfileHostFacade {
    profiles: Vec<Profile>,
    listeners: Vec<Box<dyn FnMut(ProfileChange, &Profile) + Send>>,
}

impl ProfileHostFacade {
    pub fn add_listener(&mut self, listener: Box<dyn FnMut(ProfileChange, &Profile) + Send>) {
        self.listeners.push(listener);
    }

    fn fire(&mut self, change: ProfileChange, profile: &Profile) {
        for listener in &mut self.listeners {
            listener(change, profile);
        }
    }

    fn find_index(&self, id: ProfileId, group: u8, address: Address) -> Option<usize> {
        self.profiles
            .iter()
            .position(|p| p.id == id && p.group == group && p.address == address)
    }

    /// Appends `profile`, enforcing the (ProfileId, group, address)
    /// uniqueness invariant (§4.4) and the channel-count invariant
    /// (§3, [`Profile::is_valid`]).
    pub fn add_profile(&mut self, profile: Profile) -> Result<(), &'static str> {
        if !profile.is_valid() {
            return Err("profile num_channels_requested violates address invariant");
        }
        if self
            .find_index(profile.id, profile.group, profile.address)
            .is_some()
        {
            return Err("profile already registered at this (id, group, address)");
        }
        self.profiles.push(profile.clone());
        self.fire(ProfileChange::Added, &profile);
        Ok(())
    }

    pub fn remove_profile(&mut self, id: ProfileId, group: u8, address: Address) -> Option<Profile> {
        let idx = self.find_index(id, group, address)?;
        let removed = self.profiles.remove(idx);
        self.fire(ProfileChange::Removed, &removed);
        Some(removed)
    }

    fn set_enabled(
        &mut self,
        id: ProfileId,
        group: u8,
        address: Address,
        enabled: bool,
        num_channels: u16,
    ) -> Option<&Profile> {
        let idx = self.find_index(id, group, address)?;
        self.profiles[idx].enabled = enabled;
        self.profiles[idx].num_channels_requested = num_channels;
        let change = if enabled {
            ProfileChange::Enabled
        } else {
            ProfileChange::Disabled
        };
        let profile = self.profiles[idx].clone();
        self.fire(change, &profile);
        self.profiles.get(idx)
    }

    pub fn enable_profile(
        &mut self,
        group: u8,
        address: Address,
        id: ProfileId,
        num_channels: u16,
    ) -> Option<&Profile> {
        self.set_enabled(id, group, address, true, num_channels)
    }

    pub fn disable_profile(&mut self, group: u8, address: Address, id: ProfileId) -> Option<&Profile> {
        self.set_enabled(id, group, address, false, 0)
    }

    /// Atomically moves a profile between targets, firing `Updated`.
    pub fn update_profile_target(
        &mut self,
        id: ProfileId,
        old_group: u8,
        old_address: Address,
        new_group: u8,
        new_address: Address,
        enabled: bool,
        num_channels: u16,
    ) -> Result<(), &'static str> {
        let idx = self
            .find_index(id, old_group, old_address)
            .ok_or("no profile registered at the old target")?;
        self.profiles[idx].group = new_group;
        self.profiles[idx].address = new_address;
        self.profiles[idx].enabled = enabled;
        self.profiles[idx].num_channels_requested = num_channels;
        let profile = self.profiles[idx].clone();
        self.fire(ProfileChange::Updated, &profile);
        Ok(())
    }

    /// Profiles at `address` with the given enabled state, in catalog
    /// order. Used to build `ProfileReply`.
    pub fn get_matching(&self, address: Address, enabled: bool) -> Vec<ProfileId> {
        self.profiles
            .iter()
            .filter(|p| p.address == address && p.enabled == enabled)
            .map(|p| p.id)
            .collect()
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: u8, address: Address, enabled: bool) -> Profile {
        Profile {
            id: ProfileId([id, 0, 0, 0, 0]),
            group: 0,
            address,
            enabled,
            num_channels_requested: if matches!(address, Address::Channel(_)) { 1 } else { 0 },
        }
    }

    #[test]
    fn rejects_duplicate_target() {
        let mut host = ProfileHostFacade::default();
        host.add_profile(profile(1, Address::Channel(0), false)).unwrap();
        assert!(host.add_profile(profile(1, Address::Channel(0), false)).is_err());
    }

    #[test]
    fn rejects_invalid_channel_count() {
        let mut host = ProfileHostFacade::default();
        let mut p = profile(1, Address::Channel(0), false);
        p.num_channels_requested = 0;
        assert!(host.add_profile(p).is_err());
    }

    #[test]
    fn get_matching_filters_by_enabled() {
        let mut host = ProfileHostFacade::default();
        host.add_profile(profile(1, Address::Channel(0), false)).unwrap();
        host.enable_profile(0, Address::Channel(0), ProfileId([1, 0, 0, 0, 0]), 1);
        assert_eq!(
            host.get_matching(Address::Channel(0), true),
            vec![ProfileId([1, 0, 0, 0, 0])]
        );
        assert!(host.get_matching(Address::Channel(0), false).is_empty());
    }
}
