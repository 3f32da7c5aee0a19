//! `ProfileId`: 5-byte profile identifier (§3).

use crate::parse_error::CiParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProfileId(pub [u8; 5]);

impl ProfileId {
    pub fn extend_midi(&self, v: &mut Vec<u8>) {
        v.extend_from_slice(&self.0);
    }

    pub fn from_midi(m: &[u8]) -> Result<(Self, usize), CiParseError> {
        if m.len() < 5 {
            return Err(CiParseError::UnexpectedEnd);
        }
        let mut id = [0u8; 5];
        id.copy_from_slice(&m[0..5]);
        Ok((ProfileId(id), 5))
    }
}

impl std::fmt::Display for ProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02X}{:02X}{:02X}{:02X}{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4]
        )
    }
}

/// A profile advertised at a specific (group, address) target (§3).
///
/// Invariant: for `address == Address::Group | Address::FunctionBlock`,
/// `num_channels_requested` MUST be 0; for channel addresses it MUST be
/// >= 1. Enforced by [`crate::profile::host::ProfileHostFacade::add_profile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: ProfileId,
    pub group: u8,
    pub address: crate::address::Address,
    pub enabled: bool,
    pub num_channels_requested: u16,
}

impl Profile {
    pub fn is_valid(&self) -> bool {
        match self.address {
            crate::address::Address::Channel(_) => self.num_channels_requested >= 1,
            crate::address::Address::Group | crate::address::Address::FunctionBlock => {
                self.num_channels_requested == 0
            }
        }
    }
}
