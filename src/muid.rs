//! MUID: 28-bit unsigned endpoint identifier (§3).

use crate::constants::BROADCAST_MUID_32;
use crate::parse_error::CiParseError;
use crate::util::{push_u28, u28_from_midi};

/// A 28-bit MIDI-CI endpoint identifier, transmitted as four 7-bit bytes,
/// little-endian. `Muid::BROADCAST` (`0x0FFFFFFF`) addresses every device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Muid(pub u32);

impl Muid {
    pub const BROADCAST: Muid = Muid(BROADCAST_MUID_32);

    /// Generate a random, non-broadcast MUID, as done once at device start.
    pub fn random() -> Self {
        loop {
            let v: u32 = rand::random::<u32>() & 0x0FFF_FFFF;
            if v != BROADCAST_MUID_32 {
                return Muid(v);
            }
        }
    }

    pub fn is_broadcast(self) -> bool {
        self.0 == BROADCAST_MUID_32
    }

    pub fn extend_midi(self, v: &mut Vec<u8>) {
        push_u28(self.0, v);
    }

    pub fn from_midi(m: &[u8]) -> Result<Self, CiParseError> {
        Ok(Muid(u28_from_midi(m)?))
    }
}

impl From<u32> for Muid {
    fn from(v: u32) -> Self {
        Muid(v & 0x0FFF_FFFF)
    }
}

impl std::fmt::Display for Muid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_wire_form() {
        let mut v = vec![];
        Muid::BROADCAST.extend_midi(&mut v);
        assert_eq!(v, vec![0x7F, 0x7F, 0x7F, 0x7F]);
    }

    #[test]
    fn roundtrip() {
        let m = Muid(0x1234567);
        let mut v = vec![];
        m.extend_midi(&mut v);
        assert_eq!(Muid::from_midi(&v).unwrap(), m);
    }

    #[test]
    fn random_is_never_broadcast() {
        for _ in 0..1000 {
            assert!(!Muid::random().is_broadcast());
        }
    }
}
