//! Address byte (§3): a channel index, the whole Group, or the whole
//! Function Block.

use crate::constants::{ADDRESS_FUNCTION_BLOCK, ADDRESS_GROUP};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Address {
    Channel(u8),
    Group,
    FunctionBlock,
}

impl Address {
    pub fn to_byte(self) -> u8 {
        match self {
            Address::Channel(c) => c & 0x0F,
            Address::Group => ADDRESS_GROUP,
            Address::FunctionBlock => ADDRESS_FUNCTION_BLOCK,
        }
    }

    pub fn from_byte(b: u8) -> Self {
        match b {
            ADDRESS_GROUP => Address::Group,
            ADDRESS_FUNCTION_BLOCK => Address::FunctionBlock,
            c => Address::Channel(c & 0x0F),
        }
    }

    pub fn is_channel(self) -> bool {
        matches!(self, Address::Channel(_))
    }
}
