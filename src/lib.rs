//! A MIDI-CI (Capability Inquiry) protocol engine.
//!
//! MIDI-CI lets two MIDI endpoints discover each other over SysEx, negotiate
//! behavioral profiles bound to channels/groups, and exchange arbitrary
//! named property resources (get/set/subscribe/notify) through Common
//! Rules for Property Exchange. This crate implements the protocol engine:
//! message framing, the single-device dispatcher, the profile and property
//! catalogs, and the chunked property request/reply pipeline. It does not
//! touch a MIDI port itself — [`device::Device`] is driven by an
//! application-supplied transport sink.
//!
//! ```no_run
//! use midi_ci::config::DeviceConfiguration;
//! use midi_ci::device::Device;
//!
//! let device = Device::new(DeviceConfiguration::default(), Box::new(|_group, _bytes| true));
//! device.start_discovery().unwrap();
//! ```

mod util;

mod parse_error;
pub use parse_error::CiParseError;

mod constants;
pub use constants::SubId2;

mod muid;
pub use muid::Muid;

mod address;
pub use address::Address;

mod device_info;
pub use device_info::{DeviceDetails, DeviceInfo, SupportedCategories};

mod profile_id;
pub use profile_id::{Profile, ProfileId};

mod codec;
pub use codec::{ChunkPacket, CommonHeader};

mod message;
pub use message::{parse_packet, AckNakBody, Common, Message, ParsedPacket, RawChunk};

pub mod config;
pub mod connection;
pub mod profile;
pub mod property;

mod messenger;
pub use messenger::Messenger;

pub mod device;
pub use device::Device;
