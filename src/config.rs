//! `DeviceConfiguration`: the knobs a host application sets before
//! starting a [`crate::device::Device`] (§6).

use crate::constants::{
    DEFAULT_MAX_PROPERTY_CHUNK_SIZE, DEFAULT_MAX_SIMULTANEOUS_PROPERTY_REQUESTS,
    DEFAULT_RECEIVABLE_MAX_SYSEX_SIZE,
};
use crate::device_info::{DeviceDetails, DeviceInfo, SupportedCategories};

/// No function block selected (§3).
pub const NO_FUNCTION_BLOCK: u8 = 0x7F;

#[derive(Debug, Clone)]
pub struct DeviceConfiguration {
    pub device_details: DeviceDetails,
    pub device_info: DeviceInfo,

    pub supported_categories: SupportedCategories,
    pub receivable_max_sysex_size: u32,
    pub max_simultaneous_property_requests: u8,
    pub max_property_chunk_size: usize,

    pub group: u8,
    pub output_path_id: u8,
    pub function_block: u8,
    pub product_instance_id: String,

    pub auto_send_endpoint_inquiry: bool,
    pub auto_send_profile_inquiry: bool,
    pub auto_send_property_exchange_capabilities_inquiry: bool,
    pub auto_send_process_inquiry: bool,
    pub auto_send_get_resource_list: bool,
    pub auto_send_get_device_info: bool,

    pub process_inquiry_supported_features: u8,
    pub midi_message_report_message_data_control: u8,
    pub midi_message_report_system_messages: u8,
    pub midi_message_report_channel_controller_messages: u8,
    pub midi_message_report_note_data_messages: u8,
}

impl Default for DeviceConfiguration {
    fn default() -> Self {
        DeviceConfiguration {
            device_details: DeviceDetails {
                manufacturer: 0,
                family: 0,
                model: 0,
                version: 0,
            },
            device_info: DeviceInfo::default(),
            supported_categories: SupportedCategories::PROFILE_CONFIGURATION
                | SupportedCategories::PROPERTY_EXCHANGE
                | SupportedCategories::PROCESS_INQUIRY,
            receivable_max_sysex_size: DEFAULT_RECEIVABLE_MAX_SYSEX_SIZE,
            max_simultaneous_property_requests: DEFAULT_MAX_SIMULTANEOUS_PROPERTY_REQUESTS,
            max_property_chunk_size: DEFAULT_MAX_PROPERTY_CHUNK_SIZE,
            group: 0,
            output_path_id: 0,
            function_block: NO_FUNCTION_BLOCK,
            product_instance_id: "midi-ci-rs".to_string(),
            auto_send_endpoint_inquiry: true,
            auto_send_profile_inquiry: true,
            auto_send_property_exchange_capabilities_inquiry: true,
            auto_send_process_inquiry: true,
            auto_send_get_resource_list: true,
            auto_send_get_device_info: true,
            process_inquiry_supported_features: 1,
            midi_message_report_message_data_control: 0x7F,
            midi_message_report_system_messages: 0x7F,
            midi_message_report_channel_controller_messages: 0x7F,
            midi_message_report_note_data_messages: 0x7F,
        }
    }
}
