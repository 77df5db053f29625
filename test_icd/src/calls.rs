//! Test ICD - Loader Call Definitions
//!
//! Calls are pure data: which entry point the loader invoked and with what
//! arguments. They carry no dispatch logic.
//!
//! Fixtures encode a call as an object tagged by `"call"`, e.g.
//! `{"sequence": 1, "call": "negotiate_interface_version", "proposed_version": 5}`.

use serde::{Deserialize, Serialize};

use crate::handles::Handle;
use crate::record::DiscoveryPath;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum LoaderCall {
    /// `vk_icdGetInstanceProcAddr`
    IcdGetInstanceProcAddr { name: String },
    /// `vkGetInstanceProcAddr` exported directly from the driver library.
    GetInstanceProcAddr { name: String },
    /// `vk_icdNegotiateLoaderICDInterfaceVersion`
    NegotiateInterfaceVersion { proposed_version: u32 },
    EnumerateInstanceVersion,
    CreateInstance {
        #[serde(default)]
        flags: u32,
        #[serde(default)]
        enabled_extensions: Vec<String>,
    },
    DestroyInstance,
    EnumeratePhysicalDevices,
    EnumeratePhysicalDeviceGroups,
    /// `vk_icdEnumerateAdapterPhysicalDevices`
    EnumerateAdapterPhysicalDevices,
    /// `vk_icdGetPhysicalDeviceProcAddr`
    GetPhysicalDeviceProcAddr { name: String },
    CreateDevice { physical_device: Handle },
    DestroyDevice { device: Handle },
    GetDeviceProcAddr { device: Handle, name: String },
    CreateSurface,
    DestroySurface { surface: Handle },
    CreateSwapchain { device: Handle, surface: Handle },
    CreateDebugMessenger,
    DestroyDebugMessenger { messenger: Handle },
    GetPhysicalDeviceToolProperties,
    /// A test recording the discovery path itself instead of going through
    /// a proc-address lookup.
    RecordDiscovery { path: DiscoveryPath },
}

impl LoaderCall {
    /// The driver entry point this call models.
    pub fn entry_point(&self) -> &'static str {
        match self {
            LoaderCall::IcdGetInstanceProcAddr { .. } => "vk_icdGetInstanceProcAddr",
            LoaderCall::GetInstanceProcAddr { .. } => "vkGetInstanceProcAddr",
            LoaderCall::NegotiateInterfaceVersion { .. } => {
                "vk_icdNegotiateLoaderICDInterfaceVersion"
            }
            LoaderCall::EnumerateInstanceVersion => "vkEnumerateInstanceVersion",
            LoaderCall::CreateInstance { .. } => "vkCreateInstance",
            LoaderCall::DestroyInstance => "vkDestroyInstance",
            LoaderCall::EnumeratePhysicalDevices => "vkEnumeratePhysicalDevices",
            LoaderCall::EnumeratePhysicalDeviceGroups => "vkEnumeratePhysicalDeviceGroups",
            LoaderCall::EnumerateAdapterPhysicalDevices => "vk_icdEnumerateAdapterPhysicalDevices",
            LoaderCall::GetPhysicalDeviceProcAddr { .. } => "vk_icdGetPhysicalDeviceProcAddr",
            LoaderCall::CreateDevice { .. } => "vkCreateDevice",
            LoaderCall::DestroyDevice { .. } => "vkDestroyDevice",
            LoaderCall::GetDeviceProcAddr { .. } => "vkGetDeviceProcAddr",
            LoaderCall::CreateSurface => "vkCreateHeadlessSurfaceEXT",
            LoaderCall::DestroySurface { .. } => "vkDestroySurfaceKHR",
            LoaderCall::CreateSwapchain { .. } => "vkCreateSwapchainKHR",
            LoaderCall::CreateDebugMessenger => "vkCreateDebugUtilsMessengerEXT",
            LoaderCall::DestroyDebugMessenger { .. } => "vkDestroyDebugUtilsMessengerEXT",
            LoaderCall::GetPhysicalDeviceToolProperties => "vkGetPhysicalDeviceToolPropertiesEXT",
            LoaderCall::RecordDiscovery { .. } => "record_discovery",
        }
    }
}

/// A call plus its position in the loader's call stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEnvelope {
    pub sequence: u64,
    #[serde(flatten)]
    pub call: LoaderCall,
}

impl CallEnvelope {
    pub fn new(sequence: u64, call: LoaderCall) -> Self {
        Self { sequence, call }
    }
}

/// Number a call stream from 1.
pub fn sequence_calls(calls: impl IntoIterator<Item = LoaderCall>) -> Vec<CallEnvelope> {
    calls
        .into_iter()
        .enumerate()
        .map(|(i, call)| CallEnvelope::new(i as u64 + 1, call))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_from_fixture_shape() {
        let v = serde_json::json!({
            "sequence": 3,
            "call": "negotiate_interface_version",
            "proposed_version": 5
        });
        let env: CallEnvelope = serde_json::from_value(v).unwrap();
        assert_eq!(env.sequence, 3);
        assert_eq!(
            env.call,
            LoaderCall::NegotiateInterfaceVersion { proposed_version: 5 }
        );
    }

    #[test]
    fn unit_calls_parse_without_fields() {
        let env: CallEnvelope =
            serde_json::from_str(r#"{"sequence":1,"call":"create_instance"}"#).unwrap();
        assert_eq!(
            env.call,
            LoaderCall::CreateInstance {
                flags: 0,
                enabled_extensions: Vec::new()
            }
        );
    }

    #[test]
    fn record_discovery_parses_path() {
        let env: CallEnvelope = serde_json::from_str(
            r#"{"sequence":1,"call":"record_discovery","path":"via_get_instance_proc_addr"}"#,
        )
        .unwrap();
        assert_eq!(
            env.call,
            LoaderCall::RecordDiscovery {
                path: DiscoveryPath::ViaGetInstanceProcAddr
            }
        );
    }

    #[test]
    fn sequence_calls_numbers_from_one() {
        let calls = sequence_calls(vec![
            LoaderCall::EnumerateInstanceVersion,
            LoaderCall::DestroyInstance,
        ]);
        assert_eq!(calls[0].sequence, 1);
        assert_eq!(calls[1].sequence, 2);
    }
}
