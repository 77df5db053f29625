//! Test ICD - Entry Point Tables
//!
//! Name resolution for the three proc-address lookups. Pure functions over
//! the driver configuration.

use crate::domain::{FunctionOrigin, IcdConfig, PhysicalDevice, ResolvedFunction};

/// Global and instance-level functions every configuration exports.
pub const CORE_INSTANCE_FUNCTIONS: &[&str] = &[
    "vkGetInstanceProcAddr",
    "vkCreateInstance",
    "vkDestroyInstance",
    "vkEnumerateInstanceVersion",
    "vkEnumerateInstanceExtensionProperties",
    "vkEnumerateInstanceLayerProperties",
    "vkEnumeratePhysicalDevices",
    "vkEnumeratePhysicalDeviceGroups",
    "vkGetPhysicalDeviceProperties",
    "vkGetPhysicalDeviceFeatures",
    "vkGetPhysicalDeviceQueueFamilyProperties",
    "vkEnumerateDeviceExtensionProperties",
    "vkCreateDevice",
    "vkGetDeviceProcAddr",
    "vkCreateDebugUtilsMessengerEXT",
    "vkDestroyDebugUtilsMessengerEXT",
];

/// Functions only an ICD exports; the loader looks these up itself.
pub const ICD_PRIVATE_FUNCTIONS: &[&str] = &[
    "vk_icdGetInstanceProcAddr",
    "vk_icdNegotiateLoaderICDInterfaceVersion",
    "vk_icdGetPhysicalDeviceProcAddr",
    "vk_icdEnumerateAdapterPhysicalDevices",
];

/// Surface functions, exported only when the driver handles WSI itself.
pub const WSI_INSTANCE_FUNCTIONS: &[&str] = &[
    "vkCreateHeadlessSurfaceEXT",
    "vkDestroySurfaceKHR",
    "vkGetPhysicalDeviceSurfaceSupportKHR",
    "vkGetPhysicalDeviceSurfaceCapabilitiesKHR",
    "vkGetPhysicalDeviceSurfaceFormatsKHR",
    "vkGetPhysicalDeviceSurfacePresentModesKHR",
];

pub const NEGOTIATE_INTERFACE_VERSION_FUNCTION: &str = "vk_icdNegotiateLoaderICDInterfaceVersion";

pub const TOOLING_INFO_EXT_FUNCTION: &str = "vkGetPhysicalDeviceToolPropertiesEXT";
pub const TOOLING_INFO_CORE_FUNCTION: &str = "vkGetPhysicalDeviceToolProperties";

/// Device-level functions every logical device exports.
pub const CORE_DEVICE_FUNCTIONS: &[&str] = &[
    "vkGetDeviceProcAddr",
    "vkDestroyDevice",
    "vkGetDeviceQueue",
    "vkAllocateCommandBuffers",
    "vkFreeCommandBuffers",
    "vkCreateSwapchainKHR",
    "vkDestroySwapchainKHR",
];

fn resolved(name: &str, origin: FunctionOrigin) -> Option<ResolvedFunction> {
    Some(ResolvedFunction {
        name: name.to_string(),
        origin,
    })
}

/// Resolve a name through `vk_icdGetInstanceProcAddr` / `vkGetInstanceProcAddr`.
pub fn resolve_instance_function(config: &IcdConfig, name: &str) -> Option<ResolvedFunction> {
    if CORE_INSTANCE_FUNCTIONS.contains(&name) {
        return resolved(name, FunctionOrigin::Core);
    }
    if name == NEGOTIATE_INTERFACE_VERSION_FUNCTION && !config.exports_negotiate_interface_version {
        return None;
    }
    if ICD_PRIVATE_FUNCTIONS.contains(&name) {
        return resolved(name, FunctionOrigin::IcdPrivate);
    }
    if config.enable_icd_wsi && WSI_INSTANCE_FUNCTIONS.contains(&name) {
        return resolved(name, FunctionOrigin::Wsi);
    }
    if config.supports_tooling_info_ext && name == TOOLING_INFO_EXT_FUNCTION {
        return resolved(name, FunctionOrigin::Tooling);
    }
    if config.supports_tooling_info_core && name == TOOLING_INFO_CORE_FUNCTION {
        return resolved(name, FunctionOrigin::Tooling);
    }
    resolve_custom_function(config, name)
}

/// Resolve a name through `vk_icdGetPhysicalDeviceProcAddr`. Only functions
/// the loader does not know about reach this lookup.
pub fn resolve_custom_function(config: &IcdConfig, name: &str) -> Option<ResolvedFunction> {
    if config.custom_instance_functions.iter().any(|f| f == name) {
        return resolved(name, FunctionOrigin::Custom);
    }
    None
}

/// Resolve a name through `vkGetDeviceProcAddr` for a device created on
/// `physical_device`.
pub fn resolve_device_function(
    physical_device: &PhysicalDevice,
    name: &str,
) -> Option<ResolvedFunction> {
    if CORE_DEVICE_FUNCTIONS.contains(&name) {
        return resolved(name, FunctionOrigin::Core);
    }
    if physical_device.known_device_functions.iter().any(|f| f == name) {
        return resolved(name, FunctionOrigin::Custom);
    }
    None
}
