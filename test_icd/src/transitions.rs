//! Test ICD - Call Dispatch
//!
//! ALL state mutation caused by loader calls lives here. Each handler takes
//! the cloned state and returns what the loader sees.

use crate::calls::LoaderCall;
use crate::domain::{CallOutcome, IcdResult, IcdState, PhysicalDeviceState};
use crate::entry_points::{
    resolve_custom_function, resolve_device_function, resolve_instance_function,
};
use crate::handles::{Handle, HandleKind};
use crate::record::DiscoveryPath;

// ---------------------------------------------------------------------------
// Public dispatcher
// ---------------------------------------------------------------------------

/// Apply `call` to `state` and return `(new_state, outcome)`.
/// The original state is never mutated.
pub fn apply_call(state: &IcdState, call: &LoaderCall) -> (IcdState, CallOutcome) {
    let mut new_state = state.clone();

    let outcome = match call {
        LoaderCall::IcdGetInstanceProcAddr { name } => {
            apply_instance_proc_addr(&mut new_state, DiscoveryPath::ViaIcdGetInstanceProcAddr, name)
        }
        LoaderCall::GetInstanceProcAddr { name } => {
            apply_instance_proc_addr(&mut new_state, DiscoveryPath::ViaGetInstanceProcAddr, name)
        }
        LoaderCall::NegotiateInterfaceVersion { proposed_version } => {
            apply_negotiate(&mut new_state, *proposed_version)
        }
        LoaderCall::EnumerateInstanceVersion => {
            CallOutcome::InstanceVersion(new_state.config.icd_api_version)
        }
        LoaderCall::CreateInstance {
            flags,
            enabled_extensions,
        } => apply_create_instance(&mut new_state, *flags, enabled_extensions),
        LoaderCall::DestroyInstance => apply_destroy_instance(&mut new_state),
        LoaderCall::EnumeratePhysicalDevices => apply_enumerate_physical_devices(&new_state),
        LoaderCall::EnumeratePhysicalDeviceGroups => apply_enumerate_groups(&new_state),
        LoaderCall::EnumerateAdapterPhysicalDevices => apply_enumerate_adapter(&mut new_state),
        LoaderCall::GetPhysicalDeviceProcAddr { name } => {
            CallOutcome::ProcAddr(resolve_custom_function(&new_state.config, name))
        }
        LoaderCall::CreateDevice { physical_device } => {
            apply_create_device(&mut new_state, *physical_device)
        }
        LoaderCall::DestroyDevice { device } => apply_destroy_device(&mut new_state, *device),
        LoaderCall::GetDeviceProcAddr { device, name } => {
            apply_device_proc_addr(&new_state, *device, name)
        }
        LoaderCall::CreateSurface => apply_create_surface(&mut new_state),
        LoaderCall::DestroySurface { surface } => {
            remove_handle(&mut new_state.surface_handles, *surface, "surface");
            CallOutcome::Destroyed
        }
        LoaderCall::CreateSwapchain { device, surface } => {
            apply_create_swapchain(&mut new_state, *device, *surface)
        }
        LoaderCall::CreateDebugMessenger => {
            let handle = new_state.handles.allocate(HandleKind::DebugMessenger);
            new_state.messenger_handles.push(handle);
            CallOutcome::Created(handle)
        }
        LoaderCall::DestroyDebugMessenger { messenger } => {
            remove_handle(&mut new_state.messenger_handles, *messenger, "debug messenger");
            CallOutcome::Destroyed
        }
        LoaderCall::GetPhysicalDeviceToolProperties => apply_tool_properties(&new_state),
        LoaderCall::RecordDiscovery { path } => {
            new_state.record.record_discovery(*path);
            CallOutcome::Recorded
        }
    };

    (new_state, outcome)
}

// ---------------------------------------------------------------------------
// Individual handlers (private)
// ---------------------------------------------------------------------------

fn apply_instance_proc_addr(state: &mut IcdState, path: DiscoveryPath, name: &str) -> CallOutcome {
    // Only the first lookup decides the discovery path; later lookups are
    // ordinary resolution.
    if state.record.discovery_path == DiscoveryPath::NotCalled {
        state.record.record_discovery(path);
    }
    let resolved = resolve_instance_function(&state.config, name);
    tracing::trace!(function = name, found = resolved.is_some(), "instance proc addr");
    CallOutcome::ProcAddr(resolved)
}

fn apply_negotiate(state: &mut IcdState, proposed: u32) -> CallOutcome {
    state.record.mark_negotiate_entry();
    let outcome = state.record.negotiate(proposed);
    let reported_version = state.record.range.reported_version(proposed);
    let result = if outcome.is_incompatible() {
        IcdResult::ErrorIncompatibleDriver
    } else {
        IcdResult::Success
    };
    CallOutcome::Negotiated {
        result,
        reported_version,
    }
}

fn apply_create_instance(
    state: &mut IcdState,
    flags: u32,
    enabled_extensions: &[String],
) -> CallOutcome {
    if state.instance_handle.is_some() {
        tracing::debug!("instance already exists");
        return CallOutcome::Failed(IcdResult::ErrorInitializationFailed);
    }
    if let Some(missing) = enabled_extensions
        .iter()
        .find(|e| !state.config.instance_extensions.iter().any(|x| &x.name == *e))
    {
        tracing::debug!(extension = %missing, "requested instance extension not present");
        return CallOutcome::Failed(IcdResult::ErrorExtensionNotPresent);
    }

    let instance = state.handles.allocate(HandleKind::Instance);
    state.instance_handle = Some(instance);
    state.passed_in_instance_create_flags = flags;
    state.enabled_instance_extensions = enabled_extensions.to_vec();

    let configs = state.config.physical_devices.clone();
    state.physical_devices = configs
        .into_iter()
        .map(|config| PhysicalDeviceState {
            handle: state.handles.allocate(HandleKind::PhysicalDevice),
            config,
            device_handles: Vec::new(),
        })
        .collect();

    CallOutcome::Created(instance)
}

fn apply_destroy_instance(state: &mut IcdState) -> CallOutcome {
    if state.instance_handle.take().is_none() {
        panic!("vkDestroyInstance called without a live instance");
    }
    state.physical_devices.clear();
    state.enabled_instance_extensions.clear();
    CallOutcome::Destroyed
}

fn require_instance(state: &IcdState, entry_point: &str) {
    if state.instance_handle.is_none() {
        panic!("{} called before vkCreateInstance", entry_point);
    }
}

fn apply_enumerate_physical_devices(state: &IcdState) -> CallOutcome {
    require_instance(state, "vkEnumeratePhysicalDevices");
    CallOutcome::PhysicalDevices(state.physical_devices.iter().map(|p| p.handle).collect())
}

fn apply_enumerate_groups(state: &IcdState) -> CallOutcome {
    require_instance(state, "vkEnumeratePhysicalDeviceGroups");
    let groups = if state.config.physical_device_groups.is_empty() {
        state.physical_devices.iter().map(|p| vec![p.handle]).collect()
    } else {
        state
            .config
            .physical_device_groups
            .iter()
            .map(|g| {
                g.device_indices
                    .iter()
                    .map(|&i| state.physical_devices[i].handle)
                    .collect()
            })
            .collect()
    };
    CallOutcome::PhysicalDeviceGroups(groups)
}

fn apply_enumerate_adapter(state: &mut IcdState) -> CallOutcome {
    require_instance(state, "vk_icdEnumerateAdapterPhysicalDevices");
    state.called_enumerate_adapter_physical_devices = true;
    CallOutcome::AdapterPhysicalDevices {
        devices: state.physical_devices.iter().map(|p| p.handle).collect(),
        adapter_luid: state.config.adapter_luid,
    }
}

fn apply_create_device(state: &mut IcdState, physical_device: Handle) -> CallOutcome {
    let Some(index) = state
        .physical_devices
        .iter()
        .position(|p| p.handle == physical_device)
    else {
        panic!("vkCreateDevice: physical device {} not found", physical_device);
    };
    let device = state.handles.allocate(HandleKind::Device);
    state.physical_devices[index].device_handles.push(device);
    CallOutcome::Created(device)
}

fn apply_destroy_device(state: &mut IcdState, device: Handle) -> CallOutcome {
    let found = state.lookup_device(device);
    if !found.found {
        panic!("vkDestroyDevice: device {} not found", device);
    }
    state.physical_devices[found.phys_dev_index]
        .device_handles
        .remove(found.dev_index);
    CallOutcome::Destroyed
}

fn apply_device_proc_addr(state: &IcdState, device: Handle, name: &str) -> CallOutcome {
    let found = state.lookup_device(device);
    if !found.found {
        panic!("vkGetDeviceProcAddr: device {} not found", device);
    }
    let phys_dev = &state.physical_devices[found.phys_dev_index];
    CallOutcome::ProcAddr(resolve_device_function(&phys_dev.config, name))
}

fn apply_create_surface(state: &mut IcdState) -> CallOutcome {
    require_instance(state, "vkCreateHeadlessSurfaceEXT");
    if !state.config.enable_icd_wsi {
        return CallOutcome::Failed(IcdResult::ErrorExtensionNotPresent);
    }
    state.is_using_icd_wsi = true;
    let surface = state.handles.allocate(HandleKind::Surface);
    state.surface_handles.push(surface);
    CallOutcome::Created(surface)
}

fn apply_create_swapchain(state: &mut IcdState, device: Handle, surface: Handle) -> CallOutcome {
    if !state.lookup_device(device).found {
        panic!("vkCreateSwapchainKHR: device {} not found", device);
    }
    if !state.surface_handles.contains(&surface) {
        panic!("vkCreateSwapchainKHR: surface {} not found", surface);
    }
    let swapchain = state.handles.allocate(HandleKind::Swapchain);
    state.swapchain_handles.push(swapchain);
    CallOutcome::Created(swapchain)
}

fn apply_tool_properties(state: &IcdState) -> CallOutcome {
    if !state.config.supports_tooling_info_ext && !state.config.supports_tooling_info_core {
        return CallOutcome::Failed(IcdResult::ErrorExtensionNotPresent);
    }
    CallOutcome::ToolProperties(state.config.tooling_properties.clone())
}

fn remove_handle(handles: &mut Vec<Handle>, handle: Handle, what: &str) {
    match handles.iter().position(|h| *h == handle) {
        Some(i) => {
            handles.remove(i);
        }
        None => panic!("destroying unknown {} {}", what, handle),
    }
}
