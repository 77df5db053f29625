//! Test ICD - Core Domain Types
//!
//! Pure data. Configuration the test author controls, and the driver-side
//! state the loader's calls produce. No dispatch logic.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::calls::CallEnvelope;
use crate::handles::{Handle, HandleAllocator};
use crate::record::{
    NegotiationRecord, DEFAULT_INTERFACE_VERSION_CEILING, DEFAULT_MAX_ICD_INTERFACE_VERSION,
    DEFAULT_MIN_ICD_INTERFACE_VERSION,
};
use crate::version::API_VERSION_1_0;

// ── Configuration ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub name: String,
    #[serde(default)]
    pub spec_version: u32,
}

impl Extension {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spec_version: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDefinition {
    pub name: String,
    #[serde(default)]
    pub spec_version: u32,
    #[serde(default)]
    pub implementation_version: u32,
    #[serde(default)]
    pub description: String,
}

impl LayerDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spec_version: API_VERSION_1_0,
            implementation_version: 0,
            description: String::new(),
        }
    }
}

/// A fake physical device as configured by the test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalDevice {
    pub name: String,
    #[serde(default = "default_api_version")]
    pub api_version: u32,
    #[serde(default)]
    pub extensions: Vec<Extension>,
    /// Device-level functions beyond the core set that
    /// `vkGetDeviceProcAddr` should resolve.
    #[serde(default)]
    pub known_device_functions: Vec<String>,
}

impl PhysicalDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_version: API_VERSION_1_0,
            extensions: Vec::new(),
            known_device_functions: Vec::new(),
        }
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn with_known_device_function(mut self, name: impl Into<String>) -> Self {
        self.known_device_functions.push(name.into());
        self
    }
}

/// Indices into `IcdConfig::physical_devices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalDeviceGroup {
    pub device_indices: Vec<usize>,
    #[serde(default)]
    pub subset_allocation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolProperties {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub purposes: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub layer: String,
}

fn default_api_version() -> u32 {
    API_VERSION_1_0
}

fn default_min_version() -> u32 {
    DEFAULT_MIN_ICD_INTERFACE_VERSION
}

fn default_max_version() -> u32 {
    DEFAULT_MAX_ICD_INTERFACE_VERSION
}

fn default_ceiling() -> u32 {
    DEFAULT_INTERFACE_VERSION_CEILING
}

fn default_true() -> bool {
    true
}

/// Everything a test can configure about the driver before the loader
/// touches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IcdConfig {
    /// Stored for the test's own bookkeeping; the driver never reads it.
    #[serde(default)]
    pub manifest_file_path: Option<PathBuf>,
    #[serde(default = "default_min_version")]
    pub min_icd_interface_version: u32,
    #[serde(default = "default_max_version")]
    pub max_icd_interface_version: u32,
    #[serde(default = "default_ceiling")]
    pub interface_version_ceiling: u32,
    /// When false, `vk_icdNegotiateLoaderICDInterfaceVersion` does not
    /// resolve and the driver looks like a pre-negotiation driver.
    #[serde(default = "default_true")]
    pub exports_negotiate_interface_version: bool,
    #[serde(default)]
    pub enable_icd_wsi: bool,
    #[serde(default = "default_api_version")]
    pub icd_api_version: u32,
    #[serde(default)]
    pub instance_layers: Vec<LayerDefinition>,
    #[serde(default)]
    pub instance_extensions: Vec<Extension>,
    #[serde(default)]
    pub physical_devices: Vec<PhysicalDevice>,
    #[serde(default)]
    pub physical_device_groups: Vec<PhysicalDeviceGroup>,
    /// Unknown instance functions resolved by both proc-address lookups.
    #[serde(default)]
    pub custom_instance_functions: Vec<String>,
    #[serde(default)]
    pub supports_tooling_info_ext: bool,
    #[serde(default)]
    pub supports_tooling_info_core: bool,
    #[serde(default)]
    pub tooling_properties: Vec<ToolProperties>,
    #[serde(default)]
    pub adapter_luid: Option<[u8; 8]>,
}

impl Default for IcdConfig {
    fn default() -> Self {
        Self {
            manifest_file_path: None,
            min_icd_interface_version: DEFAULT_MIN_ICD_INTERFACE_VERSION,
            max_icd_interface_version: DEFAULT_MAX_ICD_INTERFACE_VERSION,
            interface_version_ceiling: DEFAULT_INTERFACE_VERSION_CEILING,
            exports_negotiate_interface_version: true,
            enable_icd_wsi: false,
            icd_api_version: API_VERSION_1_0,
            instance_layers: Vec::new(),
            instance_extensions: Vec::new(),
            physical_devices: Vec::new(),
            physical_device_groups: Vec::new(),
            custom_instance_functions: Vec::new(),
            supports_tooling_info_ext: false,
            supports_tooling_info_core: false,
            tooling_properties: Vec::new(),
            adapter_luid: None,
        }
    }
}

/// Layer and extension names a test passes to instance creation to enable
/// everything the driver advertises.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceCreateInfo {
    pub enabled_layers: Vec<String>,
    pub enabled_extensions: Vec<String>,
}

// ── Call results ───────────────────────────────────────────────────

/// Return codes at the driver's C-style boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IcdResult {
    Success,
    ErrorInitializationFailed,
    ErrorExtensionNotPresent,
    ErrorIncompatibleDriver,
}

/// Where a resolved function comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionOrigin {
    Core,
    IcdPrivate,
    Wsi,
    Tooling,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFunction {
    pub name: String,
    pub origin: FunctionOrigin,
}

/// What a single loader call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    ProcAddr(Option<ResolvedFunction>),
    Negotiated {
        result: IcdResult,
        reported_version: u32,
    },
    InstanceVersion(u32),
    Created(Handle),
    PhysicalDevices(Vec<Handle>),
    PhysicalDeviceGroups(Vec<Vec<Handle>>),
    AdapterPhysicalDevices {
        devices: Vec<Handle>,
        adapter_luid: Option<[u8; 8]>,
    },
    ToolProperties(Vec<ToolProperties>),
    Recorded,
    Destroyed,
    Failed(IcdResult),
}

impl CallOutcome {
    pub fn result(&self) -> IcdResult {
        match self {
            CallOutcome::Negotiated { result, .. } => *result,
            CallOutcome::Failed(result) => *result,
            _ => IcdResult::Success,
        }
    }

    pub fn handle(&self) -> Option<Handle> {
        match self {
            CallOutcome::Created(handle) => Some(*handle),
            _ => None,
        }
    }
}

// ── Driver state ───────────────────────────────────────────────────

/// Runtime view of a configured physical device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalDeviceState {
    pub handle: Handle,
    pub config: PhysicalDevice,
    pub device_handles: Vec<Handle>,
}

/// Result of searching all physical devices for a logical device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindDevice {
    pub found: bool,
    pub phys_dev_index: usize,
    pub dev_index: usize,
}

/// Complete driver state: configuration, negotiation record, and everything
/// the loader's calls left behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcdState {
    pub config: IcdConfig,
    pub record: NegotiationRecord,
    pub instance_handle: Option<Handle>,
    pub passed_in_instance_create_flags: u32,
    pub enabled_instance_extensions: Vec<String>,
    /// Populated at instance creation.
    pub physical_devices: Vec<PhysicalDeviceState>,
    pub surface_handles: Vec<Handle>,
    pub swapchain_handles: Vec<Handle>,
    pub messenger_handles: Vec<Handle>,
    pub called_enumerate_adapter_physical_devices: bool,
    pub is_using_icd_wsi: bool,
    pub handles: HandleAllocator,
    pub call_log: Vec<CallEnvelope>,
}

impl IcdState {
    pub fn find_physical_device(&self, handle: Handle) -> Option<&PhysicalDeviceState> {
        self.physical_devices.iter().find(|p| p.handle == handle)
    }

    pub fn lookup_device(&self, device: Handle) -> FindDevice {
        for (p, phys_dev) in self.physical_devices.iter().enumerate() {
            if let Some(d) = phys_dev.device_handles.iter().position(|h| *h == device) {
                return FindDevice {
                    found: true,
                    phys_dev_index: p,
                    dev_index: d,
                };
            }
        }
        FindDevice::default()
    }

    /// Every handle the driver currently considers alive.
    pub fn live_handles(&self) -> Vec<Handle> {
        let mut all = Vec::new();
        all.extend(self.instance_handle);
        for phys_dev in &self.physical_devices {
            all.push(phys_dev.handle);
            all.extend(phys_dev.device_handles.iter().copied());
        }
        all.extend(self.surface_handles.iter().copied());
        all.extend(self.swapchain_handles.iter().copied());
        all.extend(self.messenger_handles.iter().copied());
        all
    }

    pub fn last_sequence(&self) -> u64 {
        self.call_log.last().map(|c| c.sequence).unwrap_or(0)
    }
}
