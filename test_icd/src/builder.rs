//! Fluent construction of a `TestIcd`.
//!
//! ```
//! use test_icd::builder::TestIcdBuilder;
//! use test_icd::domain::PhysicalDevice;
//!
//! let icd = TestIcdBuilder::new()
//!     .min_icd_interface_version(2)
//!     .max_icd_interface_version(6)
//!     .physical_device(PhysicalDevice::new("gpu"))
//!     .build()
//!     .unwrap();
//! assert_eq!(icd.record().min_supported_version(), 2);
//! ```

use std::path::PathBuf;

use crate::domain::{
    Extension, IcdConfig, LayerDefinition, PhysicalDevice, PhysicalDeviceGroup, ToolProperties,
};
use crate::engine::TestIcd;
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct TestIcdBuilder {
    config: IcdConfig,
    namespace: u32,
}

impl TestIcdBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: IcdConfig) -> Self {
        Self {
            config,
            namespace: 0,
        }
    }

    pub fn config(&self) -> &IcdConfig {
        &self.config
    }

    /// Handle namespace for this driver; registries assign these.
    pub fn namespace(mut self, namespace: u32) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn manifest_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.manifest_file_path = Some(path.into());
        self
    }

    pub fn min_icd_interface_version(mut self, version: u32) -> Self {
        self.config.min_icd_interface_version = version;
        self
    }

    pub fn max_icd_interface_version(mut self, version: u32) -> Self {
        self.config.max_icd_interface_version = version;
        self
    }

    pub fn interface_version_ceiling(mut self, version: u32) -> Self {
        self.config.interface_version_ceiling = version;
        self
    }

    pub fn exports_negotiate_interface_version(mut self, exported: bool) -> Self {
        self.config.exports_negotiate_interface_version = exported;
        self
    }

    pub fn enable_icd_wsi(mut self, enable: bool) -> Self {
        self.config.enable_icd_wsi = enable;
        self
    }

    pub fn icd_api_version(mut self, version: u32) -> Self {
        self.config.icd_api_version = version;
        self
    }

    pub fn instance_layer(mut self, layer: LayerDefinition) -> Self {
        self.config.instance_layers.push(layer);
        self
    }

    pub fn instance_extension(mut self, extension: Extension) -> Self {
        self.config.instance_extensions.push(extension);
        self
    }

    pub fn physical_device(mut self, device: PhysicalDevice) -> Self {
        self.config.physical_devices.push(device);
        self
    }

    pub fn physical_device_group(mut self, group: PhysicalDeviceGroup) -> Self {
        self.config.physical_device_groups.push(group);
        self
    }

    pub fn custom_instance_function(mut self, name: impl Into<String>) -> Self {
        self.config.custom_instance_functions.push(name.into());
        self
    }

    pub fn supports_tooling_info_ext(mut self, supported: bool) -> Self {
        self.config.supports_tooling_info_ext = supported;
        self
    }

    pub fn supports_tooling_info_core(mut self, supported: bool) -> Self {
        self.config.supports_tooling_info_core = supported;
        self
    }

    pub fn tooling_property(mut self, properties: ToolProperties) -> Self {
        self.config.tooling_properties.push(properties);
        self
    }

    pub fn adapter_luid(mut self, luid: [u8; 8]) -> Self {
        self.config.adapter_luid = Some(luid);
        self
    }

    pub fn build(self) -> Result<TestIcd> {
        TestIcd::with_namespace(self.config, self.namespace)
    }
}
