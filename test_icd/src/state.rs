//! Test ICD - State Construction

use crate::domain::{IcdConfig, IcdState};
use crate::error::{IcdError, Result};
use crate::handles::HandleAllocator;
use crate::record::{InterfaceVersionRange, NegotiationRecord};

/// Validate `config` and create a fresh driver state whose handles live in
/// `namespace`. Nothing is recorded and no handles are allocated yet.
pub fn create_initial_state(config: IcdConfig, namespace: u32) -> Result<IcdState> {
    let range = InterfaceVersionRange::new(
        config.min_icd_interface_version,
        config.max_icd_interface_version,
        config.interface_version_ceiling,
    )?;

    let count = config.physical_devices.len();
    for (group, g) in config.physical_device_groups.iter().enumerate() {
        if let Some(&index) = g.device_indices.iter().find(|&&i| i >= count) {
            return Err(IcdError::InvalidDeviceGroup {
                group,
                index,
                count,
            });
        }
    }

    Ok(IcdState {
        config,
        record: NegotiationRecord::new(range),
        instance_handle: None,
        passed_in_instance_create_flags: 0,
        enabled_instance_extensions: Vec::new(),
        physical_devices: Vec::new(),
        surface_handles: Vec::new(),
        swapchain_handles: Vec::new(),
        messenger_handles: Vec::new(),
        called_enumerate_adapter_physical_devices: false,
        is_using_icd_wsi: false,
        handles: HandleAllocator::new(namespace),
        call_log: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PhysicalDevice, PhysicalDeviceGroup};

    #[test]
    fn default_config_builds() {
        let state = create_initial_state(IcdConfig::default(), 0).unwrap();
        assert_eq!(state.record.min_supported_version(), 0);
        assert_eq!(state.record.max_supported_version(), 7);
        assert!(state.live_handles().is_empty());
    }

    #[test]
    fn inverted_range_rejected() {
        let config = IcdConfig {
            min_icd_interface_version: 5,
            max_icd_interface_version: 4,
            ..IcdConfig::default()
        };
        assert!(matches!(
            create_initial_state(config, 0),
            Err(IcdError::InvalidVersionRange { .. })
        ));
    }

    #[test]
    fn group_index_out_of_range_rejected() {
        let config = IcdConfig {
            physical_devices: vec![PhysicalDevice::new("a")],
            physical_device_groups: vec![PhysicalDeviceGroup {
                device_indices: vec![0, 1],
                subset_allocation: false,
            }],
            ..IcdConfig::default()
        };
        assert!(matches!(
            create_initial_state(config, 0),
            Err(IcdError::InvalidDeviceGroup { index: 1, .. })
        ));
    }
}
