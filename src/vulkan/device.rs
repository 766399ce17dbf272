use anyhow::Result;
use vulkanalia::prelude::v1_0::*;
use crate::app::AppData;
use crate::vulkan::physical_device::DEVICE_EXTENSIONS;
use crate::vulkan::queue::*;
use crate::{VALIDATION_LAYER, PORTABILITY_MACOS_VERSION};

pub unsafe fn create_logical_device(
    entry: &Entry,
    instance: &Instance,
    data: &mut AppData,
    validation_enabled: bool,
) -> Result<Device> {
    let indices = QueueFamilyIndices::get(instance, data, data.physical_device)?;

    let mut unique_families = vec![indices.graphics];
    if indices.present != indices.graphics {
        unique_families.push(indices.present);
    }

    let queue_priorities = &[1.0];
    let queue_infos: Vec<_> = unique_families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(queue_priorities)
                .build()
        })
        .collect();

    let layers = if validation_enabled {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        vec![]
    };

    let mut extensions: Vec<_> = DEVICE_EXTENSIONS.iter().map(|e| e.as_ptr()).collect();

    // Required by Vulkan SDK on macOS since 1.3.216.
    if cfg!(target_os = "macos") && entry.version()? >= PORTABILITY_MACOS_VERSION {
        extensions.push(vk::KHR_PORTABILITY_SUBSET_EXTENSION.name.as_ptr());
    }

    let features = vk::PhysicalDeviceFeatures::builder();

    let info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_layer_names(&layers)
        .enabled_extension_names(&extensions)
        .enabled_features(&features);

    let device = instance.create_device(data.physical_device, &info, None)?;
    data.graphics_queue = device.get_device_queue(indices.graphics, 0);
    data.present_queue = device.get_device_queue(indices.present, 0);

    return Ok(device);
}