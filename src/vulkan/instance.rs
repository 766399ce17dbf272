use std::collections::HashSet;
use std::ffi::CStr;

use anyhow::{anyhow, Result};
use log::*;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::ExtDebugUtilsExtension;
use vulkanalia::window as vk_window;
use vulkanalia::Version;
use winit::window::Window;

use crate::app::AppData;
use crate::app::{PORTABILITY_MACOS_VERSION, VALIDATION_LAYER};

use super::debug;

const VK_API_VERSION: Version = Version::new(1, 3, 0);

/// Creates the Vulkan instance: enumerates the extensions the window system and
/// (optionally) the validation layers require, then attaches the debug
/// messenger for the lifetime of the instance. `validation_enabled` is the
/// compile-time default (`VALIDATION_ENABLED`) OR'd with `--debug` at the call
/// site, so a release build can still request validation at runtime.
pub unsafe fn create_instance(window: &Window, entry: &Entry, data: &mut AppData, validation_enabled: bool) -> Result<Instance> {
    let application_info = vk::ApplicationInfo::builder()
        .application_name(b"vkrg demo\0")
        .application_version(vk::make_version(1, 0, 0))
        .engine_name(b"vkrg\0")
        .engine_version(vk::make_version(1, 0, 0))
        .api_version(VK_API_VERSION);

    let available_layers = entry
        .enumerate_instance_layer_properties()?
        .iter()
        .map(|l| l.layer_name)
        .collect::<HashSet<_>>();

    if validation_enabled && !available_layers.contains(&VALIDATION_LAYER) {
        return Err(anyhow!("Validation layer requested but not supported."));
    }

    let layers = if validation_enabled {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        Vec::new()
    };

    let mut extensions = vk_window::get_required_instance_extensions(window)
        .iter()
        .map(|e| e.as_ptr())
        .collect::<Vec<_>>();

    if validation_enabled {
        extensions.push(vk::EXT_DEBUG_UTILS_EXTENSION.name.as_ptr());
    }

    // Required by Vulkan SDK on macOS since 1.3.216.
    let flags = if cfg!(target_os = "macos") && entry.version()? >= PORTABILITY_MACOS_VERSION {
        info!("Enabling extensions for macOS portability.");
        extensions.push(vk::KHR_GET_PHYSICAL_DEVICE_PROPERTIES2_EXTENSION.name.as_ptr());
        extensions.push(vk::KHR_PORTABILITY_ENUMERATION_EXTENSION.name.as_ptr());
        vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
    } else {
        vk::InstanceCreateFlags::empty()
    };

    let mut info = vk::InstanceCreateInfo::builder()
        .application_info(&application_info)
        .enabled_layer_names(&layers)
        .enabled_extension_names(&extensions)
        .flags(flags);

    let mut debug_info = debug::messenger_create_info();
    if validation_enabled {
        info = info.push_next(&mut debug_info);
    }

    let instance = entry.create_instance(&info, None)?;

    if validation_enabled {
        data.messenger = instance.create_debug_utils_messenger_ext(&debug_info, None)?;
    }

    Ok(instance)
}

pub fn extension_name(name: &CStr) -> vk::ExtensionName {
    vk::ExtensionName::from_bytes(name.to_bytes())
}
