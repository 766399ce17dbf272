//! Render-graph compiler and executor for Vulkan.
//!
//! [`graph`] declares and compiles the render graph (components A-F), [`binder`]
//! resolves a compiled executable's attachment slots to real framebuffers
//! (component G), [`scene`] holds the per-frame draw/dispatch command tree and
//! its recording visitors (component I), [`app`] drives the swapchain frame
//! loop (component H), and [`input`] queues window events (component J).

use vulkanalia::vk;
use vulkanalia::Version;

pub mod app;
pub mod binder;
pub mod config;
pub mod error;
pub mod graph;
pub mod input;
pub mod scene;
pub mod vulkan;

/// Frames the host may have in flight at once; also the width of every
/// per-swapchain-image CPU-side array (dirty bits, uniform buffers, ...).
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

pub const VALIDATION_ENABLED: bool = cfg!(debug_assertions);
pub const VALIDATION_LAYER: vk::ExtensionName = vk::ExtensionName::from_bytes(b"VK_LAYER_KHRONOS_validation\0");
/// Required by the Vulkan SDK on macOS since this version.
pub const PORTABILITY_MACOS_VERSION: Version = Version::new(1, 3, 216);
