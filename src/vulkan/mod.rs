pub mod instance;
pub mod device;
pub mod physical_device;
pub mod debug;
pub mod queue;
pub mod errors;
pub mod swapchain;
pub mod pipeline;
pub mod render_pass;
pub mod commands;
pub mod buffers;
pub mod image;
pub mod synchronization;
pub mod vertex;
