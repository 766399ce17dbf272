#![allow(
    dead_code,
    unused_variables,
    clippy::too_many_arguments,
    clippy::unnecessary_wraps
)]

use std::env;

use anyhow::Result;
use vkrg::config::Config;
use vkrg::app::App;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::window::{Fullscreen, WindowBuilder};
use vulkanalia::prelude::v1_0::*;

fn main() -> Result<()> {
    pretty_env_logger::init();

    let config = Config::parse(env::args().skip(1))?;

    let event_loop = EventLoop::new()?;
    let mut window_builder = WindowBuilder::new()
        .with_title("Vulkan here we goo!!!")
        .with_inner_size(LogicalSize::new(1024, 768));
    if config.fullscreen {
        window_builder = window_builder.with_fullscreen(Some(Fullscreen::Borderless(None)));
    }
    let window = window_builder.build(&event_loop)?;

    let mut app = unsafe { App::create(&window, &config)? };
    let mut last_update = std::time::Instant::now();
    let update_period = config.update_period();

    event_loop.run(move |event, elwt| {
        match event {
            // Request a redraw once the target update period has elapsed.
            Event::AboutToWait => {
                if last_update.elapsed() >= update_period {
                    last_update = std::time::Instant::now();
                    window.request_redraw();
                }
            }
            Event::WindowEvent { event, .. } => {
                match event {
                    WindowEvent::RedrawRequested if !elwt.exiting() => unsafe { app.render(&window) }.unwrap(),
                    WindowEvent::Resized(size) => {
                        app.resized = true;
                        app.input_queue().set_window_size((size.width, size.height));
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        app.input_queue().push_cursor_moved(position.x, position.y);
                    }
                    WindowEvent::MouseInput { state, button, .. } => {
                        app.input_queue().push_mouse_button(button, state == ElementState::Pressed);
                    }
                    WindowEvent::KeyboardInput { event: key_event, .. } => {
                        if let winit::keyboard::PhysicalKey::Code(code) = key_event.physical_key {
                            app.input_queue().push_key(code, key_event.state == ElementState::Pressed);
                        }
                    }
                    WindowEvent::CloseRequested => {
                        elwt.exit();
                        // Wait for the GPU to finish it's work before we destroy the app
                        // not to destroy components that are currently in use by the GPU.
                        unsafe { app.device.device_wait_idle().unwrap(); }

                        // Deallocate everything from the GPU.
                        unsafe { app.destroy(); }
                    },
                    WindowEvent::DroppedFile(buf) => {
                        println!("{}", buf.display());
                    }
                    _ => ()
                }
            }
            _ => {}
        }
    })?;

    Ok(())
}
